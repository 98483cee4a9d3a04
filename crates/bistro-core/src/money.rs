//! # Money
//!
//! Amounts are whole minor units of the restaurant's currency: 120.00 THB is
//! `Money(12000)`. Line totals multiply by integer portions. Ingredient costs
//! multiply by fractional quantities through [`Money::scale`], which rounds a
//! single time.
//!
//! ```text
//! Dish.price ──► SaleLine.unit_price ──► SaleItem.total_price ──► Sale.total_amount
//! Product.last_price ──► ingredient cost ──► dish cost and margin
//! ```
//!
//! ```rust
//! use bistro_core::money::Money;
//!
//! assert_eq!((Money::from_cents(12000) * 2).cents(), 24000);
//! // 0.3 kg of noodles at 45.50/kg
//! assert_eq!(Money::from_cents(4550).scale(0.3).cents(), 1365);
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn zero() -> Self {
        Money(0)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn multiply_quantity(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Multiplies by a fractional quantity and rounds half away from zero.
    pub fn scale(self, factor: f64) -> Money {
        Money((self.0 as f64 * factor).round() as i64)
    }
}

/// Two decimals, no currency code. Callers append the restaurant's code.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, qty: i64) -> Money {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(|m| m.0).sum())
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(12000).to_string(), "120.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1050).to_string(), "-10.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_line_and_order_totals() {
        let pad_thai = Money::from_cents(12000);
        let iced_tea = Money::from_cents(3500);

        assert_eq!((pad_thai * 2).cents(), 24000);
        assert_eq!((pad_thai - iced_tea).cents(), 8500);

        let lines = [pad_thai * 2, iced_tea];
        let total: Money = lines.iter().sum();
        assert_eq!(total.cents(), 27500);

        let mut running = Money::default();
        running += iced_tea;
        assert_eq!(running, iced_tea);
    }

    #[test]
    fn test_scale_rounds_once() {
        assert_eq!(Money::from_cents(4550).scale(0.3).cents(), 1365);
        // 33.3 cents
        assert_eq!(Money::from_cents(100).scale(0.333).cents(), 33);
        assert!(Money::from_cents(100).scale(0.0).is_zero());
    }

    #[test]
    fn test_serializes_as_plain_integer() {
        assert_eq!(serde_json::to_string(&Money::from_cents(4550)).unwrap(), "4550");
    }
}
