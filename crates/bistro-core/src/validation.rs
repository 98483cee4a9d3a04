//! # Field Checks
//!
//! Cheap checks run by the workflows before a store is contacted. The
//! ledger enforces its own NOT NULL / CHECK / FOREIGN KEY rules and the
//! stock check underneath; these only catch what an operator typed wrong.
//!
//! ```rust
//! use bistro_core::validation::{validate_name, validate_quantity};
//!
//! assert!(validate_name("name", "Pad Thai").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::SaleLine;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

pub type ValidationResult<T> = Result<T, ValidationError>;

const MAX_NAME_LEN: usize = 200;

/// Product, dish or member name; surrounding whitespace is ignored.
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ValidationError::required(field))
    } else if trimmed.chars().count() > MAX_NAME_LEN {
        Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NAME_LEN,
        })
    } else {
        Ok(())
    }
}

/// ```rust
/// use bistro_core::validation::validate_uuid;
///
/// assert!(validate_uuid("restaurant.id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("restaurant.id", "soi-11").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }
    match uuid::Uuid::parse_str(id) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::invalid_format(field, "not a UUID")),
    }
}

/// 1 to [`MAX_ITEM_QUANTITY`] portions.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    match qty {
        q if q < 1 => Err(ValidationError::must_be_positive("quantity")),
        q if q > MAX_ITEM_QUANTITY => {
            Err(ValidationError::out_of_range("quantity", 1, MAX_ITEM_QUANTITY))
        }
        _ => Ok(()),
    }
}

/// Zero is allowed (staff meals), negative is not.
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents >= 0 {
        Ok(())
    } else {
        Err(ValidationError::out_of_range(field, 0, i64::MAX))
    }
}

pub fn validate_ingredient_quantity(qty: f64) -> ValidationResult<()> {
    if qty.is_finite() && qty > 0.0 {
        Ok(())
    } else {
        Err(ValidationError::must_be_positive("ingredient quantity"))
    }
}

/// Zero means "never flag as low".
pub fn validate_reorder_level(level: f64) -> ValidationResult<()> {
    if level.is_finite() && level >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid_format("reorder_level", "must be zero or more"))
    }
}

/// Checks every line of a sale. An empty list is left to the caller, which
/// reports it as an empty cart rather than a field error.
pub fn validate_sale_lines(lines: &[SaleLine]) -> ValidationResult<()> {
    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::out_of_range(
            "sale lines",
            1,
            MAX_CART_ITEMS as i64,
        ));
    }
    lines.iter().try_for_each(|line| {
        if line.dish_id.trim().is_empty() {
            return Err(ValidationError::required("dish_id"));
        }
        validate_quantity(line.quantity)?;
        validate_price_cents("unit_price", line.unit_price.cents())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn line(dish_id: &str, quantity: i64) -> SaleLine {
        SaleLine {
            dish_id: dish_id.to_string(),
            quantity,
            unit_price: Money::from_cents(12000),
        }
    }

    #[test]
    fn test_names() {
        assert!(validate_name("name", "  Som Tam ").is_ok());
        assert!(matches!(
            validate_name("name", "   "),
            Err(ValidationError::Required { .. })
        ));
        assert!(matches!(
            validate_name("name", &"x".repeat(201)),
            Err(ValidationError::TooLong { max: 200, .. })
        ));
    }

    #[test]
    fn test_quantity_bounds() {
        for ok in [1, 2, 999] {
            assert!(validate_quantity(ok).is_ok(), "{ok} should pass");
        }
        assert!(matches!(
            validate_quantity(0),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_quantity(-2).is_err());
        assert!(matches!(
            validate_quantity(1000),
            Err(ValidationError::OutOfRange { max: 999, .. })
        ));
    }

    #[test]
    fn test_sale_lines() {
        assert!(validate_sale_lines(&[line("d1", 2)]).is_ok());
        assert!(validate_sale_lines(&[]).is_ok());

        assert!(matches!(
            validate_sale_lines(&[line("d1", 2), line("d2", 0)]),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(matches!(
            validate_sale_lines(&[line(" ", 1)]),
            Err(ValidationError::Required { .. })
        ));

        let too_many: Vec<SaleLine> = (0..=MAX_CART_ITEMS).map(|i| line(&format!("d{i}"), 1)).collect();
        assert!(validate_sale_lines(&too_many).is_err());
    }

    #[test]
    fn test_catalog_numbers() {
        assert!(validate_ingredient_quantity(0.3).is_ok());
        assert!(validate_ingredient_quantity(0.0).is_err());
        assert!(validate_ingredient_quantity(f64::NAN).is_err());
        assert!(validate_reorder_level(0.0).is_ok());
        assert!(validate_reorder_level(-1.0).is_err());
        assert!(validate_reorder_level(f64::INFINITY).is_err());
        assert!(validate_price_cents("price", 0).is_ok());
        assert!(validate_price_cents("price", -1).is_err());
    }
}
