//! # Cart
//!
//! The order being built at the counter, before submission.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use bistro_core::{CoreError, CoreResult, Dish, Money, SaleLine, MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub dish_id: String,
    pub dish_name: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl CartLine {
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// Lines keyed by dish, in the order they were first added.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds `quantity` of a dish at its current price. Adding a dish that is
    /// already in the cart raises its quantity.
    pub fn add(&mut self, dish: &Dish, quantity: i64) -> CoreResult<()> {
        if let Some(line) = self.lines.iter_mut().find(|l| l.dish_id == dish.id) {
            let requested = line.quantity + quantity;
            check_quantity(requested)?;
            line.quantity = requested;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }
        check_quantity(quantity)?;

        self.lines.push(CartLine {
            dish_id: dish.id.clone(),
            dish_name: dish.name.clone(),
            quantity,
            unit_price: dish.price,
        });
        Ok(())
    }

    /// Zero removes the line. Unknown dishes are ignored.
    pub fn set_quantity(&mut self, dish_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity <= 0 {
            self.remove(dish_id);
            return Ok(());
        }
        check_quantity(quantity)?;
        if let Some(line) = self.lines.iter_mut().find(|l| l.dish_id == dish_id) {
            line.quantity = quantity;
        }
        Ok(())
    }

    pub fn remove(&mut self, dish_id: &str) {
        self.lines.retain(|l| l.dish_id != dish_id);
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn to_sale_lines(&self) -> Vec<SaleLine> {
        self.lines
            .iter()
            .map(|l| SaleLine {
                dish_id: l.dish_id.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
            })
            .collect()
    }
}

fn check_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 || quantity > MAX_ITEM_QUANTITY {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Shared handle to the station's cart.
#[derive(Debug, Clone, Default)]
pub struct CartState {
    inner: Arc<Mutex<Cart>>,
}

impl CartState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Cart {
        self.lock().clone()
    }

    /// Runs `f` with the cart locked. Do not await inside.
    pub fn with<R>(&self, f: impl FnOnce(&mut Cart) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
