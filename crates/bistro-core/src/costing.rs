//! # Dish Costing
//!
//! Cost and margin are derived on read from the recipe and the latest
//! purchase price of each ingredient. They are never stored.
//!
//! ```text
//! cost   = Σ ingredient.quantity × product.last_price
//! margin = round1((price - cost) / price × 100)      (0 when price is 0)
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Dish, Product};

/// A dish's derived cost figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DishCost {
    pub dish_id: String,
    pub price: Money,
    pub cost: Money,
    /// Percent of price kept after ingredient cost, one decimal.
    pub margin_percent: f64,
    /// Ingredients whose product was not found; they contribute zero cost.
    pub missing_products: Vec<String>,
}

/// Margin as a percent of price, rounded to one decimal.
///
/// ## Example
/// ```rust
/// use bistro_core::costing::margin_percent;
/// use bistro_core::Money;
///
/// assert_eq!(margin_percent(Money::from_cents(12000), Money::from_cents(4000)), 66.7);
/// assert_eq!(margin_percent(Money::zero(), Money::from_cents(4000)), 0.0);
/// ```
pub fn margin_percent(price: Money, cost: Money) -> f64 {
    if price.is_zero() {
        return 0.0;
    }
    let raw = (price - cost).cents() as f64 / price.cents() as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Costs a dish against the given products (keyed by product id).
pub fn dish_cost(dish: &Dish, products: &HashMap<String, Product>) -> DishCost {
    let mut cost = Money::zero();
    let mut missing_products = Vec::new();

    for ingredient in &dish.ingredients {
        match products.get(&ingredient.product_id) {
            Some(product) => cost += product.last_price.scale(ingredient.quantity),
            None => missing_products.push(ingredient.product_id.clone()),
        }
    }

    DishCost {
        dish_id: dish.id.clone(),
        price: dish.price,
        cost,
        margin_percent: margin_percent(dish.price, cost),
        missing_products,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DishIngredient;
    use chrono::Utc;

    fn product(id: &str, price_cents: i64) -> Product {
        Product {
            id: id.to_string(),
            restaurant_id: "r".to_string(),
            name: id.to_string(),
            unit: "kg".to_string(),
            category: None,
            reorder_level: 0.0,
            last_price: Money::from_cents(price_cents),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ingredient(product_id: &str, quantity: f64) -> DishIngredient {
        DishIngredient {
            id: format!("i-{product_id}"),
            dish_id: "pad-thai".to_string(),
            product_id: product_id.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_pad_thai_cost_and_margin() {
        let products: HashMap<_, _> = [product("noodles", 4550), product("shrimp", 38000)]
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let dish = Dish {
            id: "pad-thai".to_string(),
            restaurant_id: "r".to_string(),
            name: "Pad Thai".to_string(),
            category: Some("mains".to_string()),
            price: Money::from_cents(12000),
            is_active: true,
            created_at: Utc::now(),
            ingredients: vec![ingredient("noodles", 0.3), ingredient("shrimp", 0.08)],
        };

        let cost = dish_cost(&dish, &products);
        // 0.3 × 45.50 = 13.65, 0.08 × 380.00 = 30.40
        assert_eq!(cost.cost.cents(), 4405);
        assert_eq!(cost.margin_percent, 63.3);
        assert!(cost.missing_products.is_empty());
    }

    #[test]
    fn test_unknown_ingredient_is_reported() {
        let dish = Dish {
            id: "d".to_string(),
            restaurant_id: "r".to_string(),
            name: "Mystery".to_string(),
            category: None,
            price: Money::from_cents(1000),
            is_active: true,
            created_at: Utc::now(),
            ingredients: vec![ingredient("ghost", 1.0)],
        };
        let cost = dish_cost(&dish, &HashMap::new());
        assert!(cost.cost.is_zero());
        assert_eq!(cost.margin_percent, 100.0);
        assert_eq!(cost.missing_products, vec!["ghost".to_string()]);
    }

    #[test]
    fn test_negative_margin_when_cost_exceeds_price() {
        assert_eq!(margin_percent(Money::from_cents(1000), Money::from_cents(1500)), -50.0);
    }
}
