//! # Demo Restaurant
//!
//! Creates a small, deterministic restaurant used by the seed binary and by
//! tests across the workspace.
//!
//! ```text
//!   Products                     on hand   reorder at   last price
//!   Rice noodles (kg)            0.4       1.0          45.50   ← already low
//!   Shrimp (kg)                  2.0       0.5          380.00
//!   Rice paper (pcs)             100       20           2.00
//!
//!   Dishes                       price     recipe
//!   Pad Thai                     120.00    0.3 kg noodles + 0.08 kg shrimp
//!   Spring Rolls                 80.00     4 pcs rice paper
//!
//!   Members: one owner, two drivers
//! ```
//!
//! With 0.4 kg of noodles, one Pad Thai fits and two are short by 0.2 kg.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use crate::pool::Database;
use bistro_core::{
    Dish, DishIngredient, Money, Product, Restaurant, RestaurantMember, RestaurantRole,
};

/// Identifiers of everything [`seed`] created.
#[derive(Debug, Clone)]
pub struct DemoIds {
    pub restaurant_id: String,
    pub owner_id: String,
    pub noodles_id: String,
    pub shrimp_id: String,
    pub rice_paper_id: String,
    pub pad_thai_id: String,
    pub spring_rolls_id: String,
    pub driver_ids: Vec<String>,
}

/// Seeds the demo restaurant into an empty (or any) database.
pub async fn seed(db: &Database) -> DbResult<DemoIds> {
    let restaurant_id = new_id();
    db.members()
        .create_restaurant(&Restaurant {
            id: restaurant_id.clone(),
            name: "Baan Noodle House".to_string(),
            currency: "THB".to_string(),
            timezone: "Asia/Bangkok".to_string(),
            is_active: true,
        })
        .await?;

    let owner_id = new_id();
    add_member(db, &restaurant_id, &owner_id, "Ploy", RestaurantRole::Owner).await?;

    let mut driver_ids = Vec::new();
    for name in ["Somchai", "Nok"] {
        let user_id = new_id();
        add_member(db, &restaurant_id, &user_id, name, RestaurantRole::Driver).await?;
        driver_ids.push(user_id);
    }

    let noodles_id = add_product(db, &restaurant_id, "Rice noodles", "kg", 1.0, 4550, 0.4).await?;
    let shrimp_id = add_product(db, &restaurant_id, "Shrimp", "kg", 0.5, 38000, 2.0).await?;
    let rice_paper_id = add_product(db, &restaurant_id, "Rice paper", "pcs", 20.0, 200, 100.0).await?;

    let pad_thai_id = add_dish(
        db,
        &restaurant_id,
        "Pad Thai",
        12000,
        &[(&noodles_id, 0.3), (&shrimp_id, 0.08)],
    )
    .await?;
    let spring_rolls_id =
        add_dish(db, &restaurant_id, "Spring Rolls", 8000, &[(&rice_paper_id, 4.0)]).await?;

    info!(restaurant_id = %restaurant_id, "Demo restaurant seeded");

    Ok(DemoIds {
        restaurant_id,
        owner_id,
        noodles_id,
        shrimp_id,
        rice_paper_id,
        pad_thai_id,
        spring_rolls_id,
        driver_ids,
    })
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

async fn add_member(
    db: &Database,
    restaurant_id: &str,
    user_id: &str,
    name: &str,
    role: RestaurantRole,
) -> DbResult<()> {
    db.members()
        .add_member(&RestaurantMember {
            restaurant_id: restaurant_id.to_string(),
            user_id: user_id.to_string(),
            display_name: name.to_string(),
            role,
        })
        .await
}

/// Creates a product and buys its opening stock at `price_cents`.
async fn add_product(
    db: &Database,
    restaurant_id: &str,
    name: &str,
    unit: &str,
    reorder_level: f64,
    price_cents: i64,
    on_hand: f64,
) -> DbResult<String> {
    let now = Utc::now();
    let product = db
        .products()
        .upsert(&Product {
            id: new_id(),
            restaurant_id: restaurant_id.to_string(),
            name: name.to_string(),
            unit: unit.to_string(),
            category: None,
            reorder_level,
            last_price: Money::zero(),
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await?;

    db.stock()
        .record_purchase(restaurant_id, &product.id, on_hand, Money::from_cents(price_cents))
        .await?;

    Ok(product.id)
}

async fn add_dish(
    db: &Database,
    restaurant_id: &str,
    name: &str,
    price_cents: i64,
    recipe: &[(&String, f64)],
) -> DbResult<String> {
    let dish_id = new_id();
    let ingredients = recipe
        .iter()
        .map(|(product_id, quantity)| DishIngredient {
            id: new_id(),
            dish_id: dish_id.clone(),
            product_id: (*product_id).clone(),
            quantity: *quantity,
        })
        .collect();

    let dish = db
        .dishes()
        .upsert(&Dish {
            id: dish_id,
            restaurant_id: restaurant_id.to_string(),
            name: name.to_string(),
            category: Some("Mains".to_string()),
            price: Money::from_cents(price_cents),
            is_active: true,
            created_at: Utc::now(),
            ingredients,
        })
        .await?;

    Ok(dish.id)
}
