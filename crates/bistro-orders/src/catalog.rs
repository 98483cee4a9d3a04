//! # Catalog
//!
//! Back-office edits of products and dishes. Lists are cached per
//! restaurant; every write goes through [`OptimisticMutation`] so the list
//! updates at once and snaps back if the store refuses.
//!
//! | Operation        | Patch          | Also invalidates        |
//! |------------------|----------------|-------------------------|
//! | save_product     | upsert         | stock, dishes (costs)   |
//! | archive_product  | remove         | stock, dishes (costs)   |
//! | delete_product   | remove         | stock                   |
//! | save_dish        | upsert         | dishes (costs)          |
//! | archive_dish     | remove         |                         |

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use bistro_core::validation::{
    validate_ingredient_quantity, validate_name, validate_price_cents, validate_reorder_level,
};
use bistro_core::{CoreError, Dish, DishCost, Product};

use crate::cache::{keys, OptimisticMutation, Patch, QueryCache};
use crate::error::OrdersResult;
use crate::ledger::CatalogStore;
use crate::prefs::SessionContext;

pub struct CatalogService {
    store: Arc<dyn CatalogStore>,
    cache: QueryCache,
    session: SessionContext,
}

impl CatalogService {
    pub fn new(store: Arc<dyn CatalogStore>, cache: QueryCache, session: SessionContext) -> Self {
        CatalogService { store, cache, session }
    }

    fn rid(&self) -> &str {
        &self.session.restaurant_id
    }

    fn products_key(&self) -> String {
        keys::scoped(keys::PRODUCTS, &[self.rid()])
    }

    fn dishes_key(&self) -> String {
        keys::scoped(keys::DISHES, &[self.rid()])
    }

    fn costs_key(&self) -> String {
        keys::scoped(keys::DISHES, &[self.rid(), "costs"])
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Active products, by name.
    pub async fn products(&self) -> OrdersResult<Vec<Product>> {
        let rid = self.rid();
        Ok(self
            .cache
            .fetch(&self.products_key(), || self.store.list_products(rid, false))
            .await?)
    }

    pub async fn save_product(&self, product: Product) -> OrdersResult<Product> {
        validate_name("name", &product.name).map_err(CoreError::from)?;
        validate_name("unit", &product.unit).map_err(CoreError::from)?;
        validate_reorder_level(product.reorder_level).map_err(CoreError::from)?;
        validate_price_cents("last_price", product.last_price.cents()).map_err(CoreError::from)?;

        let product = Product {
            restaurant_id: self.rid().to_string(),
            updated_at: Utc::now(),
            ..product
        };

        let saved = OptimisticMutation::new(self.products_key(), Patch::upsert(product.clone()))
            .invalidates(keys::STOCK)
            .invalidates(self.dishes_key())
            .run(&self.cache, self.store.save_product(&product))
            .await?;

        info!(product_id = %saved.id, name = %saved.name, "Product saved");
        Ok(saved)
    }

    /// Soft delete. History keeps pointing at the product.
    pub async fn archive_product(&self, product_id: &str) -> OrdersResult<()> {
        OptimisticMutation::new(self.products_key(), Patch::remove::<Product>(product_id))
            .invalidates(keys::STOCK)
            .invalidates(self.dishes_key())
            .run(&self.cache, self.store.archive_product(product_id))
            .await?;

        info!(product_id = %product_id, "Product archived");
        Ok(())
    }

    /// Hard delete. Refused by the store once a recipe or movement
    /// references the product; archive it instead.
    pub async fn delete_product(&self, product_id: &str) -> OrdersResult<()> {
        OptimisticMutation::new(self.products_key(), Patch::remove::<Product>(product_id))
            .invalidates(keys::STOCK)
            .run(&self.cache, self.store.delete_product(product_id))
            .await?;

        info!(product_id = %product_id, "Product deleted");
        Ok(())
    }

    // =========================================================================
    // Dishes
    // =========================================================================

    pub async fn dishes(&self) -> OrdersResult<Vec<Dish>> {
        let rid = self.rid();
        Ok(self
            .cache
            .fetch(&self.dishes_key(), || self.store.list_dishes(rid, false))
            .await?)
    }

    pub async fn save_dish(&self, dish: Dish) -> OrdersResult<Dish> {
        validate_name("name", &dish.name).map_err(CoreError::from)?;
        validate_price_cents("price", dish.price.cents()).map_err(CoreError::from)?;
        for ingredient in &dish.ingredients {
            validate_ingredient_quantity(ingredient.quantity).map_err(CoreError::from)?;
        }

        let dish = Dish {
            restaurant_id: self.rid().to_string(),
            ..dish
        };

        let saved = OptimisticMutation::new(self.dishes_key(), Patch::upsert(dish.clone()))
            .run(&self.cache, self.store.save_dish(&dish))
            .await?;

        info!(dish_id = %saved.id, name = %saved.name, "Dish saved");
        Ok(saved)
    }

    pub async fn archive_dish(&self, dish_id: &str) -> OrdersResult<()> {
        OptimisticMutation::new(self.dishes_key(), Patch::remove::<Dish>(dish_id))
            .run(&self.cache, self.store.archive_dish(dish_id))
            .await?;

        info!(dish_id = %dish_id, "Dish archived");
        Ok(())
    }

    /// Cost and margin of every active dish at last purchase prices.
    pub async fn dish_costs(&self) -> OrdersResult<Vec<DishCost>> {
        let rid = self.rid();
        Ok(self
            .cache
            .fetch(&self.costs_key(), || self.store.dish_costs(rid))
            .await?)
    }
}
