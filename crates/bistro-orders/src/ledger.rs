//! # Store Seams
//!
//! The traits the workflows and boards talk to, and their implementation on
//! the SQLite [`Database`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleWorkflow ──► StockLedger      create / insert items / delete      │
//! │  Boards       ──► OrderSource      list / status updates / assign      │
//! │  DispatchBoard──► DriverDirectory  drivers of a restaurant             │
//! │  Catalog UI   ──► CatalogStore     products, dishes, costing           │
//! │                        │                                                │
//! │                        ▼                                                │
//! │                  bistro_db::Database   (or an in-memory fake in tests) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `insert_sale_items` is the only write path that consumes stock, and
//! `adjust_stock` the only manual one.

use async_trait::async_trait;
use chrono::NaiveDate;

use bistro_core::{
    DailySummary, DeliveryStatus, Dish, DishCost, DishSales, KitchenStatus, NewSale, OrderQuery,
    Product, ProductConsumption, RestaurantMember, Sale, SaleItem, SaleLine, StockAdjustment,
    StockRow,
};
use bistro_db::Database;

use crate::error::LedgerResult;

// =============================================================================
// Traits
// =============================================================================

/// Sale headers, stock-checked items and stock reads.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Inserts a header: kitchen status `pending`, delivery status null, total 0.
    async fn create_sale(&self, new_sale: &NewSale) -> LedgerResult<Sale>;

    /// Atomic and stock-checked. On a shortage nothing is written and the
    /// error names the first short product.
    async fn insert_sale_items(&self, sale_id: &str, lines: &[SaleLine]) -> LedgerResult<Vec<SaleItem>>;

    /// Compensation delete. Items and their consumption go with the header.
    async fn delete_sale(&self, sale_id: &str) -> LedgerResult<()>;

    async fn fetch_sale(&self, sale_id: &str) -> LedgerResult<Option<Sale>>;

    /// Current stock, products needing reorder first.
    async fn current_stock(&self, restaurant_id: &str) -> LedgerResult<Vec<StockRow>>;

    /// Manual movement. Loss and waste always decrement.
    async fn adjust_stock(&self, adjustment: &StockAdjustment) -> LedgerResult<()>;

    async fn daily_summary(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<DailySummary>;

    /// Per-dish portions and revenue for the day, best earners first.
    async fn dish_sales(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<Vec<DishSales>>;

    /// Most portions sold first.
    async fn top_dishes(&self, restaurant_id: &str, date: NaiveDate, limit: u32) -> LedgerResult<Vec<DishSales>>;

    /// Stock the day's sales drew, per product.
    async fn product_consumption(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<ProductConsumption>>;
}

/// Reads and status writes for the order boards.
///
/// Status writes are last-writer-wins unless `expected` is given, in which
/// case they only land if the stored status still equals it. `Ok(false)`
/// means it did not.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn list_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<Sale>>;

    async fn set_kitchen_status(
        &self,
        sale_id: &str,
        to: KitchenStatus,
        expected: Option<KitchenStatus>,
    ) -> LedgerResult<bool>;

    async fn set_delivery_status(
        &self,
        sale_id: &str,
        to: DeliveryStatus,
        expected: Option<DeliveryStatus>,
    ) -> LedgerResult<bool>;

    async fn assign_driver(&self, sale_id: &str, driver_id: Option<&str>) -> LedgerResult<()>;
}

#[async_trait]
pub trait DriverDirectory: Send + Sync {
    async fn drivers(&self, restaurant_id: &str) -> LedgerResult<Vec<RestaurantMember>>;
}

/// Products and dishes, as edited from the back office.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list_products(&self, restaurant_id: &str, include_archived: bool) -> LedgerResult<Vec<Product>>;
    async fn save_product(&self, product: &Product) -> LedgerResult<Product>;
    async fn archive_product(&self, product_id: &str) -> LedgerResult<()>;
    async fn delete_product(&self, product_id: &str) -> LedgerResult<()>;

    async fn list_dishes(&self, restaurant_id: &str, include_archived: bool) -> LedgerResult<Vec<Dish>>;
    async fn save_dish(&self, dish: &Dish) -> LedgerResult<Dish>;
    async fn archive_dish(&self, dish_id: &str) -> LedgerResult<()>;
    async fn dish_costs(&self, restaurant_id: &str) -> LedgerResult<Vec<DishCost>>;
}

// =============================================================================
// SQLite Implementation
// =============================================================================

#[async_trait]
impl StockLedger for Database {
    async fn create_sale(&self, new_sale: &NewSale) -> LedgerResult<Sale> {
        Ok(self.sales().create(new_sale).await?)
    }

    async fn insert_sale_items(&self, sale_id: &str, lines: &[SaleLine]) -> LedgerResult<Vec<SaleItem>> {
        Ok(self.sales().insert_items(sale_id, lines).await?)
    }

    async fn delete_sale(&self, sale_id: &str) -> LedgerResult<()> {
        Ok(self.sales().delete(sale_id).await?)
    }

    async fn fetch_sale(&self, sale_id: &str) -> LedgerResult<Option<Sale>> {
        Ok(self.sales().get_by_id(sale_id).await?)
    }

    async fn current_stock(&self, restaurant_id: &str) -> LedgerResult<Vec<StockRow>> {
        Ok(self.stock().current(restaurant_id).await?)
    }

    async fn adjust_stock(&self, adjustment: &StockAdjustment) -> LedgerResult<()> {
        Ok(self.stock().adjust(adjustment).await?)
    }

    async fn daily_summary(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<DailySummary> {
        Ok(self.sales().daily_summary(restaurant_id, date).await?)
    }

    async fn dish_sales(&self, restaurant_id: &str, date: NaiveDate) -> LedgerResult<Vec<DishSales>> {
        Ok(self.sales().dish_sales(restaurant_id, date).await?)
    }

    async fn top_dishes(&self, restaurant_id: &str, date: NaiveDate, limit: u32) -> LedgerResult<Vec<DishSales>> {
        Ok(self.sales().top_dishes(restaurant_id, date, limit).await?)
    }

    async fn product_consumption(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<Vec<ProductConsumption>> {
        Ok(self.sales().product_consumption(restaurant_id, date).await?)
    }
}

#[async_trait]
impl OrderSource for Database {
    async fn list_orders(&self, query: &OrderQuery) -> LedgerResult<Vec<Sale>> {
        Ok(self.sales().list(query).await?)
    }

    async fn set_kitchen_status(
        &self,
        sale_id: &str,
        to: KitchenStatus,
        expected: Option<KitchenStatus>,
    ) -> LedgerResult<bool> {
        Ok(self.sales().set_kitchen_status(sale_id, to, expected).await?)
    }

    async fn set_delivery_status(
        &self,
        sale_id: &str,
        to: DeliveryStatus,
        expected: Option<DeliveryStatus>,
    ) -> LedgerResult<bool> {
        Ok(self.sales().set_delivery_status(sale_id, to, expected).await?)
    }

    async fn assign_driver(&self, sale_id: &str, driver_id: Option<&str>) -> LedgerResult<()> {
        Ok(self.sales().assign_driver(sale_id, driver_id).await?)
    }
}

#[async_trait]
impl DriverDirectory for Database {
    async fn drivers(&self, restaurant_id: &str) -> LedgerResult<Vec<RestaurantMember>> {
        Ok(self.members().drivers(restaurant_id).await?)
    }
}

#[async_trait]
impl CatalogStore for Database {
    async fn list_products(&self, restaurant_id: &str, include_archived: bool) -> LedgerResult<Vec<Product>> {
        Ok(self.products().list(restaurant_id, include_archived).await?)
    }

    async fn save_product(&self, product: &Product) -> LedgerResult<Product> {
        Ok(self.products().upsert(product).await?)
    }

    async fn archive_product(&self, product_id: &str) -> LedgerResult<()> {
        Ok(self.products().archive(product_id).await?)
    }

    async fn delete_product(&self, product_id: &str) -> LedgerResult<()> {
        Ok(self.products().delete(product_id).await?)
    }

    async fn list_dishes(&self, restaurant_id: &str, include_archived: bool) -> LedgerResult<Vec<Dish>> {
        Ok(self.dishes().list(restaurant_id, include_archived).await?)
    }

    async fn save_dish(&self, dish: &Dish) -> LedgerResult<Dish> {
        Ok(self.dishes().upsert(dish).await?)
    }

    async fn archive_dish(&self, dish_id: &str) -> LedgerResult<()> {
        Ok(self.dishes().archive(dish_id).await?)
    }

    async fn dish_costs(&self, restaurant_id: &str) -> LedgerResult<Vec<DishCost>> {
        Ok(self.dishes().costs(restaurant_id).await?)
    }
}
