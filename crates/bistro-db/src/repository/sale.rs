//! # Sale Repository
//!
//! Database operations for sales, sale items and the order boards.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. HEADER                                                             │
//! │     └── create() → Sale { status: pending, delivery: null, total: 0 }  │
//! │                                                                         │
//! │  2. ITEMS (one transaction)                                            │
//! │     └── insert_items()                                                 │
//! │         ├── claim write lock on the sale row                           │
//! │         ├── resolve every dish → ingredient graph                      │
//! │         ├── aggregate consumption per product across ALL lines         │
//! │         ├── compare with v_current_stock                               │
//! │         │     short? → rollback, InsufficientStock(first short product)│
//! │         └── write items + consumption + total, commit                  │
//! │                                                                         │
//! │  3. COMPENSATION (caller decides)                                      │
//! │     └── delete() → header gone, items/consumption cascade              │
//! │                                                                         │
//! │  4. BOARDS                                                             │
//! │     └── list(query), set_kitchen_status(), set_delivery_status(),      │
//! │         assign_driver()                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bistro_core::{
    DailySummary, DeliveryStatus, DishSales, KitchenStatus, Money, NewSale, OrderQuery,
    ProductConsumption, Sale, SaleItem, SaleLine,
};

const SALE_COLUMNS: &str = r#"
    id, restaurant_id, sale_date, created_at, total_amount, status, order_type,
    delivery_status, assigned_driver_id, table_number, customer_name,
    customer_phone, delivery_address, delivery_fee, payment_method, payment_status
"#;

/// Shortfalls below this are float noise, not missing stock.
const STOCK_EPSILON: f64 = 1e-9;

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Header
    // =========================================================================

    /// Creates a sale header: kitchen status `pending`, delivery status
    /// null, total 0.
    pub async fn create(&self, new_sale: &NewSale) -> DbResult<Sale> {
        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            restaurant_id: new_sale.restaurant_id.clone(),
            sale_date: now,
            created_at: now,
            total_amount: Money::zero(),
            status: KitchenStatus::Pending,
            order_type: new_sale.order_type,
            delivery_status: None,
            assigned_driver_id: None,
            table_number: new_sale.table_number.clone(),
            customer_name: new_sale.customer_name.clone(),
            customer_phone: new_sale.customer_phone.clone(),
            delivery_address: new_sale.delivery_address.clone(),
            delivery_fee: new_sale.delivery_fee,
            payment_method: new_sale.payment_method,
            payment_status: new_sale.payment_status,
            items: Vec::new(),
        };

        debug!(sale_id = %sale.id, order_type = ?sale.order_type, "Creating sale header");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, restaurant_id, sale_date, created_at, total_amount, status,
                order_type, delivery_status, assigned_driver_id, table_number,
                customer_name, customer_phone, delivery_address, delivery_fee,
                payment_method, payment_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.restaurant_id)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.total_amount)
        .bind(sale.status)
        .bind(sale.order_type)
        .bind(&sale.table_number)
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(&sale.delivery_address)
        .bind(sale.delivery_fee)
        .bind(sale.payment_method)
        .bind(sale.payment_status)
        .execute(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Deletes a sale. Items and their stock consumption cascade, so the
    /// ledger returns to where it was before the sale.
    pub async fn delete(&self, sale_id: &str) -> DbResult<()> {
        info!(sale_id = %sale_id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(sale_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }
        Ok(())
    }

    /// Gets a sale with its items.
    pub async fn get_by_id(&self, sale_id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;

        match sale {
            Some(mut sale) => {
                sale.items = self.get_items(&sale.id).await?;
                Ok(Some(sale))
            }
            None => Ok(None),
        }
    }

    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut by_sale = self.items_for(&[sale_id.to_string()]).await?;
        Ok(by_sale.remove(sale_id).unwrap_or_default())
    }

    // =========================================================================
    // Stock-checked items
    // =========================================================================

    /// Inserts the items of a sale, atomically and stock-checked.
    ///
    /// Ingredient consumption is aggregated per product across every line
    /// before comparing with the current-stock view, so two lines of the same
    /// dish are checked together. If any product is short nothing is written
    /// and the first short product (in line order) is reported.
    ///
    /// ## Errors
    /// - `InsufficientStock` - a product cannot cover the aggregated need
    /// - `NotFound` - the sale or a dish does not exist
    /// - `CheckViolation` - no lines, or a quantity <= 0
    pub async fn insert_items(&self, sale_id: &str, lines: &[SaleLine]) -> DbResult<Vec<SaleItem>> {
        if lines.is_empty() {
            return Err(DbError::CheckViolation("a sale needs at least one item".to_string()));
        }
        if let Some(bad) = lines.iter().find(|l| l.quantity <= 0) {
            return Err(DbError::CheckViolation(format!(
                "quantity must be positive for dish {}",
                bad.dish_id
            )));
        }

        debug!(sale_id = %sale_id, lines = lines.len(), "Inserting sale items");

        let mut tx = self.pool.begin().await?;

        // A no-op write takes SQLite's write lock before the stock read, so
        // two terminals selling the same product are checked one after the other.
        let claimed = sqlx::query("UPDATE sales SET total_amount = total_amount WHERE id = ?1")
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;
        if claimed.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }

        // Resolve dishes and aggregate consumption in first-seen order.
        let mut resolved: Vec<(String, Vec<(String, f64)>)> = Vec::with_capacity(lines.len());
        let mut needed: Vec<(String, f64)> = Vec::new();
        let mut slot: HashMap<String, usize> = HashMap::new();

        for line in lines {
            let dish_name: Option<String> = sqlx::query_scalar("SELECT name FROM dishes WHERE id = ?1")
                .bind(&line.dish_id)
                .fetch_optional(&mut *tx)
                .await?;
            let dish_name = dish_name.ok_or_else(|| DbError::not_found("Dish", &line.dish_id))?;

            let recipe = sqlx::query_as::<_, (String, f64)>(
                "SELECT product_id, quantity FROM dish_ingredients WHERE dish_id = ?1",
            )
            .bind(&line.dish_id)
            .fetch_all(&mut *tx)
            .await?;

            for (product_id, per_unit) in &recipe {
                let qty = per_unit * line.quantity as f64;
                match slot.get(product_id) {
                    Some(&i) => needed[i].1 += qty,
                    None => {
                        slot.insert(product_id.clone(), needed.len());
                        needed.push((product_id.clone(), qty));
                    }
                }
            }
            resolved.push((dish_name, recipe));
        }

        for (product_id, need) in &needed {
            let available: Option<f64> =
                sqlx::query_scalar("SELECT current_quantity FROM v_current_stock WHERE product_id = ?1")
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let available = available.unwrap_or(0.0);

            if need - available > STOCK_EPSILON {
                let missing = need - available;
                warn!(
                    sale_id = %sale_id,
                    product_id = %product_id,
                    needed = need,
                    available,
                    missing,
                    "Insufficient stock, rejecting sale items"
                );
                tx.rollback().await?;
                return Err(DbError::shortage(product_id.clone(), missing));
            }
        }

        let mut items = Vec::with_capacity(lines.len());
        let mut total = Money::zero();

        for (line, (dish_name, recipe)) in lines.iter().zip(resolved) {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.to_string(),
                dish_id: line.dish_id.clone(),
                dish_name,
                quantity: line.quantity,
                unit_price: line.unit_price,
                total_price: line.total_price(),
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (id, sale_id, dish_id, quantity, unit_price, total_price)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.dish_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await?;

            for (product_id, per_unit) in recipe {
                sqlx::query(
                    "INSERT INTO stock_consumptions (id, sale_item_id, product_id, quantity)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&item.id)
                .bind(product_id)
                .bind(per_unit * item.quantity as f64)
                .execute(&mut *tx)
                .await?;
            }

            total += item.total_price;
            items.push(item);
        }

        sqlx::query("UPDATE sales SET total_amount = total_amount + ?1 WHERE id = ?2")
            .bind(total)
            .bind(sale_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(sale_id = %sale_id, items = items.len(), total = %total, "Sale items committed");
        Ok(items)
    }

    // =========================================================================
    // Boards
    // =========================================================================

    /// Lists sales matching a board query, oldest first, with items.
    pub async fn list(&self, query: &OrderQuery) -> DbResult<Vec<Sale>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SALE_COLUMNS} FROM sales WHERE restaurant_id = "));
        qb.push_bind(query.restaurant_id.clone());

        if let Some(order_type) = query.order_type {
            qb.push(" AND order_type = ").push_bind(order_type);
        }
        if let Some(status) = query.status_not {
            qb.push(" AND status != ").push_bind(status);
        }
        if let Some(delivery) = query.delivery_status_not {
            // null reads as pending_pickup
            if delivery == DeliveryStatus::PendingPickup {
                qb.push(" AND delivery_status IS NOT NULL AND delivery_status != ")
                    .push_bind(delivery);
            } else {
                qb.push(" AND (delivery_status IS NULL OR delivery_status != ")
                    .push_bind(delivery)
                    .push(")");
            }
        }
        if let Some(driver) = &query.assigned_driver_id {
            qb.push(" AND assigned_driver_id = ").push_bind(driver.clone());
        }
        qb.push(" ORDER BY created_at ASC, rowid ASC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let mut sales = qb.build_query_as::<Sale>().fetch_all(&self.pool).await?;

        let ids: Vec<String> = sales.iter().map(|s| s.id.clone()).collect();
        let mut items = self.items_for(&ids).await?;
        for sale in &mut sales {
            sale.items = items.remove(&sale.id).unwrap_or_default();
        }

        debug!(restaurant_id = %query.restaurant_id, count = sales.len(), "Listed sales");
        Ok(sales)
    }

    /// Sets the kitchen status. With `expected`, the write only lands if the
    /// row still has that status.
    ///
    /// Returns `false` when `expected` did not match.
    pub async fn set_kitchen_status(
        &self,
        sale_id: &str,
        to: KitchenStatus,
        expected: Option<KitchenStatus>,
    ) -> DbResult<bool> {
        debug!(sale_id = %sale_id, to = %to, expected = ?expected, "Updating kitchen status");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE sales SET status = ");
        qb.push_bind(to);
        qb.push(" WHERE id = ").push_bind(sale_id.to_string());
        if let Some(prior) = expected {
            qb.push(" AND status = ").push_bind(prior);
        }

        let result = qb.build().execute(&self.pool).await?;
        self.updated_or_missing(sale_id, result.rows_affected()).await
    }

    /// Sets the delivery status. `expected = PendingPickup` also matches null.
    pub async fn set_delivery_status(
        &self,
        sale_id: &str,
        to: DeliveryStatus,
        expected: Option<DeliveryStatus>,
    ) -> DbResult<bool> {
        debug!(sale_id = %sale_id, to = %to, expected = ?expected, "Updating delivery status");

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE sales SET delivery_status = ");
        qb.push_bind(to);
        qb.push(" WHERE id = ").push_bind(sale_id.to_string());
        match expected {
            Some(DeliveryStatus::PendingPickup) => {
                qb.push(" AND (delivery_status IS NULL OR delivery_status = ")
                    .push_bind(DeliveryStatus::PendingPickup)
                    .push(")");
            }
            Some(prior) => {
                qb.push(" AND delivery_status = ").push_bind(prior);
            }
            None => {}
        }

        let result = qb.build().execute(&self.pool).await?;
        self.updated_or_missing(sale_id, result.rows_affected()).await
    }

    /// Sets or clears the assigned driver. Status is left alone.
    pub async fn assign_driver(&self, sale_id: &str, driver_id: Option<&str>) -> DbResult<()> {
        debug!(sale_id = %sale_id, driver_id = ?driver_id, "Assigning driver");

        let result = sqlx::query("UPDATE sales SET assigned_driver_id = ?1 WHERE id = ?2")
            .bind(driver_id)
            .bind(sale_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", sale_id));
        }
        Ok(())
    }

    // =========================================================================
    // Reporting
    // =========================================================================

    /// Revenue, sale count and dish count for one UTC calendar day.
    pub async fn daily_summary(&self, restaurant_id: &str, date: NaiveDate) -> DbResult<DailySummary> {
        let day = date.format("%Y-%m-%d").to_string();

        let (sales_count, revenue): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_amount), 0)
             FROM sales
             WHERE restaurant_id = ?1 AND substr(sale_date, 1, 10) = ?2",
        )
        .bind(restaurant_id)
        .bind(&day)
        .fetch_one(&self.pool)
        .await?;

        let items_count: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(si.quantity), 0)
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             WHERE s.restaurant_id = ?1 AND substr(s.sale_date, 1, 10) = ?2",
        )
        .bind(restaurant_id)
        .bind(&day)
        .fetch_one(&self.pool)
        .await?;

        Ok(DailySummary {
            date,
            revenue: Money::from_cents(revenue),
            sales_count,
            items_count,
        })
    }

    /// Per-dish portions and revenue for one UTC day, best earners first.
    pub async fn dish_sales(&self, restaurant_id: &str, date: NaiveDate) -> DbResult<Vec<DishSales>> {
        self.dish_totals(restaurant_id, date, "revenue DESC, quantity DESC", None)
            .await
    }

    /// The `limit` dishes with the most portions sold that day.
    pub async fn top_dishes(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
        limit: u32,
    ) -> DbResult<Vec<DishSales>> {
        self.dish_totals(restaurant_id, date, "quantity DESC, revenue DESC", Some(limit))
            .await
    }

    /// Stock drawn by the day's sales, per product, largest first.
    pub async fn product_consumption(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
    ) -> DbResult<Vec<ProductConsumption>> {
        let day = date.format("%Y-%m-%d").to_string();
        let rows = sqlx::query_as::<_, ProductConsumption>(
            "SELECT p.id AS product_id, p.name AS product_name, p.unit,
                    SUM(sc.quantity) AS quantity
             FROM stock_consumptions sc
             JOIN sale_items si ON si.id = sc.sale_item_id
             JOIN sales s ON s.id = si.sale_id
             JOIN products p ON p.id = sc.product_id
             WHERE s.restaurant_id = ?1 AND substr(s.sale_date, 1, 10) = ?2
             GROUP BY p.id, p.name, p.unit
             ORDER BY quantity DESC, p.name",
        )
        .bind(restaurant_id)
        .bind(&day)
        .fetch_all(&self.pool)
        .await?;

        debug!(restaurant_id, %day, products = rows.len(), "Product consumption");
        Ok(rows)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn dish_totals(
        &self,
        restaurant_id: &str,
        date: NaiveDate,
        order_by: &str,
        limit: Option<u32>,
    ) -> DbResult<Vec<DishSales>> {
        let day = date.format("%Y-%m-%d").to_string();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT d.id AS dish_id, d.name AS dish_name,
                    SUM(si.quantity) AS quantity, SUM(si.total_price) AS revenue
             FROM sale_items si
             JOIN sales s ON s.id = si.sale_id
             JOIN dishes d ON d.id = si.dish_id
             WHERE s.restaurant_id = ",
        );
        qb.push_bind(restaurant_id);
        qb.push(" AND substr(s.sale_date, 1, 10) = ");
        qb.push_bind(day);
        qb.push(" GROUP BY d.id, d.name ORDER BY ");
        qb.push(order_by);
        qb.push(", d.name");
        if let Some(limit) = limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        Ok(qb.build_query_as::<DishSales>().fetch_all(&self.pool).await?)
    }

    async fn items_for(&self, sale_ids: &[String]) -> DbResult<HashMap<String, Vec<SaleItem>>> {
        let mut by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();
        if sale_ids.is_empty() {
            return Ok(by_sale);
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT si.id, si.sale_id, si.dish_id, d.name AS dish_name, si.quantity,
                    si.unit_price, si.total_price
             FROM sale_items si
             JOIN dishes d ON d.id = si.dish_id
             WHERE si.sale_id IN (",
        );
        let mut ids = qb.separated(", ");
        for id in sale_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(") ORDER BY si.rowid");

        let rows = qb.build_query_as::<SaleItem>().fetch_all(&self.pool).await?;
        for item in rows {
            by_sale.entry(item.sale_id.clone()).or_default().push(item);
        }
        Ok(by_sale)
    }

    async fn updated_or_missing(&self, sale_id: &str, rows: u64) -> DbResult<bool> {
        if rows > 0 {
            return Ok(true);
        }
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM sales WHERE id = ?1")
            .bind(sale_id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DbError::not_found("Sale", sale_id)),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
