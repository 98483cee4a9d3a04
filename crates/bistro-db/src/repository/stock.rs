//! # Stock Repository
//!
//! Reads the derived current-stock view and writes the two manual stock
//! movements: purchases and adjustments. Consumption is only ever written by
//! [`SaleRepository::insert_items`](super::sale::SaleRepository::insert_items).
//!
//! ```text
//!   purchases ─────┐
//!   adjustments ───┼──► v_current_stock ──► current(), low_stock()
//!   consumption ───┘ (subtracted)
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use bistro_core::{Money, StockAdjustment, StockRow};

const STOCK_SELECT: &str = r#"
    SELECT product_id, product_name, unit, current_quantity, reorder_level,
           (current_quantity < reorder_level) AS needs_reorder
    FROM v_current_stock
"#;

#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Current stock of every active product, products needing reorder first.
    pub async fn current(&self, restaurant_id: &str) -> DbResult<Vec<StockRow>> {
        debug!(restaurant_id = %restaurant_id, "Reading current stock");

        let sql = format!(
            "{STOCK_SELECT}
             WHERE restaurant_id = ?1 AND is_active = 1
             ORDER BY needs_reorder DESC, product_name"
        );

        let rows = sqlx::query_as::<_, StockRow>(&sql)
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Only the rows flagged for reorder (dashboard low-stock alert).
    pub async fn low_stock(&self, restaurant_id: &str) -> DbResult<Vec<StockRow>> {
        let sql = format!(
            "{STOCK_SELECT}
             WHERE restaurant_id = ?1 AND is_active = 1
               AND current_quantity < reorder_level
             ORDER BY product_name"
        );

        let rows = sqlx::query_as::<_, StockRow>(&sql)
            .bind(restaurant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Current quantity of one product, 0 if it has no movements.
    pub async fn quantity_of(&self, product_id: &str) -> DbResult<f64> {
        let qty: Option<f64> =
            sqlx::query_scalar("SELECT current_quantity FROM v_current_stock WHERE product_id = ?1")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        qty.ok_or_else(|| DbError::not_found("Product", product_id))
    }

    /// Records a manual adjustment. Loss and waste are stored negative
    /// whatever sign the caller used.
    pub async fn adjust(&self, adjustment: &StockAdjustment) -> DbResult<()> {
        let delta = adjustment.effective_delta();
        info!(
            product_id = %adjustment.product_id,
            kind = ?adjustment.adjustment_type,
            delta,
            "Adjusting stock"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (id, product_id, quantity, adjustment_type, reason, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.product_id)
        .bind(delta)
        .bind(adjustment.adjustment_type)
        .bind(&adjustment.reason)
        .bind(adjustment.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adjustments of one product, newest first.
    pub async fn adjustments(&self, product_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            r#"
            SELECT id, product_id, quantity, adjustment_type, reason, created_at
            FROM stock_adjustments
            WHERE product_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Records a purchase and makes its price the product's last price.
    pub async fn record_purchase(
        &self,
        restaurant_id: &str,
        product_id: &str,
        quantity: f64,
        unit_price: Money,
    ) -> DbResult<String> {
        debug!(product_id = %product_id, quantity, unit_price = %unit_price, "Recording purchase");

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO purchases (id, restaurant_id, product_id, quantity, unit_price, purchased_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&id)
        .bind(restaurant_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE products SET last_price = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(unit_price)
            .bind(now)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
