//! # Product Repository
//!
//! Database operations for ingredients (products).
//!
//! ## Archive vs Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  archive(id)  → is_active = 0, row stays                               │
//! │                 recipes, purchases and consumption history keep        │
//! │                 pointing at it                                          │
//! │                                                                         │
//! │  delete(id)   → hard delete; fails with ForeignKeyViolation once        │
//! │                 anything references the product                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use bistro_core::{Money, Product};

const PRODUCT_COLUMNS: &str = r#"
    id, restaurant_id, name, unit, category, reorder_level,
    last_price, is_active, created_at, updated_at
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists a restaurant's products by name. Archived ones only when asked.
    pub async fn list(&self, restaurant_id: &str, include_archived: bool) -> DbResult<Vec<Product>> {
        debug!(restaurant_id = %restaurant_id, include_archived, "Listing products");

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE restaurant_id = ?1 AND (?2 OR is_active = 1)
             ORDER BY name"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(restaurant_id)
            .bind(include_archived)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Inserts or replaces a product by id. `updated_at` is set to now.
    pub async fn upsert(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, name = %product.name, "Upserting product");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO products (
                id, restaurant_id, name, unit, category, reorder_level,
                last_price, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                unit = excluded.unit,
                category = excluded.category,
                reorder_level = excluded.reorder_level,
                last_price = excluded.last_price,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.id)
        .bind(&product.restaurant_id)
        .bind(&product.name)
        .bind(&product.unit)
        .bind(&product.category)
        .bind(product.reorder_level)
        .bind(product.last_price)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_by_id(&product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &product.id))
    }

    /// Records the latest purchase price.
    pub async fn set_last_price(&self, id: &str, price: Money) -> DbResult<()> {
        let result = sqlx::query("UPDATE products SET last_price = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(price)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Soft-deletes a product (`is_active = 0`).
    pub async fn archive(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Archiving product");

        let result = sqlx::query("UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Hard-deletes a product that nothing references yet.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting product");

        let result = sqlx::query("DELETE FROM products WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::demo;
    use crate::{Database, DbConfig, DbError};

    #[tokio::test]
    async fn test_archive_hides_from_default_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let repo = db.products();

        let before = repo.list(&ids.restaurant_id, false).await.unwrap();
        repo.archive(&ids.noodles_id).await.unwrap();
        let after = repo.list(&ids.restaurant_id, false).await.unwrap();
        let all = repo.list(&ids.restaurant_id, true).await.unwrap();

        assert_eq!(after.len(), before.len() - 1);
        assert_eq!(all.len(), before.len());
        assert!(!repo.get_by_id(&ids.noodles_id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_delete_referenced_product_fails() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();

        // Pad Thai's recipe references noodles
        let err = db.products().delete(&ids.noodles_id).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let repo = db.products();

        let mut noodles = repo.get_by_id(&ids.noodles_id).await.unwrap().unwrap();
        noodles.reorder_level = 3.0;
        let saved = repo.upsert(&noodles).await.unwrap();

        assert_eq!(saved.reorder_level, 3.0);
        assert_eq!(saved.created_at, noodles.created_at);
    }
}
