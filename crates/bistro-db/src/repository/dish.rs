//! # Dish Repository
//!
//! Menu items with their recipes. Cost and margin are computed on read with
//! [`bistro_core::costing`]; nothing cost-related is stored.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use bistro_core::costing::{self, DishCost};
use bistro_core::{Dish, DishIngredient};

#[derive(Debug, Clone)]
pub struct DishRepository {
    pool: SqlitePool,
}

impl DishRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DishRepository { pool }
    }

    /// Gets a dish with its ingredients.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Dish>> {
        let dish = sqlx::query_as::<_, Dish>(
            "SELECT id, restaurant_id, name, category, price, is_active, created_at
             FROM dishes WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match dish {
            Some(mut dish) => {
                dish.ingredients = self.ingredients(&dish.id).await?;
                Ok(Some(dish))
            }
            None => Ok(None),
        }
    }

    /// Lists a restaurant's dishes with ingredients.
    pub async fn list(&self, restaurant_id: &str, include_archived: bool) -> DbResult<Vec<Dish>> {
        debug!(restaurant_id = %restaurant_id, include_archived, "Listing dishes");

        let mut dishes = sqlx::query_as::<_, Dish>(
            "SELECT id, restaurant_id, name, category, price, is_active, created_at
             FROM dishes
             WHERE restaurant_id = ?1 AND (?2 OR is_active = 1)
             ORDER BY name",
        )
        .bind(restaurant_id)
        .bind(include_archived)
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, DishIngredient>(
            "SELECT i.id, i.dish_id, i.product_id, i.quantity
             FROM dish_ingredients i
             JOIN dishes d ON d.id = i.dish_id
             WHERE d.restaurant_id = ?1",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_dish: HashMap<String, Vec<DishIngredient>> = HashMap::new();
        for row in rows {
            by_dish.entry(row.dish_id.clone()).or_default().push(row);
        }
        for dish in &mut dishes {
            dish.ingredients = by_dish.remove(&dish.id).unwrap_or_default();
        }

        Ok(dishes)
    }

    pub async fn ingredients(&self, dish_id: &str) -> DbResult<Vec<DishIngredient>> {
        let rows = sqlx::query_as::<_, DishIngredient>(
            "SELECT id, dish_id, product_id, quantity FROM dish_ingredients WHERE dish_id = ?1",
        )
        .bind(dish_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Inserts or updates a dish and replaces its recipe, in one transaction.
    pub async fn upsert(&self, dish: &Dish) -> DbResult<Dish> {
        debug!(id = %dish.id, name = %dish.name, ingredients = dish.ingredients.len(), "Upserting dish");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO dishes (id, restaurant_id, name, category, price, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price = excluded.price,
                is_active = excluded.is_active
            "#,
        )
        .bind(&dish.id)
        .bind(&dish.restaurant_id)
        .bind(&dish.name)
        .bind(&dish.category)
        .bind(dish.price)
        .bind(dish.is_active)
        .bind(dish.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM dish_ingredients WHERE dish_id = ?1")
            .bind(&dish.id)
            .execute(&mut *tx)
            .await?;

        for ingredient in &dish.ingredients {
            sqlx::query(
                "INSERT INTO dish_ingredients (id, dish_id, product_id, quantity) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&ingredient.id)
            .bind(&dish.id)
            .bind(&ingredient.product_id)
            .bind(ingredient.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.get_by_id(&dish.id)
            .await?
            .ok_or_else(|| DbError::not_found("Dish", &dish.id))
    }

    /// Soft-deletes a dish; it stays resolvable for historical sale items.
    pub async fn archive(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Archiving dish");

        let result = sqlx::query("UPDATE dishes SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Dish", id));
        }
        Ok(())
    }

    /// Hard-deletes a dish never sold. Its recipe cascades.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM dishes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Dish", id));
        }
        Ok(())
    }

    /// Cost and margin for every active dish of a restaurant.
    pub async fn costs(&self, restaurant_id: &str) -> DbResult<Vec<DishCost>> {
        let products = ProductRepository::new(self.pool.clone())
            .list(restaurant_id, true)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect::<HashMap<_, _>>();

        let dishes = self.list(restaurant_id, false).await?;
        Ok(dishes.iter().map(|d| costing::dish_cost(d, &products)).collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::demo;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_list_loads_recipes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();

        let dishes = db.dishes().list(&ids.restaurant_id, false).await.unwrap();
        let pad_thai = dishes.iter().find(|d| d.id == ids.pad_thai_id).unwrap();
        assert_eq!(pad_thai.ingredients.len(), 2);
    }

    #[tokio::test]
    async fn test_costs_are_derived() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();

        let costs = db.dishes().costs(&ids.restaurant_id).await.unwrap();
        let pad_thai = costs.iter().find(|c| c.dish_id == ids.pad_thai_id).unwrap();
        // 0.3 × 45.50 + 0.08 × 380.00
        assert_eq!(pad_thai.cost.cents(), 4405);
        assert_eq!(pad_thai.margin_percent, 63.3);
    }

    #[tokio::test]
    async fn test_upsert_replaces_recipe() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let repo = db.dishes();

        let mut dish = repo.get_by_id(&ids.pad_thai_id).await.unwrap().unwrap();
        dish.ingredients.truncate(1);
        let saved = repo.upsert(&dish).await.unwrap();
        assert_eq!(saved.ingredients.len(), 1);

        repo.archive(&ids.pad_thai_id).await.unwrap();
        let active = repo.list(&ids.restaurant_id, false).await.unwrap();
        assert!(active.iter().all(|d| d.id != ids.pad_thai_id));
    }
}
