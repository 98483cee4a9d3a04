//! # Member Repository
//!
//! Restaurants (tenants) and their members. The driver directory is the set
//! of members with role `driver`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use bistro_core::{Restaurant, RestaurantMember, RestaurantRole};

#[derive(Debug, Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        MemberRepository { pool }
    }

    pub async fn create_restaurant(&self, restaurant: &Restaurant) -> DbResult<()> {
        info!(id = %restaurant.id, name = %restaurant.name, "Creating restaurant");

        sqlx::query(
            "INSERT INTO restaurants (id, name, currency, timezone, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&restaurant.id)
        .bind(&restaurant.name)
        .bind(&restaurant.currency)
        .bind(&restaurant.timezone)
        .bind(restaurant.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_restaurant(&self, id: &str) -> DbResult<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>(
            "SELECT id, name, currency, timezone, is_active FROM restaurants WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(restaurant)
    }

    /// Adds a member, or changes the role and name of an existing one.
    pub async fn add_member(&self, member: &RestaurantMember) -> DbResult<()> {
        debug!(
            restaurant_id = %member.restaurant_id,
            user_id = %member.user_id,
            role = ?member.role,
            "Adding member"
        );

        sqlx::query(
            r#"
            INSERT INTO restaurant_members (restaurant_id, user_id, display_name, role)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(restaurant_id, user_id) DO UPDATE SET
                display_name = excluded.display_name,
                role = excluded.role
            "#,
        )
        .bind(&member.restaurant_id)
        .bind(&member.user_id)
        .bind(&member.display_name)
        .bind(member.role)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn members(&self, restaurant_id: &str) -> DbResult<Vec<RestaurantMember>> {
        let rows = sqlx::query_as::<_, RestaurantMember>(
            "SELECT restaurant_id, user_id, display_name, role
             FROM restaurant_members
             WHERE restaurant_id = ?1
             ORDER BY display_name",
        )
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Members with role `driver`, by name.
    pub async fn drivers(&self, restaurant_id: &str) -> DbResult<Vec<RestaurantMember>> {
        let rows = sqlx::query_as::<_, RestaurantMember>(
            "SELECT restaurant_id, user_id, display_name, role
             FROM restaurant_members
             WHERE restaurant_id = ?1 AND role = ?2
             ORDER BY display_name",
        )
        .bind(restaurant_id)
        .bind(RestaurantRole::Driver)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::demo;
    use crate::{Database, DbConfig, DbError};
    use bistro_core::{RestaurantMember, RestaurantRole};

    #[tokio::test]
    async fn test_driver_directory() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ids = demo::seed(&db).await.unwrap();
        let members = db.members();

        let drivers = members.drivers(&ids.restaurant_id).await.unwrap();
        assert_eq!(drivers.len(), 2);
        assert!(drivers.iter().all(|d| d.role == RestaurantRole::Driver));
        assert_eq!(members.members(&ids.restaurant_id).await.unwrap().len(), 3);

        // promoting a driver removes them from the directory
        let mut first = drivers[0].clone();
        first.role = RestaurantRole::Manager;
        members.add_member(&first).await.unwrap();
        assert_eq!(members.drivers(&ids.restaurant_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_member_needs_restaurant() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let orphan = RestaurantMember {
            restaurant_id: "nowhere".to_string(),
            user_id: "u1".to_string(),
            display_name: "Nobody".to_string(),
            role: RestaurantRole::Staff,
        };
        let err = db.members().add_member(&orphan).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
