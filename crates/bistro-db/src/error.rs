//! # Ledger Errors
//!
//! ```text
//! sqlx::Error ──────────────┐
//! stock check (sale items) ─┼──► DbError ──► LedgerError (bistro-orders)
//! migrate::MigrateError ────┘                    │
//!                                                ▼
//!                                        SaleError / Notice
//! ```
//!
//! Constraint failures are told apart by SQLite's message text; that is the
//! only place SQLite reports which kind of constraint fired.

use bistro_core::StockShortage;
use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Aggregated ingredient need exceeds the current-stock view for a
    /// product. Displays in the `INSUFFICIENT_STOCK` convention so it still
    /// parses when only the text survives.
    #[error("{0}")]
    InsufficientStock(StockShortage),

    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// A recipe still references a product being deleted, or an item
    /// references a missing dish.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// A column CHECK fired: non-positive quantity, unknown status value.
    #[error("Constraint violation: {0}")]
    CheckViolation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No pooled connection freed up within the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn shortage(product_id: impl Into<String>, missing: f64) -> Self {
        DbError::InsufficientStock(StockShortage::new(product_id, missing))
    }

    fn from_constraint(message: &str) -> Self {
        if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
            return DbError::UniqueViolation {
                field: columns.to_string(),
                value: "unknown".to_string(),
            };
        }
        if message.contains("FOREIGN KEY constraint failed") {
            return DbError::ForeignKeyViolation {
                message: message.to_string(),
            };
        }
        if message.contains("CHECK constraint failed") {
            return DbError::CheckViolation(message.to_string());
        }
        DbError::QueryFailed(message.to_string())
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => DbError::from_constraint(db_err.message()),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_messages() {
        assert!(matches!(
            DbError::from_constraint("UNIQUE constraint failed: products.restaurant_id, products.name"),
            DbError::UniqueViolation { ref field, .. } if field == "products.restaurant_id, products.name"
        ));
        assert!(matches!(
            DbError::from_constraint("FOREIGN KEY constraint failed"),
            DbError::ForeignKeyViolation { .. }
        ));
        assert!(matches!(
            DbError::from_constraint("CHECK constraint failed: quantity > 0"),
            DbError::CheckViolation(_)
        ));
        assert!(matches!(DbError::from_constraint("disk I/O error"), DbError::QueryFailed(_)));
    }

    #[test]
    fn test_shortage_keeps_message_convention() {
        let err = DbError::shortage("beef-01", 0.5);
        let parsed = StockShortage::parse(&err.to_string()).unwrap();
        assert_eq!(parsed.product_id, "beef-01");
        assert!((parsed.missing - 0.5).abs() < 1e-9);
    }
}
