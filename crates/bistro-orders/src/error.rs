//! # Orders Error Types
//!
//! Error types for the ledger seam, the sale workflow and the boards.
//!
//! ```text
//! DbError ──► LedgerError ──► SaleError ──► Notice      (what the operator sees)
//!                 │
//!                 └──────────► OrdersError ◄── CoreError, config, playback
//! ```
//!
//! A shortage can arrive structured (`LedgerError::InsufficientStock`) or
//! only as text in the `INSUFFICIENT_STOCK` convention; both end up as
//! `SaleError::InsufficientStock`.

use std::fmt;

use bistro_core::{CoreError, StockShortage, ValidationError};
use bistro_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for store calls.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// What a stock ledger (or order source) reports.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Structured shortage from a store that can report one.
    #[error("{0}")]
    InsufficientStock(StockShortage),

    /// Message-only failure. May still carry a shortage in the
    /// `INSUFFICIENT_STOCK` convention.
    #[error("{0}")]
    Backend(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The store refused the write (constraint, reference, bad quantity).
    #[error("Rejected by store: {0}")]
    Rejected(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// The shortage this error stands for, structured or parsed.
    pub fn shortage(&self) -> Option<StockShortage> {
        match self {
            LedgerError::InsufficientStock(shortage) => Some(shortage.clone()),
            LedgerError::Backend(message) => StockShortage::parse(message),
            _ => None,
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::InsufficientStock(shortage) => LedgerError::InsufficientStock(shortage),
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            rejected @ (DbError::CheckViolation(_)
            | DbError::ForeignKeyViolation { .. }
            | DbError::UniqueViolation { .. }) => LedgerError::Rejected(rejected.to_string()),
            down @ (DbError::ConnectionFailed(_) | DbError::PoolExhausted) => {
                LedgerError::Unavailable(down.to_string())
            }
            other => LedgerError::Backend(other.to_string()),
        }
    }
}

/// What the sale workflow reports to its caller.
#[derive(Debug, Clone, Error)]
pub enum SaleError {
    /// Rejected before any store call.
    #[error("Cart is empty")]
    EmptyCart,

    /// A line failed validation. Nothing was written.
    #[error("Invalid sale: {0}")]
    Invalid(String),

    /// Not enough stock for one product. Nothing was persisted.
    #[error("Insufficient stock for product {product_id} (missing {missing})")]
    InsufficientStock { product_id: String, missing: f64 },

    /// Any other failure, with the original message.
    #[error("{message}")]
    Failed { message: String },
}

impl SaleError {
    /// Classifies a store failure: a shortage (structured or in the message
    /// convention) becomes `InsufficientStock`, anything else `Failed`.
    pub fn from_ledger(err: LedgerError) -> Self {
        match err.shortage() {
            Some(StockShortage { product_id, missing }) => {
                SaleError::InsufficientStock { product_id, missing }
            }
            None => SaleError::Failed {
                message: err.to_string(),
            },
        }
    }

    pub fn is_stock_shortage(&self) -> bool {
        matches!(self, SaleError::InsufficientStock { .. })
    }

    /// The operator-facing notice for this error.
    pub fn notice(&self) -> Notice {
        match self {
            SaleError::InsufficientStock { product_id, missing } => Notice::StockWarning {
                product_id: product_id.clone(),
                missing: *missing,
                message: self.to_string(),
            },
            other => Notice::Failure {
                message: other.to_string(),
            },
        }
    }
}

impl From<ValidationError> for SaleError {
    fn from(err: ValidationError) -> Self {
        SaleError::Invalid(err.to_string())
    }
}

/// User-facing classification of an outcome. Raw backend errors are never
/// shown; only these messages are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    Success { message: String },
    /// Shown as a warning, distinct from failures. The cart is kept.
    StockWarning {
        product_id: String,
        missing: f64,
        message: String,
    },
    Failure { message: String },
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice::Success {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Notice::Success { message }
            | Notice::StockWarning { message, .. }
            | Notice::Failure { message } => message,
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, Notice::StockWarning { .. })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Alert audio failure. Always logged and swallowed by the coordinator.
#[derive(Debug, Clone, Error)]
pub enum PlaybackError {
    /// Output locked until the first user gesture.
    #[error("Audio locked until first user gesture")]
    Locked,

    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    #[error("Playback failed: {0}")]
    Failed(String),
}

/// Result type alias for board, config and preference operations.
pub type OrdersResult<T> = Result<T, OrdersError>;

#[derive(Debug, Error)]
pub enum OrdersError {
    /// Business rule violation (illegal transition, not authorized).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Sale(#[from] SaleError),

    /// The order changed under us; the compare-and-swap found another status.
    #[error("Order {sale_id} was changed by another station")]
    Conflict { sale_id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not read config: {0}")]
    ConfigLoadFailed(String),

    #[error("Could not write config: {0}")]
    ConfigSaveFailed(String),

    /// No restaurant selected for this session.
    #[error("No restaurant selected")]
    NoRestaurant,

    #[error(transparent)]
    Playback(#[from] PlaybackError),

    /// The background loop behind a handle has already exited.
    #[error("The {0} has already stopped")]
    Stopped(&'static str),
}

impl From<DbError> for OrdersError {
    fn from(err: DbError) -> Self {
        OrdersError::Ledger(err.into())
    }
}

impl From<std::io::Error> for OrdersError {
    fn from(err: std::io::Error) -> Self {
        OrdersError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for OrdersError {
    fn from(err: toml::de::Error) -> Self {
        OrdersError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for OrdersError {
    fn from(err: toml::ser::Error) -> Self {
        OrdersError::ConfigSaveFailed(err.to_string())
    }
}

impl OrdersError {
    /// True when a refetch is the right reaction (someone else moved the
    /// order, or it disappeared).
    pub fn needs_refresh(&self) -> bool {
        matches!(
            self,
            OrdersError::Conflict { .. }
                | OrdersError::Core(CoreError::IllegalTransition { .. })
                | OrdersError::Ledger(LedgerError::NotFound { .. })
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            OrdersError::InvalidConfig(_)
                | OrdersError::ConfigLoadFailed(_)
                | OrdersError::ConfigSaveFailed(_)
                | OrdersError::NoRestaurant
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_shortage_classifies() {
        let err = SaleError::from_ledger(LedgerError::InsufficientStock(StockShortage::new("p1", 0.2)));
        match &err {
            SaleError::InsufficientStock { product_id, missing } => {
                assert_eq!(product_id, "p1");
                assert_eq!(*missing, 0.2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.notice().is_warning());
    }

    #[test]
    fn test_message_shortage_goes_through_shim() {
        let err = SaleError::from_ledger(LedgerError::Backend(
            "P0001: INSUFFICIENT_STOCK: product 3fa85f64-5717-4562-b3fc-2c963f66afa6 (missing 1.25)"
                .to_string(),
        ));
        assert!(matches!(
            err,
            SaleError::InsufficientStock { ref product_id, missing }
                if product_id == "3fa85f64-5717-4562-b3fc-2c963f66afa6" && missing == 1.25
        ));

        let garbled = SaleError::from_ledger(LedgerError::Backend("INSUFFICIENT_STOCK".to_string()));
        assert!(matches!(
            garbled,
            SaleError::InsufficientStock { ref product_id, missing }
                if product_id == "unknown" && missing == 0.0
        ));
    }

    #[test]
    fn test_other_failures_keep_message() {
        let err = SaleError::from_ledger(LedgerError::Backend("connection reset by peer".into()));
        assert!(matches!(err, SaleError::Failed { ref message } if message == "connection reset by peer"));

        let notice = err.notice();
        assert!(!notice.is_warning());
        assert_eq!(notice.message(), "connection reset by peer");
    }

    #[test]
    fn test_db_error_mapping() {
        let err: LedgerError = DbError::shortage("p9", 3.0).into();
        assert!(matches!(err, LedgerError::InsufficientStock(_)));

        let err: LedgerError = DbError::PoolExhausted.into();
        assert!(matches!(err, LedgerError::Unavailable(_)));

        let err: LedgerError = DbError::CheckViolation("quantity".into()).into();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[test]
    fn test_conflict_needs_refresh() {
        assert!(OrdersError::Conflict { sale_id: "s".into() }.needs_refresh());
        assert!(!OrdersError::Stopped("board poller").needs_refresh());
        assert!(OrdersError::NoRestaurant.is_config_error());
    }
}
