//! # Domain Errors
//!
//! Rule violations that can be decided without touching a store.
//!
//! ```text
//! ValidationError ──► CoreError ──► OrdersError ──► Notice ──► operator
//!   (one field)        (one rule)     (bistro-orders)
//! ```
//!
//! Storage failures live in `bistro-db` (`DbError`); the workflow errors
//! that wrap both live in `bistro-orders`.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// A status change that is not exactly one step forward.
    ///
    /// Usually a second tablet acting on a stale board: the order is already
    /// `ready` but the tablet still shows it `pending` and taps "Start
    /// preparing". The board refetches and shows the real column.
    #[error("Illegal {track} transition from {from} to {to}")]
    IllegalTransition {
        track: &'static str,
        from: String,
        to: String,
    },

    /// A driver advancing someone else's delivery, or the kitchen touching
    /// the delivery track.
    #[error("{actor} is not allowed to {action}")]
    NotAuthorized { actor: String, action: String },

    #[error("Cannot assign driver to sale {sale_id}: {reason}")]
    DriverAssignment { sale_id: String, reason: String },

    #[error("A cart holds at most {max} lines")]
    CartTooLarge { max: usize },

    #[error("Line quantity {requested} is over the limit of {max}")]
    QuantityTooLarge { requested: i64, max: i64 },

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),
}

/// A single field failed its check. Raised before any store is contacted.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    #[error("{field} is malformed: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        ValidationError::Required {
            field: field.to_string(),
        }
    }

    pub fn must_be_positive(field: &str) -> Self {
        ValidationError::MustBePositive {
            field: field.to_string(),
        }
    }

    pub fn out_of_range(field: &str, min: i64, max: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        }
    }

    pub fn invalid_format(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
