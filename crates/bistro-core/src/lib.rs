//! # bistro-core: Pure Business Logic for Bistro Ops
//!
//! Everything the restaurant floor agrees on, expressed as pure functions
//! and plain data. No database and no audio device.
//!
//! ```text
//! apps/station ──► bistro-orders ──► bistro-core ◄── bistro-db
//!  (boards, alerts)  (workflows,       (this crate)    (SQLite ledger)
//!                    polling, cache)
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Dish, Sale, StockRow, ...)
//! - [`money`] - Integer minor-unit money
//! - [`status`] - Kitchen and delivery state machines, actor authority
//! - [`ledger`] - Stock shortage value and the message convention
//! - [`costing`] - Dish cost and margin
//! - [`alert`] - Alert cadence, tone synthesis, audio unlock gate
//! - [`validation`] - Field checks
//! - [`error`] - Rule and field errors

pub mod alert;
pub mod costing;
pub mod error;
pub mod ledger;
pub mod money;
pub mod status;
pub mod types;
pub mod validation;

pub use alert::{AlertContext, AlertTracker, AudioGate, CueReason, Gesture, ToneProfile};
pub use costing::DishCost;
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::StockShortage;
pub use money::Money;
pub use status::{Actor, DeliveryStatus, KitchenStatus};
pub use types::*;

/// Lines per cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Portions of one dish per line; catches 200 typed for 2.
pub const MAX_ITEM_QUANTITY: i64 = 999;
