//! # bistro-orders: Order Workflows for Bistro Ops
//!
//! Everything that reads or mutates shared order state on behalf of a
//! station: sale submission, the kitchen/dispatch/driver boards, their
//! polling and alerting, and the optimistic cache they all share.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bistro-orders                                    │
//! │                                                                         │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐                │
//! │  │ SaleWorkflow │   │ Kitchen /    │   │ Catalog /    │                │
//! │  │ cart → sale  │   │ Dispatch /   │   │ Dashboard    │                │
//! │  │ compensation │   │ Driver board │   │              │                │
//! │  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘                │
//! │         │                  │  ▲               │                         │
//! │         │                  │  │ BoardPoller   │                         │
//! │         │                  │  └─ AlertCoordinator (cue, mute, repeat)  │
//! │         ▼                  ▼                  ▼                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │ QueryCache + OptimisticMutation (snapshot → patch → rollback)    │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │         │                  │                  │                         │
//! │         ▼                  ▼                  ▼                         │
//! │   StockLedger         OrderSource        CatalogStore   (ledger.rs)     │
//! │         └──────────────────┴──────────────────┘                         │
//! │                            │                                            │
//! │                    bistro_db::Database                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`alerts`] - Alert coordinator, player seam and repeat timer
//! - [`boards`] - Kitchen, dispatch and driver boards, board poller
//! - [`cache`] - Query cache and optimistic mutations
//! - [`cart`] - Cart being built at the counter
//! - [`catalog`] - Product and dish edits
//! - [`config`] - Station configuration (TOML + env)
//! - [`dashboard`] - Daily summary, dish and ingredient reports, low stock
//! - [`error`] - Error types and operator notices
//! - [`ledger`] - Store traits and their SQLite implementation
//! - [`prefs`] - Preference file and session
//! - [`workflow`] - Sale submission
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bistro_orders::{KitchenBoard, BoardPoller, QueryCache, SessionContext, StationConfig};
//!
//! let config = StationConfig::load_or_default(None);
//! let board = Arc::new(KitchenBoard::new(Arc::new(db), QueryCache::new(), session));
//! let poller = BoardPoller::spawn(board.clone(), config.refresh_interval());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod alerts;
pub mod boards;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod ledger;
pub mod prefs;
pub mod workflow;

#[cfg(test)]
mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use alerts::{AlertCoordinator, AlertHandle, AlertPlayer, AlertRepeater};
pub use boards::{
    Board, BoardPoller, DispatchBoard, DispatchColumns, DriverBoard, KitchenBoard, KitchenColumns,
    PollerHandle,
};
pub use cache::{keys, Identified, OptimisticMutation, Patch, QueryCache};
pub use cart::{Cart, CartLine, CartState};
pub use catalog::CatalogService;
pub use config::StationConfig;
pub use dashboard::{Dashboard, DashboardView, TOP_DISHES_SHOWN};
pub use error::{
    LedgerError, LedgerResult, Notice, OrdersError, OrdersResult, PlaybackError, SaleError,
};
pub use ledger::{CatalogStore, DriverDirectory, OrderSource, StockLedger};
pub use prefs::{PreferenceStore, SessionContext, SessionState};
pub use workflow::{SaleDraft, SaleWorkflow, SubmissionPhase, SubmitOutcome};
