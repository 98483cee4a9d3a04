//! # bistro-db: SQLite Stock Ledger for Bistro Ops
//!
//! This crate is the reference store behind the stock ledger contract. It
//! uses SQLite through sqlx, with the schema and the current-stock view
//! embedded as migrations.
//!
//! ```text
//! SaleWorkflow / KitchenBoard / DispatchBoard      (bistro-orders)
//!         │ StockLedger, OrderSource, CatalogStore
//!         ▼
//! Database ── products() dishes() sales() stock() members()
//!         │
//!         ▼
//! SqlitePool ── migrations/sqlite (embedded) ── v_current_stock
//! ```
//!
//! `pool` opens the file, `migrations` brings the schema up, `repository`
//! holds one query set per table group, `demo` seeds a sample restaurant.
//!
//! ```rust,ignore
//! use bistro_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bistro.db")).await?;
//! let low = db.stock().low_stock(&restaurant_id).await?;
//! ```

pub mod demo;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::{
    DishRepository, MemberRepository, ProductRepository, SaleRepository, StockRepository,
};
