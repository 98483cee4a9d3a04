//! # Bistro Station
//!
//! Thin orchestration layer over `bistro-orders`.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        bistro-station                                   │
//! │                                                                         │
//! │  lib.rs ──────► tracing, config, session, database, Ctrl-C              │
//! │                                                                         │
//! │  station.rs ──► KitchenBoard + DispatchBoard                            │
//! │                 BoardPoller per board (refresh interval)                │
//! │                 AlertRepeater per context (repeat interval)             │
//! │                                                                         │
//! │  player.rs ───► LogPlayer: alert cues as log lines                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod player;
pub mod station;

use std::sync::Arc;

use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use bistro_db::{Database, DbConfig};
use bistro_orders::{PreferenceStore, StationConfig};

pub use player::LogPlayer;
pub use station::{resolve_session, Station};

/// Runs the station until Ctrl-C.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    info!("Starting Bistro station");

    let config = StationConfig::load(None)?;

    let session_path = config.storage.session_path();
    let session = resolve_session(&config, &session_path)?;
    info!(restaurant_id = %session.restaurant_id, language = %session.language, "Session resolved");

    let db_path = config.storage.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(?db_path, "Database connected and migrations applied");

    let prefs = PreferenceStore::load(config.storage.preferences_path())?;

    let station = Station::start(&config, db, session, prefs, Arc::new(LogPlayer));

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");
    station.shutdown().await;

    Ok(())
}

/// Initializes the tracing subscriber.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=bistro_orders=trace` - Trace the order workflows only
/// - Default: `info,bistro=debug,sqlx=warn`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bistro=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::TRACE)
        .init();
}
