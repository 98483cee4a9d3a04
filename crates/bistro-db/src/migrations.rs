//! # Schema Migrations
//!
//! The SQL under `migrations/sqlite/` is compiled into the binary. Applied
//! versions are tracked in `_sqlx_migrations`, so running them again is a
//! no-op.
//!
//! | File                     | Adds                                           |
//! |--------------------------|------------------------------------------------|
//! | `001_initial_schema.sql` | restaurants, catalog, sales, stock movements,  |
//! |                          | `v_current_stock` view, status CHECKs          |
//!
//! Migrations are append-only: a shipped file is never edited, a change gets
//! the next `NNN_` number.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, before) = migration_status(pool).await?;
    debug!(total, applied = before, "Migration check");

    MIGRATOR.run(pool).await?;

    if total > before {
        info!(applied = total - before, "Schema migrated");
    }
    Ok(())
}

/// `(embedded, applied)`. A fresh database reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let tracked: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_optional(pool)
    .await?;

    let applied: i64 = match tracked {
        Some(_) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?
        }
        None => 0,
    };

    Ok((MIGRATOR.migrations.len(), applied as usize))
}
