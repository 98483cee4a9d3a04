//! # Demo Seeder
//!
//! Creates the demo restaurant (noodles, shrimp, rice paper, Pad Thai,
//! Spring Rolls, two drivers) in a database file.
//!
//! ## Usage
//! ```bash
//! cargo run -p bistro-db --bin seed
//! cargo run -p bistro-db --bin seed -- --db ./data/bistro.db
//! BISTRO_DB_PATH=./data/bistro.db cargo run -p bistro-db --bin seed
//! ```
//!
//! Prints the restaurant id to put in the station config.

use std::env;

use bistro_db::{demo, Database, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let mut db_path = env::var("BISTRO_DB_PATH").unwrap_or_else(|_| String::from("./bistro_dev.db"));

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bistro Ops demo seeder");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./bistro_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let db = Database::new(DbConfig::new(&db_path)).await?;
    info!(path = %db_path, "Connected, migrations applied");

    let ids = demo::seed(&db).await?;

    info!(
        restaurant_id = %ids.restaurant_id,
        pad_thai_id = %ids.pad_thai_id,
        drivers = ?ids.driver_ids,
        "Seed complete"
    );
    println!("restaurant_id = \"{}\"", ids.restaurant_id);

    db.close().await;
    Ok(())
}
