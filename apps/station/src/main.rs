//! # Bistro Station Entry Point
//!
//! Headless station: keeps the kitchen and dispatch boards fresh and plays
//! their alerts until Ctrl-C.
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load station config (TOML + `BISTRO_*` env)
//! 3. Resolve the session (config restaurant id wins over the session file)
//! 4. Connect to database & run migrations
//! 5. Start board pollers and alert repeaters
//! 6. Wait for Ctrl-C, then stop every task and close the pool

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The actual setup is in lib.rs for better testability
    bistro_station::run().await
}
