//! waxline-import - Catalog Import Service
//!
//! Imports legacy distribution spreadsheets into the catalog database,
//! with repair tools for data contaminated by earlier imports.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use waxline_common::events::EventBus;

use waxline_import::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting waxline-import (Catalog Import) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let data_dir = waxline_common::config::resolve_data_dir(
        std::env::args().nth(1).as_deref(),
        "WAXLINE_DATA",
    );
    waxline_common::config::ensure_data_dir(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to initialize data directory: {}", e))?;

    let db_path = waxline_common::config::database_path(&data_dir);
    info!("Database: {}", db_path.display());

    let db_pool = waxline_common::db::init_database(&db_path).await?;
    info!("Database connection established");

    // Sessions left in_progress by a previous run will never advance
    let cleaned = waxline_import::db::sessions::cleanup_stale_sessions(&db_pool).await?;
    if cleaned > 0 {
        info!("Cancelled {} stale import session(s) from previous run", cleaned);
    }

    let event_bus = EventBus::new(100);
    info!("Event bus initialized");

    let state = AppState::new(db_pool, event_bus);
    let app = waxline_import::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:5810").await?;
    info!("Listening on http://127.0.0.1:5810");
    info!("Health check: http://127.0.0.1:5810/health");

    axum::serve(listener, app).await?;

    Ok(())
}
