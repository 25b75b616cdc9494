use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

mod api;
mod config;
mod db;
mod league;

use api::AppState;
use config::Config;
use db::models::LeagueSnapshot;
use db::Database;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    // Seed from a snapshot file on first run
    if let Some(path) = &config.seed_file {
        if db.count_teams()? == 0 {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading seed file {}", path.display()))?;
            let snapshot: LeagueSnapshot = serde_json::from_str(&raw)
                .with_context(|| format!("parsing seed file {}", path.display()))?;
            db.import_snapshot(&snapshot)?;
            info!("Seeded database from {}", path.display());
        } else {
            info!("Database already populated; skipping seed file");
        }
    }

    match db.active_season_id()? {
        Some(id) => info!("Active season: {}", id),
        None => info!("No active season flagged; \"current\" requests will be rejected"),
    }

    let app = api::router(AppState {
        db,
        leaderboard_limit: config.leaderboard_limit,
    });
    let addr: SocketAddr = config.api_addr.parse()?;
    info!("League API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
