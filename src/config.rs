use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// League tracker: standings, leaderboards and weekly schedule API
#[derive(Parser, Debug, Clone)]
#[command(name = "league-tracker", version, about)]
pub struct Config {
    /// API listen address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8080")]
    pub api_addr: String,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "league.db")]
    pub database_path: String,

    /// JSON league snapshot imported on startup when the database has no teams
    #[arg(long, env = "SEED_FILE")]
    pub seed_file: Option<PathBuf>,

    /// Maximum rows returned by the leaderboard endpoint
    #[arg(long, env = "LEADERBOARD_LIMIT", default_value = "50")]
    pub leaderboard_limit: usize,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_addr.parse::<SocketAddr>().is_err() {
            anyhow::bail!("api_addr {:?} is not a valid socket address", self.api_addr);
        }
        if self.leaderboard_limit == 0 {
            anyhow::bail!("leaderboard_limit must be at least 1");
        }
        if let Some(path) = &self.seed_file {
            if !path.exists() {
                anyhow::bail!("seed file {} does not exist", path.display());
            }
        }
        Ok(())
    }
}
