use crate::auction::ItemId;
use crate::ledger::BiddableItems;
use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

/// Env file to load instead of `.env`
pub const CONFIG_PATH_ENV: &str = "BID_TRACKER_CONFIG_PATH";

/// Load settings from an env file into the process environment
///
/// Reads the file named by `BID_TRACKER_CONFIG_PATH`, which must exist, or
/// else `.env` if there is one. Variables already set win over the file.
pub fn load_env_file() -> Result<Option<PathBuf>> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            load_env_file_from(&path)?;
            Ok(Some(path))
        }
        None => Ok(dotenv::dotenv().ok()),
    }
}

fn load_env_file_from(path: &Path) -> Result<()> {
    dotenv::from_path(path).with_context(|| format!("Failed to load env file {}", path.display()))
}

/// Auction bid tracker
#[derive(Parser, Debug, Clone)]
#[command(name = "bid-tracker", version)]
pub struct Config {
    /// Address to bind the HTTP API on
    #[arg(long, env = "BID_TRACKER_ADDRESS", default_value = "0.0.0.0:3000")]
    pub address: String,

    /// Default log filter; `RUST_LOG` takes precedence
    #[arg(long, env = "BID_TRACKER_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Comma-separated item UUIDs open for bidding; any item when empty
    #[arg(long, env = "BID_TRACKER_BIDDABLE_ITEMS", value_delimiter = ',')]
    pub biddable_items: Vec<ItemId>,

    /// Keep bids in Postgres instead of process memory
    #[arg(long, env = "BID_TRACKER_POSTGRES_URL")]
    pub postgres_url: Option<String>,

    #[arg(long, env = "BID_TRACKER_DB_POOL_SIZE", default_value_t = 8)]
    pub db_pool_size: u32,
}

impl Config {
    pub fn biddable_items(&self) -> BiddableItems {
        self.biddable_items.iter().copied().collect()
    }
}
