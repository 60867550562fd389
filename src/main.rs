mod auction;
mod config;
mod ledger;
mod service;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let env_file = config::load_env_file()?;
    let config = config::Config::parse();
    init_logging(&config.log_level);
    if let Some(path) = env_file {
        info!(path = %path.display(), "loaded env file");
    }

    let bid_store = match &config.postgres_url {
        Some(url) => store::postgres::PostgresBidStore::new_shared(url, config.db_pool_size)
            .context("Failed to set up the postgres bid store")?,
        None => store::InMemoryBidStore::new_shared(),
    };
    let ledger = ledger::BidLedger::new_shared(bid_store, config.biddable_items());

    let svc_ctr = service::ServiceControl::new();

    ctrlc::set_handler({
        let svc_ctr = svc_ctr.clone();
        move || {
            info!("Stopping all services...");
            svc_ctr.stop_all();
        }
    })?;

    let http_api = service::HttpApi::new(&config.address, ledger)?;

    svc_ctr.spawn_loop(http_api).join()
}
