//! SimpleOS Connect command-line client.
//!
//! Usage: `simpleos-connect [config.toml]`

mod app;
mod config;

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting SimpleOS Connect client"
    );

    let path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => config::config_path()?,
    };
    let config = config::CliConfig::load(&path)?;
    tracing::info!(path = %path.display(), wallet = %config.wallet.wallet_name, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config))?;

    Ok(())
}
