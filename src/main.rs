//! Entry point for the walker payout binary.
//!
//! Running this binary starts an HTTP server that turns a Google Sheet
//! into a JSON payout endpoint for the walker portal.  Settings come
//! from `WALKER_*` environment variables or a `.env` file; see
//! [`walker_payout::config::Config`].

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;
use walker_payout::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        sheets = %config.sheets_base_url,
        sheets_timeout_secs = config.sheets_timeout.as_secs(),
        strict_numbers = config.strict_numbers,
        reject_duplicates = config.reject_duplicates,
        "walker payout server starting"
    );
    walker_payout::api::serve(&config).await
}
