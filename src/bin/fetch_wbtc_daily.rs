use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::fetch_wbtc_daily;

use dotenvy::dotenv;
use tracing::{error, info, instrument, warn};

#[instrument(name = "fetch_wbtc_daily_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    info!(feed = ?cfg.chainlink_btc_usd_feed, "Configuration loaded");

    let summary = fetch_wbtc_daily(&cfg).await.inspect_err(|e| {
        error!(error = ?e, "WBTC fetch failed");
    })?;
    if !summary.skipped.is_empty() {
        warn!(days = %summary.skipped.join(", "), "Days without a feed answer");
    }
    info!(added = summary.added, "WBTC/USD daily series updated");
    Ok(())
}
