use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::dashboard::dashboard_summary;

use dotenvy::dotenv;
use tracing::{info, instrument, warn};

#[instrument(name = "dashboard_summary_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    let summaries = dashboard_summary(&cfg)?;
    if summaries.iter().all(|s| s.stats.nav.price.is_none()) {
        warn!("No NAV data to summarize");
    } else {
        info!(ranges = summaries.len(), "Dashboard summary logged");
    }
    Ok(())
}
