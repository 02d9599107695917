use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::export_nav;
use fund_nav_pipeline::store::KeySpace;

use dotenvy::dotenv;
use tracing::{error, info, instrument};

#[instrument(name = "export_nav_daily_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    info!(rpc_endpoints = cfg.rpc_urls.len(), data_dir = %cfg.data_dir.display(), "Configuration loaded");

    match export_nav(&cfg, KeySpace::Day).await {
        Ok(summary) => {
            info!(added = summary.added, skipped = summary.skipped.len(), "Daily NAV export finished");
            Ok(())
        }
        Err(e) => {
            error!(error = ?e, "Daily NAV export failed");
            Err(e)
        }
    }
}
