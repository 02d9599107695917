use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::export_nav;
use fund_nav_pipeline::store::KeySpace;

use dotenvy::dotenv;
use tracing::{error, info, instrument};

#[instrument(name = "export_nav_hourly_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    info!(rpc_endpoints = cfg.rpc_urls.len(), data_dir = %cfg.data_dir.display(), "Configuration loaded");

    let summary = export_nav(&cfg, KeySpace::Hour).await.inspect_err(|e| {
        error!(error = ?e, "Hourly NAV export failed");
    })?;
    if !summary.skipped.is_empty() {
        info!(hours = %summary.skipped.join(", "), "Hours left for the next run");
    }
    info!(added = summary.added, "Hourly NAV export finished");
    Ok(())
}
