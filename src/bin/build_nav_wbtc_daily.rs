use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::{ReconcileTarget, build_reconciled};

use dotenvy::dotenv;
use tracing::{error, info, instrument};

#[instrument(name = "build_nav_wbtc_daily_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    let target = ReconcileTarget::NAV_WBTC_DAILY;

    let rows = build_reconciled(&cfg.data_dir, &target).inspect_err(|e| {
        error!(error = ?e, output = target.output_file, "Reconciliation failed");
    })?;
    info!(rows, output = target.output_file, "Reconciled table written");
    Ok(())
}
