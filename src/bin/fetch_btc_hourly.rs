use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::fetch_btc;
use fund_nav_pipeline::store::KeySpace;

use dotenvy::dotenv;
use tracing::{error, info, instrument};

#[instrument(name = "fetch_btc_hourly_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;

    match fetch_btc(&cfg, KeySpace::Hour).await {
        Ok(rows) => {
            info!(rows, "BTC/USD hourly series updated");
            Ok(())
        }
        Err(e) => {
            error!(error = ?e, "Every BTC price source failed");
            Err(e)
        }
    }
}
