use fund_nav_pipeline::config::Config;
use fund_nav_pipeline::logging;
use fund_nav_pipeline::pipeline::publish_check::check_published;

use dotenvy::dotenv;
use tracing::{error, info, instrument};

#[instrument(name = "check_published_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    let cfg = Config::from_env()?;
    info!(url = %cfg.published_nav_wbtc_url, "Comparing against published copy");

    let diff = check_published(&cfg).await.inspect_err(|e| {
        error!(error = ?e, "Publication check failed");
    })?;
    info!(
        missing = diff.missing_remote.len(),
        mismatched = diff.mismatched.len(),
        additional = diff.additional_remote.len(),
        "Publication check finished"
    );
    Ok(())
}
