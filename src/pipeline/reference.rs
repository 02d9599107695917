use std::path::Path;
use chrono::{DateTime, Utc};
use eyre::Result;
use tracing::{debug, info};

use crate::config::Config;
use crate::constants::*;
use crate::http::ResilientClient;
use crate::prices::{PricePoint, default_sources, fetch_reference_series};
use crate::reconcile::fmt_fixed;
use crate::store::{KeySpace, StoreError, row, upsert_rows};

/// Points of periods that have fully elapsed at `now`. Sources also report
/// the running day or hour, which is left for a later run.
pub fn complete_points(points: &[PricePoint], space: KeySpace, now: DateTime<Utc>) -> Vec<PricePoint> {
    let last_complete = space.key(space.last_complete(now));
    let (complete, open): (Vec<_>, Vec<_>) = points
        .iter()
        .cloned()
        .partition(|point| point.key <= last_complete);
    if !open.is_empty() {
        debug!(last_complete = %last_complete, dropped = open.len(), "Dropping open period prices");
    }
    complete
}

/// Upserts reference prices of completed periods with two decimals; returns
/// how many points were written.
pub fn store_reference_points(
    path: &Path,
    space: KeySpace,
    value_column: &str,
    points: &[PricePoint],
    now: DateTime<Utc>,
) -> Result<usize, StoreError> {
    let key_column = space.key_column();
    let rows = complete_points(points, space, now)
        .into_iter()
        .map(|point| {
            row([
                (key_column, point.key),
                (value_column, fmt_fixed(point.price, REFERENCE_PRECISION)),
            ])
        })
        .collect::<Vec<_>>();
    let count = rows.len();
    upsert_rows(path, &[key_column, value_column], key_column, rows)?;
    Ok(count)
}

/// BTC/USD per day or hour from the first reference source that answers.
pub async fn fetch_btc(config: &Config, space: KeySpace) -> Result<usize> {
    let client = ResilientClient::new(&config.http, &config.cache_dir)?;
    let sources = default_sources(&config.reference_ids);
    let start = config.price_series_start_date.format("%Y-%m-%d").to_string();

    let outcome = fetch_reference_series(&client, &sources, space, Some(&start)).await?;

    let file = match space {
        KeySpace::Day => DAILY_BTC_CSV,
        KeySpace::Hour => HOURLY_BTC_CSV,
    };
    let written = store_reference_points(&config.data_file(file), space, BTC_COLUMN, &outcome.value, Utc::now())?;
    info!(
        source = %outcome.source,
        failed_sources = outcome.failures.len(),
        rows = written,
        "Wrote {} BTC price rows", space.label()
    );
    Ok(written)
}
