use std::path::PathBuf;
use std::str::FromStr;
use chrono::{DateTime, NaiveDate, Utc};
use eyre::Result;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::*;
use crate::chain::build_endpoints;
use crate::nav::{FeedEndpoint, PoolPriceEndpoint, RollingHistory, SanityPolicy, SeriesCollector, ValueEndpoint};
use crate::store::{CsvTable, KeySpace, missing_keys_until, read_table, row, upsert_rows};

/// Outcome of one export run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportSummary {
    pub added: usize,
    pub skipped: Vec<String>,
}

/// Where an on-chain series lives and how it is collected.
#[derive(Debug, Clone)]
pub struct OnchainSeries {
    pub path: PathBuf,
    pub value_column: &'static str,
    pub start_date: NaiveDate,
    pub collector: SeriesCollector,
}

impl OnchainSeries {
    pub fn nav(config: &Config, space: KeySpace) -> Self {
        let file = match space {
            KeySpace::Day => DAILY_NAV_CSV,
            KeySpace::Hour => HOURLY_NAV_CSV,
        };
        Self {
            path: config.data_file(file),
            value_column: NAV_COLUMN,
            start_date: config.token_price_start_date,
            collector: SeriesCollector {
                label: "NAV",
                space,
                precision: NAV_PRECISION,
                policy: Some(SanityPolicy::for_key_space(space)),
            },
        }
    }

    /// Daily WBTC/USD from the Chainlink feed; only positivity is checked.
    pub fn wbtc_daily(config: &Config) -> Self {
        Self {
            path: config.data_file(DAILY_WBTC_CSV),
            value_column: WBTC_COLUMN,
            start_date: config.price_series_start_date,
            collector: SeriesCollector {
                label: "WBTC",
                space: KeySpace::Day,
                precision: REFERENCE_PRECISION as u32,
                policy: None,
            },
        }
    }

    fn key_column(&self) -> &'static str {
        self.collector.space.key_column()
    }
}

/// Stored values that parse as decimals, the starting point for the sanity check.
pub fn history_from_table(table: &CsvTable, key_column: &str, value_column: &str) -> RollingHistory {
    RollingHistory::from_entries(table.rows.iter().filter_map(|row| {
        let key = row.get(key_column).filter(|key| !key.is_empty())?;
        let value = Decimal::from_str(row.get(value_column)?).ok()?;
        Some((key.clone(), value))
    }))
}

/// Collects every missing key up to the last complete period and upserts the
/// accepted values. Keys that fail stay missing for the next run.
pub async fn export_onchain_series<E>(series: &OnchainSeries, endpoints: &[E], now: DateTime<Utc>) -> Result<ExportSummary>
where
    E: ValueEndpoint,
{
    let key_column = series.key_column();
    let label = series.collector.label;
    let table = read_table(&series.path)?;

    let missing = missing_keys_until(series.collector.space, table.keys(key_column), series.start_date, now);
    if missing.is_empty() {
        info!(series = label, "No new {} data needed", series.collector.space.label());
        return Ok(ExportSummary::default());
    }
    info!(
        series = label,
        count = missing.len(),
        first = %missing[0],
        last = %missing[missing.len() - 1],
        "Collecting missing keys"
    );

    let history = history_from_table(&table, key_column, series.value_column);
    let report = series.collector.collect(endpoints, &missing, history).await?;

    if report.values.is_empty() {
        warn!(series = label, skipped = report.skipped.len(), "No valid rows fetched");
        return Ok(ExportSummary { added: 0, skipped: report.skipped });
    }

    let precision = series.collector.precision as usize;
    let rows = report
        .values
        .iter()
        .map(|value| {
            row([
                (key_column, value.key.clone()),
                (series.value_column, format!("{:.precision$}", value.value)),
            ])
        })
        .collect::<Vec<_>>();
    let added = rows.len();
    upsert_rows(&series.path, &[key_column, series.value_column], key_column, rows)?;

    info!(series = label, added, skipped = report.skipped.len(), "Appended rows");
    Ok(ExportSummary { added, skipped: report.skipped })
}

/// Fund NAV per day or hour from the pool contract.
pub async fn export_nav(config: &Config, space: KeySpace) -> Result<ExportSummary> {
    let endpoints: Vec<PoolPriceEndpoint> = build_endpoints(&config.rpc_urls, &config.http)?
        .into_iter()
        .map(|rpc| PoolPriceEndpoint::new(rpc, config.pool_logic_address))
        .collect();
    export_onchain_series(&OnchainSeries::nav(config, space), &endpoints, Utc::now()).await
}

/// Daily WBTC/USD read from the Chainlink aggregator at each day's closing block.
pub async fn fetch_wbtc_daily(config: &Config) -> Result<ExportSummary> {
    let endpoints: Vec<FeedEndpoint> = build_endpoints(&config.rpc_urls, &config.http)?
        .into_iter()
        .map(|rpc| FeedEndpoint::new(rpc, config.chainlink_btc_usd_feed))
        .collect();
    export_onchain_series(&OnchainSeries::wbtc_daily(config), &endpoints, Utc::now()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_skips_unparseable_values() {
        let table = CsvTable {
            header: vec!["day".into(), NAV_COLUMN.into()],
            rows: vec![
                row([("day", "2025-01-01"), (NAV_COLUMN, "1.00000000")]),
                row([("day", "2025-01-02"), (NAV_COLUMN, "")]),
                row([("day", "2025-01-03"), (NAV_COLUMN, "1.10000000")]),
            ],
        };
        let history = history_from_table(&table, "day", NAV_COLUMN);
        assert_eq!(history.len(), 2);
    }
}
