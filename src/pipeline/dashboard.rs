use std::collections::HashMap;
use chrono::NaiveDate;
use eyre::Result;
use tracing::info;

use crate::config::Config;
use crate::constants::*;
use crate::reconcile::{
    DailyEntry, Field, PeriodStats, RangeKey, available_ranges, column_series, difference, filter_by_range,
    percent_change_from_base, period_stats,
};
use crate::store::{CsvTable, read_table};

/// Daily entries for every NAV day of the reconciled table, with the
/// reference price from its own table (NaN where it has no value).
pub fn dashboard_entries(reconciled: &CsvTable, reference: &CsvTable, reference_column: &str) -> Vec<DailyEntry> {
    let reference: HashMap<String, f64> = column_series(reference, "day", reference_column).into_iter().collect();
    let mut entries: Vec<DailyEntry> = column_series(reconciled, "day", "nav_usd")
        .into_iter()
        .filter_map(|(day, nav_usd)| {
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()?;
            Some(DailyEntry {
                date,
                nav_usd,
                reference_usd: reference.get(&day).copied().unwrap_or(f64::NAN),
            })
        })
        .collect();
    entries.sort_by_key(|entry| entry.date);
    entries
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeSummary {
    pub range: RangeKey,
    pub stats: PeriodStats,
    /// Last point of the NAV-minus-reference change series.
    pub latest_spread: Option<f64>,
}

pub fn summarize(entries: &[DailyEntry]) -> Vec<RangeSummary> {
    available_ranges(entries)
        .into_iter()
        .map(|range| {
            let window = filter_by_range(range, entries);
            let nav_changes = percent_change_from_base(window, Field::NavUsd);
            let reference_changes = percent_change_from_base(window, Field::ReferenceUsd);
            let latest_spread = difference(&nav_changes, &reference_changes).last().map(|point| point.change);
            RangeSummary {
                range,
                stats: period_stats(window),
                latest_spread,
            }
        })
        .collect()
}

/// Logs NAV vs WBTC stats for every available range.
pub fn dashboard_summary(config: &Config) -> Result<Vec<RangeSummary>> {
    let reconciled = read_table(&config.data_file(DAILY_NAV_BTC_CSV))?;
    let reference = read_table(&config.data_file(DAILY_WBTC_CSV))?;
    let entries = dashboard_entries(&reconciled, &reference, WBTC_COLUMN);

    let summaries = summarize(&entries);
    for summary in &summaries {
        info!(
            range = %summary.range,
            nav_usd = ?summary.stats.nav.price,
            nav_change_pct = ?summary.stats.nav.change,
            wbtc_usd = ?summary.stats.reference.price,
            wbtc_change_pct = ?summary.stats.reference.change,
            spread_pct = ?summary.stats.spread,
            "Period stats"
        );
    }
    Ok(summaries)
}
