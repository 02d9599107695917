use std::path::Path;
use eyre::Result;
use tracing::{info, warn};

use crate::constants::*;
use crate::reconcile::{MetricColumns, column_series, derive_metrics, join};
use crate::store::{KeySpace, Row, read_table, write_table};

/// Inputs and output of one reconciled NAV-vs-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileTarget {
    pub space: KeySpace,
    pub nav_file: &'static str,
    pub reference_file: &'static str,
    pub reference_column: &'static str,
    pub output_file: &'static str,
    pub asset: &'static str,
}

impl ReconcileTarget {
    pub const NAV_BTC_DAILY: ReconcileTarget = ReconcileTarget {
        space: KeySpace::Day,
        nav_file: DAILY_NAV_CSV,
        reference_file: DAILY_BTC_CSV,
        reference_column: BTC_COLUMN,
        output_file: DAILY_NAV_BTC_CSV,
        asset: "btc",
    };

    pub const NAV_BTC_HOURLY: ReconcileTarget = ReconcileTarget {
        space: KeySpace::Hour,
        nav_file: HOURLY_NAV_CSV,
        reference_file: HOURLY_BTC_CSV,
        reference_column: BTC_COLUMN,
        output_file: HOURLY_NAV_BTC_CSV,
        asset: "btc",
    };

    pub const NAV_WBTC_DAILY: ReconcileTarget = ReconcileTarget {
        space: KeySpace::Day,
        nav_file: DAILY_NAV_CSV,
        reference_file: DAILY_WBTC_CSV,
        reference_column: WBTC_COLUMN,
        output_file: DAILY_NAV_WBTC_CSV,
        asset: "wbtc",
    };

    pub fn columns(&self) -> MetricColumns {
        MetricColumns {
            key_column: self.space.key_column(),
            asset: self.asset,
        }
    }
}

/// Rebuilds the reconciled table from the stored NAV and reference series.
///
/// The output is derived entirely from its inputs, so it is rewritten as a
/// whole. Returns the number of rows written; nothing is written when the
/// series do not overlap.
pub fn build_reconciled(data_dir: &Path, target: &ReconcileTarget) -> Result<usize> {
    let key_column = target.space.key_column();
    let nav_table = read_table(&data_dir.join(target.nav_file))?;
    let reference_table = read_table(&data_dir.join(target.reference_file))?;

    let nav = column_series(&nav_table, key_column, NAV_COLUMN);
    let reference = column_series(&reference_table, key_column, target.reference_column);
    let joined = join(&nav, &reference);
    let metrics = derive_metrics(&joined);

    if metrics.is_empty() {
        warn!(output = target.output_file, "No overlapping NAV/{} data found", target.asset);
        return Ok(0);
    }

    let columns = target.columns();
    let rows: Vec<Row> = metrics.iter().map(|metric| columns.to_row(metric)).collect();
    write_table(&data_dir.join(target.output_file), &columns.header(), &rows)?;

    info!(
        output = target.output_file,
        rows = rows.len(),
        unmatched = joined.len() - rows.len(),
        "Built NAV vs {} rows", target.asset
    );
    Ok(rows.len())
}
