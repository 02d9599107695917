use super::join::ReconciledRow;
use crate::store::{Row, row};

/// NAV expressed against a reference asset, relative to the first complete row.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub key: String,
    pub nav_usd: f64,
    pub reference_usd: f64,
    pub nav_in_reference: f64,
    pub roi_in_reference: f64,
    pub roi_in_usd: f64,
    pub alpha: f64,
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 { 0.0 } else { numerator / denominator }
}

/// Returns relative to `base`; a zero base yields zero.
fn growth(value: f64, base: f64) -> f64 {
    if base == 0.0 { 0.0 } else { value / base - 1.0 }
}

/// Derived metrics over the complete rows of a join, in key order.
///
/// Base values come from the first complete row, so that row always has
/// zero returns. Any division by a zero base falls back to zero.
pub fn derive_metrics(rows: &[ReconciledRow]) -> Vec<MetricRow> {
    let complete: Vec<&ReconciledRow> = rows.iter().filter(|row| row.is_complete()).collect();
    let Some(first) = complete.first() else {
        return Vec::new();
    };

    let nav0 = first.nav;
    let reference0 = first.reference;
    let nav_in_reference0 = ratio(first.nav, first.reference);

    complete
        .iter()
        .map(|row| {
            let nav_in_reference = ratio(row.nav, row.reference);
            let roi_in_usd = growth(row.nav, nav0);
            let reference_growth = ratio(row.reference, reference0);
            let alpha = if reference0 == 0.0 || reference_growth == 0.0 {
                0.0
            } else {
                (roi_in_usd + 1.0) / reference_growth - 1.0
            };
            MetricRow {
                key: row.key.clone(),
                nav_usd: row.nav,
                reference_usd: row.reference,
                nav_in_reference,
                roi_in_reference: growth(nav_in_reference, nav_in_reference0),
                roi_in_usd,
                alpha,
            }
        })
        .collect()
}

/// Fixed decimals without a negative sign on values that round to zero.
pub fn fmt_fixed(value: f64, decimals: usize) -> String {
    let formatted = format!("{value:.decimals$}");
    match formatted.strip_prefix('-') {
        Some(unsigned) if unsigned.chars().all(|c| c == '0' || c == '.') => unsigned.to_string(),
        _ => formatted,
    }
}

/// Column layout of a reconciled table against one reference asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricColumns {
    pub key_column: &'static str,
    /// Reference asset suffix, e.g. `btc` or `wbtc`.
    pub asset: &'static str,
}

impl MetricColumns {
    pub fn header(&self) -> Vec<String> {
        let asset = self.asset;
        vec![
            self.key_column.to_string(),
            "nav_usd".to_string(),
            format!("{asset}_usd"),
            format!("nav_{asset}"),
            format!("roi_in_{asset}"),
            "roi_in_usd".to_string(),
            format!("alpha_vs_{asset}"),
        ]
    }

    /// NAV and NAV-in-reference with 8 decimals, reference price with 2,
    /// returns with 6.
    pub fn to_row(&self, metric: &MetricRow) -> Row {
        let asset = self.asset;
        row([
            (self.key_column.to_string(), metric.key.clone()),
            ("nav_usd".to_string(), fmt_fixed(metric.nav_usd, 8)),
            (format!("{asset}_usd"), fmt_fixed(metric.reference_usd, 2)),
            (format!("nav_{asset}"), fmt_fixed(metric.nav_in_reference, 8)),
            (format!("roi_in_{asset}"), fmt_fixed(metric.roi_in_reference, 6)),
            ("roi_in_usd".to_string(), fmt_fixed(metric.roi_in_usd, 6)),
            (format!("alpha_vs_{asset}"), fmt_fixed(metric.alpha, 6)),
        ])
    }
}
