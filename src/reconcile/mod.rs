pub mod join;
pub mod metrics;
pub mod series;

pub use join::{ReconciledRow, column_series, join};
pub use metrics::{MetricColumns, MetricRow, derive_metrics, fmt_fixed};
pub use series::{
    ChangePoint, DailyEntry, Field, PeriodStats, RangeKey, available_ranges, compute_change, difference,
    filter_by_range, normalize_range, percent_change_from_base, period_stats,
};
