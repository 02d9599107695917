//! Read-path helpers over a daily reconciled series: range windows, percent
//! change from a base value and the spread between two change series.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use chrono::{NaiveDate, TimeDelta};
use eyre::{Result, eyre};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKey {
    OneDay,
    OneMonth,
    ThreeMonths,
    SixMonths,
    All,
}

impl RangeKey {
    pub const ORDER: [RangeKey; 5] = [
        RangeKey::OneDay,
        RangeKey::OneMonth,
        RangeKey::ThreeMonths,
        RangeKey::SixMonths,
        RangeKey::All,
    ];

    /// Window length in days; `None` is the whole series.
    pub fn days(self) -> Option<i64> {
        match self {
            RangeKey::OneDay => Some(1),
            RangeKey::OneMonth => Some(30),
            RangeKey::ThreeMonths => Some(90),
            RangeKey::SixMonths => Some(180),
            RangeKey::All => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RangeKey::OneDay => "1D",
            RangeKey::OneMonth => "1M",
            RangeKey::ThreeMonths => "3M",
            RangeKey::SixMonths => "6M",
            RangeKey::All => "ALL",
        }
    }

    /// First day inside the window ending at `last`, inclusive.
    fn window_start(self, last: NaiveDate) -> Option<NaiveDate> {
        self.days().map(|days| last - TimeDelta::days((days - 1).max(0)))
    }
}

impl fmt::Display for RangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeKey {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        RangeKey::ORDER
            .into_iter()
            .find(|range| range.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| eyre!("Unknown range {s:?}, expected one of 1D, 1M, 3M, 6M, ALL"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    NavUsd,
    ReferenceUsd,
}

/// One day of the dashboard view; missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub nav_usd: f64,
    pub reference_usd: f64,
}

impl DailyEntry {
    pub fn value(&self, field: Field) -> f64 {
        match field {
            Field::NavUsd => self.nav_usd,
            Field::ReferenceUsd => self.reference_usd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangePoint {
    pub date: NaiveDate,
    /// Percent.
    pub change: f64,
}

/// Percent change from `start` to `end`, NaN when either is non-finite or `start` is zero.
pub fn compute_change(start: f64, end: f64) -> f64 {
    if !start.is_finite() || !end.is_finite() || start == 0.0 {
        return f64::NAN;
    }
    (end - start) / start.abs() * 100.0
}

/// Entries inside the range window ending at the last entry. `entries` must be sorted by date.
pub fn filter_by_range(range: RangeKey, entries: &[DailyEntry]) -> &[DailyEntry] {
    let Some(last) = entries.last() else {
        return entries;
    };
    match range.window_start(last.date) {
        Some(start) => {
            let from = entries.partition_point(|entry| entry.date < start);
            &entries[from..]
        }
        None => entries,
    }
}

/// Ranges whose window start is covered by data. Everything is available
/// on an empty series and `ALL` always is.
pub fn available_ranges(entries: &[DailyEntry]) -> Vec<RangeKey> {
    let Some(last) = entries.last() else {
        return RangeKey::ORDER.to_vec();
    };
    RangeKey::ORDER
        .into_iter()
        .filter(|range| match range.window_start(last.date) {
            Some(start) => entries.iter().any(|entry| entry.date <= start),
            None => true,
        })
        .collect()
}

/// `range` if available, otherwise the first available range.
pub fn normalize_range(range: RangeKey, entries: &[DailyEntry]) -> RangeKey {
    let available = available_ranges(entries);
    if available.contains(&range) {
        range
    } else {
        available.first().copied().unwrap_or(RangeKey::All)
    }
}

/// Changes relative to the first finite value of `field`; entries where the
/// field is not finite are left out.
pub fn percent_change_from_base(entries: &[DailyEntry], field: Field) -> Vec<ChangePoint> {
    let valid: Vec<&DailyEntry> = entries.iter().filter(|entry| entry.value(field).is_finite()).collect();
    let Some(base) = valid.first().map(|entry| entry.value(field)) else {
        return Vec::new();
    };
    valid
        .into_iter()
        .map(|entry| ChangePoint {
            date: entry.date,
            change: compute_change(base, entry.value(field)),
        })
        .collect()
}

/// `a - b` for each date of `a` that `b` has a finite change for.
pub fn difference(a: &[ChangePoint], b: &[ChangePoint]) -> Vec<ChangePoint> {
    let by_date: HashMap<NaiveDate, f64> = b
        .iter()
        .filter(|other| other.change.is_finite())
        .map(|other| (other.date, other.change))
        .collect();
    a.iter()
        .filter_map(|point| {
            let other = by_date.get(&point.date)?;
            Some(ChangePoint {
                date: point.date,
                change: point.change - other,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CardStat {
    pub price: Option<f64>,
    /// Percent change between the first and last finite values.
    pub change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeriodStats {
    pub nav: CardStat,
    pub reference: CardStat,
    /// NAV change minus reference change, in percentage points.
    pub spread: Option<f64>,
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn card_stat(entries: &[DailyEntry], field: Field) -> CardStat {
    let first = entries.iter().map(|e| e.value(field)).find(|v| v.is_finite());
    let last = entries.iter().rev().map(|e| e.value(field)).find(|v| v.is_finite());
    let change = match (first, last) {
        (Some(first), Some(last)) => finite(compute_change(first, last)),
        _ => None,
    };
    CardStat { price: last, change }
}

pub fn period_stats(entries: &[DailyEntry]) -> PeriodStats {
    let nav = card_stat(entries, Field::NavUsd);
    let reference = card_stat(entries, Field::ReferenceUsd);
    let spread = match (nav.change, reference.change) {
        (Some(nav), Some(reference)) => Some(nav - reference),
        _ => None,
    };
    PeriodStats { nav, reference, spread }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn entry(d: &str, nav: f64, reference: f64) -> DailyEntry {
        DailyEntry { date: day(d), nav_usd: nav, reference_usd: reference }
    }

    fn daily_run(start: &str, count: i64) -> Vec<DailyEntry> {
        (0..count)
            .map(|i| DailyEntry {
                date: day(start) + TimeDelta::days(i),
                nav_usd: 1.0 + i as f64,
                reference_usd: 100.0,
            })
            .collect()
    }

    #[test]
    fn change_needs_a_finite_non_zero_start() {
        assert_eq!(compute_change(100.0, 110.0), 10.0);
        assert_eq!(compute_change(-100.0, -90.0), 10.0);
        assert!(compute_change(0.0, 1.0).is_nan());
        assert!(compute_change(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn one_month_window_is_thirty_days_inclusive() {
        let entries = daily_run("2025-01-01", 40);
        let window = filter_by_range(RangeKey::OneMonth, &entries);
        assert_eq!(window.len(), 30);
        assert_eq!(window[0].date, day("2025-01-11"));
        assert_eq!(filter_by_range(RangeKey::OneDay, &entries).len(), 1);
        assert_eq!(filter_by_range(RangeKey::All, &entries).len(), 40);
    }

    #[test]
    fn ranges_become_available_once_covered() {
        let entries = daily_run("2025-01-01", 30);
        assert_eq!(available_ranges(&entries), vec![RangeKey::OneDay, RangeKey::OneMonth, RangeKey::All]);
        assert_eq!(normalize_range(RangeKey::SixMonths, &entries), RangeKey::OneDay);
        assert_eq!(available_ranges(&[]), RangeKey::ORDER.to_vec());
    }

    #[test]
    fn percent_change_anchors_on_first_finite_value() {
        let entries = vec![
            entry("2025-01-01", f64::NAN, 100.0),
            entry("2025-01-02", 2.0, 100.0),
            entry("2025-01-03", 3.0, 120.0),
        ];
        let nav = percent_change_from_base(&entries, Field::NavUsd);
        assert_eq!(nav, vec![
            ChangePoint { date: day("2025-01-02"), change: 0.0 },
            ChangePoint { date: day("2025-01-03"), change: 50.0 },
        ]);

        let reference = percent_change_from_base(&entries, Field::ReferenceUsd);
        let spread = difference(&nav, &reference);
        assert_eq!(spread.len(), 2);
        assert_eq!(spread[1].change, 30.0);
    }

    #[test]
    fn difference_drops_days_missing_on_either_side() {
        let a = vec![
            ChangePoint { date: day("2025-01-01"), change: 1.0 },
            ChangePoint { date: day("2025-01-02"), change: 2.0 },
        ];
        let b = vec![ChangePoint { date: day("2025-01-02"), change: 0.5 }];
        assert_eq!(difference(&a, &b), vec![ChangePoint { date: day("2025-01-02"), change: 1.5 }]);
    }

    #[test]
    fn difference_keeps_the_order_of_the_first_series_over_long_runs() {
        let a: Vec<ChangePoint> = daily_run("2024-01-01", 400)
            .iter()
            .enumerate()
            .map(|(i, e)| ChangePoint { date: e.date, change: i as f64 })
            .collect();
        let b: Vec<ChangePoint> = a
            .iter()
            .rev()
            .filter(|p| p.change as i64 % 2 == 0)
            .map(|p| ChangePoint { date: p.date, change: if p.change == 10.0 { f64::NAN } else { 1.0 } })
            .collect();

        let spread = difference(&a, &b);
        assert_eq!(spread.len(), 199);
        assert!(spread.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(spread[0], ChangePoint { date: a[0].date, change: -1.0 });
        assert!(spread.iter().all(|p| p.date != a[10].date));
    }

    #[test]
    fn stats_use_first_and_last_finite_values() {
        let entries = vec![
            entry("2025-01-01", 1.0, f64::NAN),
            entry("2025-01-02", 1.5, 100.0),
            entry("2025-01-03", 2.0, 110.0),
            entry("2025-01-04", f64::NAN, 120.0),
        ];
        let stats = period_stats(&entries);
        assert_eq!(stats.nav, CardStat { price: Some(2.0), change: Some(100.0) });
        assert_eq!(stats.reference.price, Some(120.0));
        assert_eq!(stats.reference.change, Some(20.0));
        assert_eq!(stats.spread, Some(80.0));
    }

    #[test]
    fn range_keys_parse_case_insensitively() {
        assert_eq!("3m".parse::<RangeKey>().unwrap(), RangeKey::ThreeMonths);
        assert_eq!(RangeKey::All.to_string(), "ALL");
        assert!("2W".parse::<RangeKey>().is_err());
    }
}
