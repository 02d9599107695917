use std::collections::HashSet;
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use eyre::{Result, WrapErr, eyre};

use crate::constants::{MAX_BACKFILL_DAYS, MAX_BACKFILL_HOURS};

/// Granularity of a keyed series and everything derived from it.
///
/// Day keys look like `2025-07-23`, hour keys like `2025-07-23T05:00:00Z`; both
/// sort lexicographically in chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    Day,
    Hour,
}

impl KeySpace {
    pub fn key_column(self) -> &'static str {
        match self {
            KeySpace::Day => "day",
            KeySpace::Hour => "ts",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            KeySpace::Day => "daily",
            KeySpace::Hour => "hourly",
        }
    }

    fn period_secs(self) -> i64 {
        match self {
            KeySpace::Day => 86_400,
            KeySpace::Hour => 3_600,
        }
    }

    pub fn step(self) -> TimeDelta {
        TimeDelta::seconds(self.period_secs())
    }

    pub fn max_backfill(self) -> usize {
        match self {
            KeySpace::Day => MAX_BACKFILL_DAYS,
            KeySpace::Hour => MAX_BACKFILL_HOURS,
        }
    }

    /// Start of the period containing `instant`.
    pub fn floor(self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let secs = instant.timestamp();
        let floored = secs - secs.rem_euclid(self.period_secs());
        DateTime::from_timestamp(floored, 0).unwrap_or(instant)
    }

    pub fn key(self, instant: DateTime<Utc>) -> String {
        let start = self.floor(instant);
        match self {
            KeySpace::Day => start.format("%Y-%m-%d").to_string(),
            KeySpace::Hour => start.format("%Y-%m-%dT%H:00:00Z").to_string(),
        }
    }

    pub fn key_from_millis(self, millis: i64) -> Option<String> {
        DateTime::from_timestamp_millis(millis).map(|instant| self.key(instant))
    }

    pub fn key_from_seconds(self, seconds: i64) -> Option<String> {
        DateTime::from_timestamp(seconds, 0).map(|instant| self.key(instant))
    }

    /// Start of the period a key names.
    pub fn parse(self, key: &str) -> Result<DateTime<Utc>> {
        match self {
            KeySpace::Day => {
                let date = NaiveDate::parse_from_str(key, "%Y-%m-%d")
                    .wrap_err_with(|| format!("Invalid day key: {key}"))?;
                Ok(date.and_time(Default::default()).and_utc())
            }
            KeySpace::Hour => {
                let instant = DateTime::parse_from_rfc3339(key)
                    .wrap_err_with(|| format!("Invalid hour key: {key}"))?
                    .with_timezone(&Utc);
                if self.floor(instant) != instant {
                    return Err(eyre!("Hour key is not on the hour: {key}"));
                }
                Ok(instant)
            }
        }
    }

    /// Last second of the period a key names (23:59:59 or HH:59:59 UTC).
    pub fn target_timestamp(self, key: &str) -> Result<i64> {
        Ok(self.parse(key)?.timestamp() + self.period_secs() - 1)
    }

    /// Most recent period that has fully elapsed at `now`.
    pub fn last_complete(self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.floor(now) - self.step()
    }
}

/// Every key in `[start, end_inclusive]` not already present, in ascending order.
pub fn missing_keys<'a, I>(
    space: KeySpace,
    existing: I,
    start: DateTime<Utc>,
    end_inclusive: DateTime<Utc>,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let present: HashSet<&str> = existing.into_iter().collect();
    let end = space.floor(end_inclusive);
    let mut cursor = space.floor(start);
    let mut missing = Vec::new();
    while cursor <= end {
        let key = space.key(cursor);
        if !present.contains(key.as_str()) {
            missing.push(key);
        }
        cursor += space.step();
    }
    missing
}

/// Missing keys from `start_date` up to the last complete period, capped at the
/// key space's per-run backfill limit (earliest first).
pub fn missing_keys_until<'a, I>(
    space: KeySpace,
    existing: I,
    start_date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let start = start_date.and_time(Default::default()).and_utc();
    let end = space.last_complete(now);
    if end < start {
        return Vec::new();
    }
    let mut missing = missing_keys(space, existing, start, end);
    missing.truncate(space.max_backfill());
    missing
}
