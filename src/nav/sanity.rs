use std::collections::BTreeMap;
use std::ops::Bound;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::constants::{
    DAILY_SANITY_MIN_SAMPLES, DAILY_SANITY_WINDOW, HOURLY_SANITY_MIN_SAMPLES, HOURLY_SANITY_WINDOW,
    SANITY_TOLERANCE,
};
use crate::store::KeySpace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanityError {
    #[error("{value} is not a positive price")]
    NotPositive { value: Decimal },
    #[error("{value} deviates {deviation} from rolling median {median} (tolerance {tolerance})")]
    Deviation {
        value: Decimal,
        median: Decimal,
        deviation: Decimal,
        tolerance: Decimal,
    },
}

/// Rolling-median check parameters for one key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanityPolicy {
    /// Prior values the median is taken over.
    pub window: usize,
    /// Below this many prior values the check is skipped.
    pub min_samples: usize,
    /// Maximum relative deviation from the median, inclusive.
    pub tolerance: Decimal,
}

impl SanityPolicy {
    pub const DAILY: SanityPolicy = SanityPolicy {
        window: DAILY_SANITY_WINDOW,
        min_samples: DAILY_SANITY_MIN_SAMPLES,
        tolerance: SANITY_TOLERANCE,
    };

    pub const HOURLY: SanityPolicy = SanityPolicy {
        window: HOURLY_SANITY_WINDOW,
        min_samples: HOURLY_SANITY_MIN_SAMPLES,
        tolerance: SANITY_TOLERANCE,
    };

    pub fn for_key_space(space: KeySpace) -> Self {
        match space {
            KeySpace::Day => Self::DAILY,
            KeySpace::Hour => Self::HOURLY,
        }
    }
}

pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / Decimal::TWO)
    } else {
        Some(sorted[mid])
    }
}

/// Accepted values keyed by series key, the reference for the sanity check.
#[derive(Debug, Clone, Default)]
pub struct RollingHistory {
    entries: BTreeMap<String, Decimal>,
}

impl RollingHistory {
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, Decimal)>,
    {
        Self { entries: entries.into_iter().collect() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn record(&mut self, key: impl Into<String>, value: Decimal) {
        self.entries.insert(key.into(), value);
    }

    /// Up to `window` values strictly before `key`, oldest first.
    pub fn prior_values(&self, key: &str, window: usize) -> Vec<Decimal> {
        let mut values: Vec<Decimal> = self
            .entries
            .range::<str, _>((Bound::Unbounded, Bound::Excluded(key)))
            .rev()
            .take(window)
            .map(|(_, value)| *value)
            .collect();
        values.reverse();
        values
    }

    /// Rejects non-positive values and values too far from the median of the
    /// prior window. With fewer prior values than the policy's minimum, or a
    /// zero median, only the positivity check applies.
    pub fn check(&self, policy: &SanityPolicy, key: &str, value: Decimal) -> Result<(), SanityError> {
        if value <= Decimal::ZERO {
            return Err(SanityError::NotPositive { value });
        }

        let prior = self.prior_values(key, policy.window);
        if prior.len() < policy.min_samples {
            return Ok(());
        }
        let Some(median) = median(&prior) else {
            return Ok(());
        };
        if median.is_zero() {
            return Ok(());
        }

        let deviation = ((value - median) / median).abs();
        if deviation > policy.tolerance {
            return Err(SanityError::Deviation {
                value,
                median,
                deviation,
                tolerance: policy.tolerance,
            });
        }
        Ok(())
    }
}
