use futures::FutureExt;
use eyre::Result;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use super::endpoints::ValueEndpoint;
use super::sanity::{RollingHistory, SanityError, SanityPolicy};
use crate::fallback::{Candidate, run_with_fallback};
use crate::store::KeySpace;

#[derive(Debug, Clone, PartialEq)]
pub struct CollectedValue {
    pub key: String,
    pub value: Decimal,
    pub block: u64,
    pub source: String,
}

#[derive(Debug, Default)]
pub struct CollectReport {
    pub values: Vec<CollectedValue>,
    /// Keys every endpoint failed for; they stay missing until a later run.
    pub skipped: Vec<String>,
}

/// Reads one on-chain value per missing key, walking the endpoints in order.
///
/// Each key resolves the block at the end of its period, reads the value at
/// that block, rounds it to `precision` and validates it. A failed or
/// rejected read moves on to the next endpoint; a key no endpoint can serve is
/// skipped without stopping the run. Accepted values join the history so later
/// keys are checked against them.
#[derive(Debug, Clone)]
pub struct SeriesCollector {
    pub label: &'static str,
    pub space: KeySpace,
    pub precision: u32,
    /// `None` keeps only the positivity check.
    pub policy: Option<SanityPolicy>,
}

impl SeriesCollector {
    #[instrument(skip_all, fields(series = self.label, on_close = true))]
    pub async fn collect<E>(&self, endpoints: &[E], keys: &[String], mut history: RollingHistory) -> Result<CollectReport>
    where
        E: ValueEndpoint,
    {
        // Last resolved block per endpoint, seeds the next search on that endpoint
        let hints: Vec<Mutex<Option<u64>>> = endpoints.iter().map(|_| Mutex::new(None)).collect();
        let mut report = CollectReport::default();

        for key in keys {
            let target_ts = u64::try_from(self.space.target_timestamp(key)?)?;

            let outcome = {
                let history = &history;
                let candidates = endpoints
                    .iter()
                    .zip(hints.iter())
                    .map(|(endpoint, hint)| {
                        Candidate::new(endpoint.name(), move || {
                            self.read_one(endpoint, hint, history, key, target_ts).boxed()
                        })
                    })
                    .collect();
                run_with_fallback(key, candidates).await
            };

            match outcome {
                Ok(outcome) => {
                    let value = outcome.value;
                    info!(
                        key = %value.key,
                        value = %value.value,
                        block = value.block,
                        source = %value.source,
                        "Fetched {}", self.label
                    );
                    history.record(value.key.clone(), value.value);
                    report.values.push(value);
                }
                Err(e) => {
                    error!(key = %key, error = %e, "All endpoints failed for {}, skipping", self.label);
                    report.skipped.push(key.clone());
                }
            }
        }

        Ok(report)
    }

    async fn read_one<E>(
        &self,
        endpoint: &E,
        hint: &Mutex<Option<u64>>,
        history: &RollingHistory,
        key: &str,
        target_ts: u64,
    ) -> Result<CollectedValue>
    where
        E: ValueEndpoint,
    {
        let previous = *hint.lock().await;
        let block = endpoint.resolve_block(target_ts, previous).await?;
        *hint.lock().await = Some(block);

        let value = endpoint.value_at(block).await?.round_dp(self.precision);
        match &self.policy {
            Some(policy) => history.check(policy, key, value)?,
            None if value <= Decimal::ZERO => return Err(SanityError::NotPositive { value }.into()),
            None => {}
        }

        Ok(CollectedValue {
            key: key.to_string(),
            value,
            block,
            source: endpoint.name().to_string(),
        })
    }
}
