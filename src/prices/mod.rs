//! Reference price adapters (CoinGecko, CryptoCompare, Binance)
//!
//! Every adapter normalizes its upstream shape into [`PricePoint`]s through
//! [`normalize`], so deduplication, validation and ordering are identical
//! whichever source ends up serving the series.

pub mod binance;
pub mod coingecko;
pub mod cryptocompare;

use std::collections::BTreeMap;
use async_trait::async_trait;
use eyre::Result;
use futures::FutureExt;
use tracing::info;

use crate::config::ReferenceAssetIds;
use crate::fallback::{Candidate, FallbackOutcome, SequenceError, ensure_non_empty, run_with_fallback};
use crate::http::ResilientClient;
use crate::store::KeySpace;

pub use binance::BinanceSource;
pub use coingecko::CoinGeckoSource;
pub use cryptocompare::CryptoCompareSource;

/// One reference price for one day or hour key.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub key: String,
    pub price: f64,
}

/// Drops non-finite and non-positive prices, keeps the last price seen per
/// key, drops keys before `start` and returns the points in key order.
pub fn normalize<I>(raw: I, start: Option<&str>) -> Vec<PricePoint>
where
    I: IntoIterator<Item = (String, f64)>,
{
    let mut by_key: BTreeMap<String, f64> = BTreeMap::new();
    for (key, price) in raw {
        if !price.is_finite() || price <= 0.0 {
            continue;
        }
        by_key.insert(key, price);
    }
    by_key
        .into_iter()
        .filter(|(key, _)| start.is_none_or(|start| key.as_str() >= start))
        .map(|(key, price)| PricePoint { key, price })
        .collect()
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Full history the source offers for the key space, normalized.
    async fn fetch(&self, client: &ResilientClient, space: KeySpace, start: Option<&str>) -> Result<Vec<PricePoint>>;
}

/// CoinGecko, then CryptoCompare, then Binance.
pub fn default_sources(ids: &ReferenceAssetIds) -> Vec<Box<dyn PriceSource>> {
    vec![
        Box::new(CoinGeckoSource::new(&ids.coingecko_coin_id)),
        Box::new(CryptoCompareSource::new(&ids.cryptocompare_symbol)),
        Box::new(BinanceSource::new(&ids.binance_symbol)),
    ]
}

/// First source returning a non-empty series wins.
pub async fn fetch_reference_series(
    client: &ResilientClient,
    sources: &[Box<dyn PriceSource>],
    space: KeySpace,
    start: Option<&str>,
) -> Result<FallbackOutcome<Vec<PricePoint>>, SequenceError> {
    let candidates = sources
        .iter()
        .map(|source| {
            Candidate::new(source.name(), move || {
                async move { ensure_non_empty(source.fetch(client, space, start).await?) }.boxed()
            })
        })
        .collect();

    let label = format!("reference prices ({})", space.label());
    let outcome = run_with_fallback(&label, candidates).await?;
    info!(source = %outcome.source, points = outcome.value.len(), "Reference series fetched");
    Ok(outcome)
}
