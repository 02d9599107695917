use async_trait::async_trait;
use eyre::Result;

use super::{PricePoint, PriceSource, normalize};
use crate::constants::BINANCE_API_BASE;
use crate::http::{FetchRequest, ResilientClient};
use crate::store::KeySpace;

const KLINES_LIMIT: u32 = 1000;

#[derive(Debug, Clone)]
pub struct BinanceSource {
    symbol: String,
    base_url: String,
}

impl BinanceSource {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            base_url: BINANCE_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn url(&self, space: KeySpace) -> String {
        let interval = match space {
            KeySpace::Day => "1d",
            KeySpace::Hour => "1h",
        };
        format!(
            "{}/klines?symbol={}&interval={interval}&limit={KLINES_LIMIT}",
            self.base_url, self.symbol
        )
    }
}

/// Klines: `[open_time, open, high, low, close, volume, close_time, ...]`,
/// prices as strings. Malformed rows are skipped.
pub fn parse_klines(klines: Vec<Vec<serde_json::Value>>, space: KeySpace, start: Option<&str>) -> Vec<PricePoint> {
    let raw = klines.into_iter().filter_map(|kline| {
        if kline.len() < 5 {
            return None;
        }
        let open_time = kline[0].as_i64()?;
        let close: f64 = kline[4].as_str()?.parse().ok()?;
        space.key_from_millis(open_time).map(|key| (key, close))
    });
    normalize(raw, start)
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch(&self, client: &ResilientClient, space: KeySpace, start: Option<&str>) -> Result<Vec<PricePoint>> {
        let request = FetchRequest::new(self.url(space))
            .cache_key(format!("binance-{}-{}", self.symbol, space.label()));
        let klines: Vec<Vec<serde_json::Value>> = client.fetch_json(&request).await?;
        Ok(parse_klines(klines, space, start))
    }
}
