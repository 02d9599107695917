use async_trait::async_trait;
use eyre::{Result, WrapErr, bail};
use serde::Deserialize;

use super::{PricePoint, PriceSource, normalize};
use crate::constants::CRYPTOCOMPARE_API_BASE;
use crate::http::{FetchRequest, ResilientClient};
use crate::store::KeySpace;

const HISTORY_LIMIT: u32 = 2000;

/// `histoday`/`histohour` envelope. On errors `Data` is an empty object or
/// array, so it is only decoded once `Response` says success.
#[derive(Debug, Deserialize)]
pub struct HistoResponse {
    #[serde(rename = "Response")]
    pub response: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "Data", default)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct HistoBar {
    time: i64,
    close: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CryptoCompareSource {
    symbol: String,
    base_url: String,
}

impl CryptoCompareSource {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            base_url: CRYPTOCOMPARE_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn url(&self, space: KeySpace) -> String {
        let endpoint = match space {
            KeySpace::Day => "histoday",
            KeySpace::Hour => "histohour",
        };
        format!(
            "{}/{endpoint}?fsym={}&tsym=USD&limit={HISTORY_LIMIT}",
            self.base_url, self.symbol
        )
    }
}

pub fn parse_histo(response: HistoResponse, space: KeySpace, start: Option<&str>) -> Result<Vec<PricePoint>> {
    if response.response != "Success" {
        bail!("CryptoCompare returned {}: {}", response.response, response.message);
    }
    let bars: Vec<HistoBar> = serde_json::from_value(response.data["Data"].clone())
        .wrap_err("CryptoCompare response has no Data.Data bars")?;

    let raw = bars.into_iter().filter_map(|bar| {
        space
            .key_from_seconds(bar.time)
            .map(|key| (key, bar.close.unwrap_or(f64::NAN)))
    });
    Ok(normalize(raw, start))
}

#[async_trait]
impl PriceSource for CryptoCompareSource {
    fn name(&self) -> &'static str {
        "cryptocompare"
    }

    async fn fetch(&self, client: &ResilientClient, space: KeySpace, start: Option<&str>) -> Result<Vec<PricePoint>> {
        let request = FetchRequest::new(self.url(space))
            .cache_key(format!("cryptocompare-{}-usd-{}", self.symbol, space.label()));
        let response: HistoResponse = client.fetch_json(&request).await?;
        parse_histo(response, space, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_daily_bars() {
        let response: HistoResponse = serde_json::from_value(json!({
            "Response": "Success",
            "Message": "",
            "Data": {
                "Aggregated": false,
                "TimeFrom": 1735689600,
                "TimeTo": 1735862400,
                "Data": [
                    {"time": 1735689600, "high": 1.0, "low": 1.0, "open": 1.0, "close": 93429.2},
                    {"time": 1735776000, "close": 0},
                    {"time": 1735862400, "close": 96886.87}
                ]
            }
        }))
        .unwrap();

        let points = parse_histo(response, KeySpace::Day, Some("2025-01-01")).unwrap();
        assert_eq!(points, vec![
            PricePoint { key: "2025-01-01".into(), price: 93429.2 },
            PricePoint { key: "2025-01-03".into(), price: 96886.87 },
        ]);
    }

    #[test]
    fn error_response_is_a_source_failure() {
        let response: HistoResponse = serde_json::from_value(json!({
            "Response": "Error",
            "Message": "You are over your rate limit please upgrade your account!",
            "Data": {}
        }))
        .unwrap();
        let err = parse_histo(response, KeySpace::Day, None).unwrap_err();
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn hourly_url_uses_histohour() {
        let url = CryptoCompareSource::new("BTC").with_base_url("http://x").url(KeySpace::Hour);
        assert_eq!(url, "http://x/histohour?fsym=BTC&tsym=USD&limit=2000");
    }
}
