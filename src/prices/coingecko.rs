use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;

use super::{PricePoint, PriceSource, normalize};
use crate::constants::COINGECKO_API_BASE;
use crate::http::{FetchRequest, ResilientClient};
use crate::store::KeySpace;

/// `market_chart` response: `[epoch_millis, price]` pairs, price may be null.
#[derive(Debug, Deserialize)]
pub struct MarketChart {
    pub prices: Vec<(f64, Option<f64>)>,
}

#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    coin_id: String,
    base_url: String,
}

impl CoinGeckoSource {
    pub fn new(coin_id: &str) -> Self {
        Self {
            coin_id: coin_id.to_string(),
            base_url: COINGECKO_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn url(&self, space: KeySpace) -> String {
        let range = match space {
            KeySpace::Day => "days=max&interval=daily",
            KeySpace::Hour => "days=90&interval=hourly",
        };
        format!("{}/coins/{}/market_chart?vs_currency=usd&{range}", self.base_url, self.coin_id)
    }
}

pub fn parse_market_chart(chart: MarketChart, space: KeySpace, start: Option<&str>) -> Vec<PricePoint> {
    let raw = chart
        .prices
        .into_iter()
        .filter_map(|(millis, price)| {
            space
                .key_from_millis(millis as i64)
                .map(|key| (key, price.unwrap_or(f64::NAN)))
        });
    normalize(raw, start)
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch(&self, client: &ResilientClient, space: KeySpace, start: Option<&str>) -> Result<Vec<PricePoint>> {
        let request = FetchRequest::new(self.url(space))
            .cache_key(format!("coingecko-{}-usd-{}", self.coin_id, space.label()));
        let chart: MarketChart = client.fetch_json(&request).await?;
        Ok(parse_market_chart(chart, space, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_daily_and_hourly_urls() {
        let source = CoinGeckoSource::new("bitcoin").with_base_url("http://x");
        assert_eq!(
            source.url(KeySpace::Day),
            "http://x/coins/bitcoin/market_chart?vs_currency=usd&days=max&interval=daily"
        );
        assert!(source.url(KeySpace::Hour).ends_with("days=90&interval=hourly"));
    }

    #[test]
    fn daily_points_keep_the_last_price_of_each_day() {
        let chart: MarketChart = serde_json::from_value(json!({
            "prices": [
                [1735689600000u64, 93000.5],
                [1735776000000u64, 94000.0],
                // intraday refresh of the current day
                [1735812000000u64, 94500.25],
                [1735898400000u64, null]
            ],
            "market_caps": [],
            "total_volumes": []
        }))
        .unwrap();
        let points = parse_market_chart(chart, KeySpace::Day, None);

        assert_eq!(points, vec![
            PricePoint { key: "2025-01-01".into(), price: 93000.5 },
            PricePoint { key: "2025-01-02".into(), price: 94500.25 },
        ]);
    }

    #[test]
    fn hourly_points_are_keyed_on_the_hour() {
        let chart: MarketChart = serde_json::from_value(json!({
            "prices": [[1735689600000u64, 1.0], [1735691400000u64, 2.0], [1735693200000u64, 3.0]]
        }))
        .unwrap();
        let points = parse_market_chart(chart, KeySpace::Hour, None);
        assert_eq!(points.iter().map(|p| p.key.as_str()).collect::<Vec<_>>(), vec![
            "2025-01-01T00:00:00Z",
            "2025-01-01T01:00:00Z"
        ]);
        assert_eq!(points[0].price, 2.0);
    }
}
