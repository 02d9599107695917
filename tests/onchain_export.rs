use std::fs;
use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use eyre::{Result, bail};
use fund_nav_pipeline::nav::{SanityPolicy, SeriesCollector, ValueEndpoint};
use fund_nav_pipeline::pipeline::{OnchainSeries, export_onchain_series};
use fund_nav_pipeline::store::KeySpace;
use rust_decimal::Decimal;
use rust_decimal::dec;
use tempfile::tempdir;

/// Blocks are timestamps; every block reads the same value.
struct FlatEndpoint {
    name: &'static str,
    value: Decimal,
    down: bool,
}

#[async_trait]
impl ValueEndpoint for FlatEndpoint {
    fn name(&self) -> &str {
        self.name
    }

    async fn resolve_block(&self, target_ts: u64, _hint: Option<u64>) -> Result<u64> {
        if self.down {
            bail!("{} refused the connection", self.name);
        }
        Ok(target_ts)
    }

    async fn value_at(&self, _block: u64) -> Result<Decimal> {
        Ok(self.value)
    }
}

fn nav_series(path: &Path) -> OnchainSeries {
    OnchainSeries {
        path: path.to_path_buf(),
        value_column: "token_price_usd",
        start_date: NaiveDate::from_ymd_opt(2025, 7, 23).unwrap(),
        collector: SeriesCollector {
            label: "NAV",
            space: KeySpace::Day,
            precision: 8,
            policy: Some(SanityPolicy::DAILY),
        },
    }
}

#[tokio::test]
async fn backfills_through_yesterday_then_has_nothing_to_do() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nav_tokenprice_usd_daily.csv");
    let series = nav_series(&path);
    let endpoints = vec![
        FlatEndpoint { name: "primary", value: dec!(1), down: true },
        FlatEndpoint { name: "fallback", value: dec!(1.0234567891), down: false },
    ];
    let now = Utc.with_ymd_and_hms(2025, 7, 26, 12, 0, 0).unwrap();

    let summary = export_onchain_series(&series, &endpoints, now).await.unwrap();
    assert_eq!(summary.added, 3);
    assert!(summary.skipped.is_empty());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "day,token_price_usd\n\
         2025-07-23,1.02345679\n\
         2025-07-24,1.02345679\n\
         2025-07-25,1.02345679\n"
    );

    let again = export_onchain_series(&series, &endpoints, now).await.unwrap();
    assert_eq!(again.added, 0);
}

#[tokio::test]
async fn implausible_values_leave_the_day_missing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nav_tokenprice_usd_daily.csv");
    fs::write(
        &path,
        "day,token_price_usd\n2025-07-23,1.00000000\n2025-07-24,1.00000000\n2025-07-25,1.00000000\n",
    )
    .unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let endpoints = vec![FlatEndpoint { name: "only", value: dec!(1.5), down: false }];
    let now = Utc.with_ymd_and_hms(2025, 7, 27, 0, 30, 0).unwrap();

    let summary = export_onchain_series(&nav_series(&path), &endpoints, now).await.unwrap();
    assert_eq!(summary.added, 0);
    assert_eq!(summary.skipped, vec!["2025-07-26"]);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}
