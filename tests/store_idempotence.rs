use std::fs;

use chrono::{TimeZone, Utc};
use fund_nav_pipeline::store::{KeySpace, missing_keys_until, read_table, row, upsert_rows};
use tempfile::tempdir;

#[test]
fn rerunning_the_same_upsert_leaves_the_file_byte_identical() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("btc_usd_daily.csv");
    let header = ["day", "btc_usd"];
    let batch = || {
        vec![
            row([("day", "2025-07-24"), ("btc_usd", "118755.12")]),
            row([("day", "2025-07-23"), ("btc_usd", "118601.50")]),
        ]
    };

    upsert_rows(&path, &header, "day", batch()).unwrap();
    let first = fs::read(&path).unwrap();
    upsert_rows(&path, &header, "day", batch()).unwrap();
    upsert_rows(&path, &header, "day", Vec::new()).unwrap();

    assert_eq!(fs::read(&path).unwrap(), first);
    assert_eq!(
        String::from_utf8(first).unwrap(),
        "day,btc_usd\n2025-07-23,118601.50\n2025-07-24,118755.12\n"
    );
}

#[test]
fn stored_keys_are_not_requested_again() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nav_tokenprice_usd_daily.csv");
    let start = chrono::NaiveDate::from_ymd_opt(2025, 7, 23).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 7, 27, 6, 0, 0).unwrap();

    let before = read_table(&path).unwrap();
    let missing = missing_keys_until(KeySpace::Day, before.keys("day"), start, now);
    assert_eq!(missing, vec!["2025-07-23", "2025-07-24", "2025-07-25", "2025-07-26"]);

    upsert_rows(
        &path,
        &["day", "token_price_usd"],
        "day",
        missing[..2]
            .iter()
            .map(|day| row([("day", day.as_str()), ("token_price_usd", "1.00000000")]))
            .collect(),
    )
    .unwrap();

    let after = read_table(&path).unwrap();
    assert_eq!(
        missing_keys_until(KeySpace::Day, after.keys("day"), start, now),
        vec!["2025-07-25", "2025-07-26"]
    );
}
