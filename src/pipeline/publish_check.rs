use std::collections::BTreeMap;
use eyre::{Result, bail};
use tracing::{info, warn};

use crate::config::Config;
use crate::constants::DAILY_NAV_WBTC_CSV;
use crate::http::{FetchRequest, ResilientClient};
use crate::store::{CsvTable, Row, parse_table, read_table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMismatch {
    pub column: String,
    pub local: String,
    pub remote: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMismatch {
    pub key: String,
    pub columns: Vec<ColumnMismatch>,
}

/// Differences between a local table and its published copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishDiff {
    pub missing_remote: Vec<String>,
    pub mismatched: Vec<RowMismatch>,
    pub additional_remote: Vec<String>,
}

impl PublishDiff {
    /// Every local row is published unchanged. Extra remote rows do not count.
    pub fn is_in_sync(&self) -> bool {
        self.missing_remote.is_empty() && self.mismatched.is_empty()
    }

    pub fn log(&self) {
        if self.is_in_sync() {
            info!("All local rows have matching counterparts on production");
        }
        if !self.missing_remote.is_empty() {
            warn!(days = %self.missing_remote.join(", "), "Missing on production");
        }
        for row in &self.mismatched {
            for column in &row.columns {
                warn!(
                    key = %row.key,
                    column = %column.column,
                    local = %column.local,
                    remote = %column.remote,
                    "Mismatched value"
                );
            }
        }
        if !self.additional_remote.is_empty() {
            info!(days = %self.additional_remote.join(", "), "Production has additional rows");
        }
    }
}

fn rows_by_key<'a>(table: &'a CsvTable, key_column: &str) -> BTreeMap<&'a str, &'a Row> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let key = row.get(key_column).filter(|key| !key.is_empty())?;
            Some((key.as_str(), row))
        })
        .collect()
}

/// Compares by key over the local header's columns; a column the remote row
/// lacks compares as empty.
pub fn compare_tables(local: &CsvTable, remote: &CsvTable, key_column: &str) -> PublishDiff {
    let local_rows = rows_by_key(local, key_column);
    let remote_rows = rows_by_key(remote, key_column);
    let mut diff = PublishDiff::default();

    for (key, local_row) in &local_rows {
        let Some(remote_row) = remote_rows.get(key) else {
            diff.missing_remote.push(key.to_string());
            continue;
        };
        let columns: Vec<ColumnMismatch> = local
            .header
            .iter()
            .filter_map(|column| {
                let local_value = local_row.get(column).map(String::as_str).unwrap_or("");
                let remote_value = remote_row.get(column).map(String::as_str).unwrap_or("");
                (local_value != remote_value).then(|| ColumnMismatch {
                    column: column.clone(),
                    local: local_value.to_string(),
                    remote: remote_value.to_string(),
                })
            })
            .collect();
        if !columns.is_empty() {
            diff.mismatched.push(RowMismatch { key: key.to_string(), columns });
        }
    }

    diff.additional_remote = remote_rows
        .keys()
        .filter(|key| !local_rows.contains_key(*key))
        .map(|key| key.to_string())
        .collect();
    diff
}

/// Diffs the local daily NAV-vs-WBTC table against the published one.
pub async fn check_published(config: &Config) -> Result<PublishDiff> {
    let local_path = config.data_file(DAILY_NAV_WBTC_CSV);
    if !local_path.exists() {
        bail!("Local CSV not found at {}", local_path.display());
    }
    let local = read_table(&local_path)?;

    let client = ResilientClient::new(&config.http, &config.cache_dir)?;
    let body = client
        .fetch_text(&FetchRequest::new(config.published_nav_wbtc_url.as_str()))
        .await?;
    let remote = parse_table(&body, &config.published_nav_wbtc_url)?;

    let diff = compare_tables(&local, &remote, "day");
    diff.log();
    Ok(diff)
}
