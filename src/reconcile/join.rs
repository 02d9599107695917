use std::collections::BTreeMap;

use crate::store::CsvTable;

/// One key of two aligned series; a side the key is missing from is NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRow {
    pub key: String,
    pub nav: f64,
    pub reference: f64,
}

impl ReconciledRow {
    pub fn is_complete(&self) -> bool {
        self.nav.is_finite() && self.reference.is_finite()
    }
}

/// `(key, value)` pairs of one column; unparseable or empty values become NaN
/// and rows without a key are dropped.
pub fn column_series(table: &CsvTable, key_column: &str, value_column: &str) -> Vec<(String, f64)> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let key = row.get(key_column).filter(|key| !key.is_empty())?;
            let value = row
                .get(value_column)
                .and_then(|raw| raw.parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            Some((key.clone(), value))
        })
        .collect()
}

/// Outer join by key, sorted ascending. Later duplicates of a key win.
pub fn join(nav: &[(String, f64)], reference: &[(String, f64)]) -> Vec<ReconciledRow> {
    let mut joined: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for (key, value) in nav {
        joined.entry(key.as_str()).or_insert((f64::NAN, f64::NAN)).0 = *value;
    }
    for (key, value) in reference {
        joined.entry(key.as_str()).or_insert((f64::NAN, f64::NAN)).1 = *value;
    }
    joined
        .into_iter()
        .map(|(key, (nav, reference))| ReconciledRow {
            key: key.to_string(),
            nav,
            reference,
        })
        .collect()
}
