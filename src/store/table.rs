use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use csv::{ReaderBuilder, Terminator, Trim, WriterBuilder};
use thiserror::Error;
use tracing::{debug, warn};

/// One stored row, column name to raw value.
pub type Row = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path} line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        path: PathBuf,
        line: u64,
        expected: usize,
        found: usize,
    },
    #[error("value {value:?} in column {column} contains a delimiter or newline")]
    UnsafeValue { column: String, value: String },
    #[error("row has no value for key column {column}")]
    MissingKey { column: String },
}

/// In-memory copy of a delimited file: header order plus rows keyed by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl CsvTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Non-empty values of `column`, in row order.
    pub fn keys<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.rows
            .iter()
            .filter_map(move |row| row.get(column).map(String::as_str))
            .filter(|key| !key.is_empty())
    }
}

/// Reads a table; a missing or empty file is an empty table.
pub fn read_table(path: &Path) -> Result<CsvTable, StoreError> {
    match fs::File::open(path) {
        Ok(file) => table_from_reader(file, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CsvTable::default()),
        Err(source) => Err(StoreError::Io { path: path.to_path_buf(), source }),
    }
}

/// Parses table text fetched from elsewhere; `origin` only labels errors.
pub fn parse_table(text: &str, origin: &str) -> Result<CsvTable, StoreError> {
    table_from_reader(text.as_bytes(), Path::new(origin))
}

fn table_from_reader<R: io::Read>(reader: R, path: &Path) -> Result<CsvTable, StoreError> {
    let csv_err = |source| StoreError::Csv { path: path.to_path_buf(), source };
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let header: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    if header.iter().all(String::is_empty) {
        return Ok(CsvTable::default());
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        if record.len() != header.len() {
            return Err(StoreError::ColumnCount {
                path: path.to_path_buf(),
                line: record.position().map(|p| p.line()).unwrap_or_default(),
                expected: header.len(),
                found: record.len(),
            });
        }
        rows.push(header.iter().cloned().zip(record.iter().map(str::to_string)).collect());
    }

    Ok(CsvTable { header, rows })
}

fn check_value(column: &str, value: &str) -> Result<(), StoreError> {
    if value.contains([',', '\n', '\r']) {
        return Err(StoreError::UnsafeValue {
            column: column.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Writes the whole table in `header` order. Values are never quoted, so any
/// value containing the delimiter or a line break is refused before anything
/// touches the file. Columns a row lacks are written empty.
pub fn write_table(path: &Path, header: &[String], rows: &[Row]) -> Result<(), StoreError> {
    for column in header {
        check_value(column, column)?;
    }
    for row in rows {
        for column in header {
            if let Some(value) = row.get(column) {
                check_value(column, value)?;
            }
        }
    }

    let io_err = |source| StoreError::Io { path: path.to_path_buf(), source };
    let csv_err = |source| StoreError::Csv { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .from_path(&tmp)
            .map_err(csv_err)?;
        writer.write_record(header).map_err(csv_err)?;
        for row in rows {
            writer
                .write_record(header.iter().map(|column| row.get(column).map(String::as_str).unwrap_or("")))
                .map_err(csv_err)?;
        }
        writer.flush().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Merges `new_rows` into the table at `path` by `key_column` and rewrites it
/// sorted by key.
///
/// Existing values survive unless the new row carries the same column; a
/// header already on disk wins over `header`. Returns the merged rows.
pub fn upsert_rows(
    path: &Path,
    header: &[&str],
    key_column: &str,
    new_rows: Vec<Row>,
) -> Result<Vec<Row>, StoreError> {
    let existing = read_table(path)?;
    if new_rows.is_empty() {
        debug!(path = %path.display(), "Nothing to upsert");
        return Ok(existing.rows);
    }

    let requested: Vec<String> = header.iter().map(|c| c.to_string()).collect();
    let header = if existing.header.is_empty() {
        requested
    } else {
        if existing.header != requested {
            warn!(
                path = %path.display(),
                existing = ?existing.header,
                requested = ?requested,
                "Header mismatch, keeping the header on disk"
            );
        }
        existing.header
    };

    let mut merged: BTreeMap<String, Row> = BTreeMap::new();
    for row in existing.rows {
        match row.get(key_column).filter(|key| !key.is_empty()) {
            Some(key) => {
                merged.insert(key.clone(), row);
            }
            None => warn!(path = %path.display(), key_column, "Skipping stored row without a key"),
        }
    }

    let added = new_rows.len();
    for row in new_rows {
        let key = row
            .get(key_column)
            .filter(|key| !key.is_empty())
            .cloned()
            .ok_or_else(|| StoreError::MissingKey { column: key_column.to_string() })?;
        merged.entry(key).or_default().extend(row);
    }

    let rows: Vec<Row> = merged.into_values().collect();
    write_table(path, &header, &rows)?;
    debug!(path = %path.display(), added, total = rows.len(), "Upserted rows");
    Ok(rows)
}

/// Builds a row from `(column, value)` pairs.
pub fn row<K, V, I>(pairs: I) -> Row
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HEADER: [&str; 2] = ["day", "token_price_usd"];

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let table = read_table(&dir.path().join("absent.csv")).unwrap();
        assert!(table.is_empty());
        assert!(table.header.is_empty());
    }

    #[test]
    fn rows_are_sorted_by_key_and_file_ends_with_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        upsert_rows(
            &path,
            &HEADER,
            "day",
            vec![
                row([("day", "2025-01-03"), ("token_price_usd", "1.30000000")]),
                row([("day", "2025-01-01"), ("token_price_usd", "1.10000000")]),
            ],
        )
        .unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert_eq!(
            raw,
            "day,token_price_usd\n2025-01-01,1.10000000\n2025-01-03,1.30000000\n"
        );
    }

    #[test]
    fn upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        let rows = vec![row([("day", "2025-01-01"), ("token_price_usd", "1.0")])];

        upsert_rows(&path, &HEADER, "day", rows.clone()).unwrap();
        let first = fs::read_to_string(&path).unwrap();
        upsert_rows(&path, &HEADER, "day", rows).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn partial_rows_merge_instead_of_replacing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.csv");
        let header = ["day", "a", "b"];
        upsert_rows(&path, &header, "day", vec![row([("day", "2025-01-01"), ("a", "1"), ("b", "2")])]).unwrap();
        let merged = upsert_rows(&path, &header, "day", vec![row([("day", "2025-01-01"), ("b", "3")])]).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0]["a"], "1");
        assert_eq!(merged[0]["b"], "3");
    }

    #[test]
    fn header_on_disk_wins() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        fs::write(&path, "day,price\n2025-01-01,5\n").unwrap();

        upsert_rows(&path, &["day", "other"], "day", vec![row([("day", "2025-01-02"), ("price", "6")])]).unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.header, vec!["day", "price"]);
        assert_eq!(table.keys("day").collect::<Vec<_>>(), vec!["2025-01-01", "2025-01-02"]);
    }

    #[test]
    fn values_with_delimiters_are_refused_and_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        upsert_rows(&path, &HEADER, "day", vec![row([("day", "2025-01-01"), ("token_price_usd", "1")])]).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let err = upsert_rows(
            &path,
            &HEADER,
            "day",
            vec![row([("day", "2025-01-02"), ("token_price_usd", "1,5")])],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsafeValue { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), before);
    }

    #[test]
    fn new_row_without_key_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        let err = upsert_rows(&path, &HEADER, "day", vec![row([("token_price_usd", "1")])]).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { .. }));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "day,price\n2025-01-01\n").unwrap();
        assert!(matches!(read_table(&path), Err(StoreError::ColumnCount { expected: 2, found: 1, .. })));
    }

    #[test]
    fn parses_fetched_text() {
        let table = parse_table("day,nav_usd\r\n2025-01-01,1.0\r\n", "remote").unwrap();
        assert_eq!(table.header, vec!["day", "nav_usd"]);
        assert_eq!(table.rows[0]["nav_usd"], "1.0");
        assert!(parse_table("", "remote").unwrap().is_empty());
    }

    #[test]
    fn whitespace_is_trimmed_on_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nav.csv");
        fs::write(&path, "day , price\n 2025-01-01 , 5 \n").unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.rows[0]["day"], "2025-01-01");
        assert_eq!(table.rows[0]["price"], "5");
    }
}
