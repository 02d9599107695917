//! Append-only keyed tables persisted as delimited files.

pub mod keys;
pub mod table;

pub use keys::{KeySpace, missing_keys, missing_keys_until};
pub use table::{CsvTable, Row, StoreError, parse_table, read_table, row, upsert_rows, write_table};
