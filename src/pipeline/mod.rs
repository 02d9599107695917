//! Stage runners behind the binaries. Each reads what it needs from the data
//! directory, does one unit of work and persists the result.

pub mod dashboard;
pub mod onchain;
pub mod publish_check;
pub mod reconciled;
pub mod reference;

pub use onchain::{ExportSummary, OnchainSeries, export_nav, export_onchain_series, fetch_wbtc_daily};
pub use reconciled::{ReconcileTarget, build_reconciled};
pub use reference::{complete_points, fetch_btc, store_reference_points};
