//! On-chain value series: per-key reads over an ordered RPC sequence with a
//! rolling-median plausibility check.

pub mod collector;
pub mod endpoints;
pub mod sanity;

pub use collector::{CollectReport, CollectedValue, SeriesCollector};
pub use endpoints::{FeedEndpoint, PoolPriceEndpoint, ValueEndpoint};
pub use sanity::{RollingHistory, SanityError, SanityPolicy, median};
