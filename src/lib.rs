pub mod config;
pub mod constants;
pub mod logging;
pub mod fallback;
pub mod http;
pub mod prices;
pub mod chain;
pub mod nav;
pub mod store;
pub mod reconcile;
pub mod pipeline;
