pub mod cache;
pub mod client;
pub mod transport;

pub use cache::ResponseCache;
pub use client::ResilientClient;
pub use transport::{FetchRequest, HttpError, Transport};
