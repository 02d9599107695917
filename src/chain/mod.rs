pub mod block_resolver;
pub mod chainlink;
pub mod pool_logic;
pub mod provider;
pub mod units;

pub use block_resolver::{BlockSource, BlockStamp, resolve_block};
pub use chainlink::ChainlinkFeed;
pub use provider::{RpcEndpoint, build_endpoints, build_provider};
