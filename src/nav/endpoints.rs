use async_trait::async_trait;
use ethers::types::Address;
use eyre::Result;
use rust_decimal::Decimal;
use tokio::sync::OnceCell;

use crate::chain::{ChainlinkFeed, RpcEndpoint, pool_logic, resolve_block};

/// A source of one on-chain value per block, reachable through a single RPC endpoint.
#[async_trait]
pub trait ValueEndpoint: Send + Sync {
    fn name(&self) -> &str;

    async fn resolve_block(&self, target_ts: u64, hint: Option<u64>) -> Result<u64>;

    async fn value_at(&self, block: u64) -> Result<Decimal>;
}

/// Fund share price from the pool contract's `tokenPrice()`.
pub struct PoolPriceEndpoint {
    rpc: RpcEndpoint,
    pool: Address,
}

impl PoolPriceEndpoint {
    pub fn new(rpc: RpcEndpoint, pool: Address) -> Self {
        Self { rpc, pool }
    }
}

#[async_trait]
impl ValueEndpoint for PoolPriceEndpoint {
    fn name(&self) -> &str {
        &self.rpc.name
    }

    async fn resolve_block(&self, target_ts: u64, hint: Option<u64>) -> Result<u64> {
        resolve_block(self.rpc.provider.as_ref(), target_ts, hint).await
    }

    async fn value_at(&self, block: u64) -> Result<Decimal> {
        pool_logic::token_price_at(self.rpc.provider.clone(), self.pool, block).await
    }
}

/// Chainlink aggregator answer; decimals are read once per endpoint.
pub struct FeedEndpoint {
    rpc: RpcEndpoint,
    feed: ChainlinkFeed,
    decimals: OnceCell<u8>,
}

impl FeedEndpoint {
    pub fn new(rpc: RpcEndpoint, aggregator: Address) -> Self {
        let feed = ChainlinkFeed::new(aggregator, rpc.provider.clone());
        Self {
            rpc,
            feed,
            decimals: OnceCell::new(),
        }
    }
}

#[async_trait]
impl ValueEndpoint for FeedEndpoint {
    fn name(&self) -> &str {
        &self.rpc.name
    }

    async fn resolve_block(&self, target_ts: u64, hint: Option<u64>) -> Result<u64> {
        resolve_block(self.rpc.provider.as_ref(), target_ts, hint).await
    }

    async fn value_at(&self, block: u64) -> Result<Decimal> {
        let decimals = *self.decimals.get_or_try_init(|| self.feed.decimals()).await?;
        self.feed.answer_at(block, decimals).await
    }
}
