use std::sync::Arc;
use ethers::prelude::*;
use eyre::Result;
use rust_decimal::Decimal;

use super::units::i256_to_decimal_scaled_decimals;

// ABI for Chainlink AggregatorV3Interface
abigen!(
    AggregatorV3Interface,
    r#"[
        function latestRoundData() external view returns (uint80, int256, uint256, uint256, uint80)
        function decimals() external view returns (uint8)
    ]"#
);

/// A Chainlink price feed read through one RPC endpoint.
#[derive(Debug, Clone)]
pub struct ChainlinkFeed {
    pub aggregator: Address,
    provider: Arc<Provider<Http>>,
}

impl ChainlinkFeed {
    pub fn new(aggregator: Address, provider: Arc<Provider<Http>>) -> Self {
        Self { aggregator, provider }
    }

    pub async fn decimals(&self) -> Result<u8> {
        let contract = AggregatorV3Interface::new(self.aggregator, self.provider.clone());
        Ok(contract.decimals().call().await?)
    }

    /// Latest answer as of `block`, scaled by the feed's decimals.
    pub async fn answer_at(&self, block: u64, decimals: u8) -> Result<Decimal> {
        let contract = AggregatorV3Interface::new(self.aggregator, self.provider.clone());
        let round_data = contract.latest_round_data().block(block).call().await?;
        let raw_answer = round_data.1;

        if raw_answer <= I256::zero() {
            eyre::bail!("Feed at {:?} returned invalid price {raw_answer} at block {block}", self.aggregator);
        }

        i256_to_decimal_scaled_decimals(raw_answer, decimals as u32)
    }
}
