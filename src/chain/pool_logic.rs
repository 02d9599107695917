use std::sync::Arc;
use ethers::prelude::*;
use eyre::Result;
use rust_decimal::Decimal;

use super::units::u256_to_decimal_scaled_decimals;
use crate::constants::NAV_DECIMALS;

// Fund pool valuation, share price with 18 decimals
abigen!(
    PoolLogic,
    r#"[
        function tokenPrice() external view returns (uint256)
    ]"#
);

/// Share price reported by the pool contract as of `block`.
pub async fn token_price_at(provider: Arc<Provider<Http>>, pool: Address, block: u64) -> Result<Decimal> {
    let contract = PoolLogic::new(pool, provider);
    let raw = contract.token_price().block(block).call().await?;
    u256_to_decimal_scaled_decimals(raw, NAV_DECIMALS)
}
