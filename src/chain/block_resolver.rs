use async_trait::async_trait;
use chrono::DateTime;
use ethers::prelude::*;
use eyre::{Result, eyre};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStamp {
    pub number: u64,
    pub timestamp: u64,
}

/// Read access to block numbers and their timestamps.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn head_block(&self) -> Result<BlockStamp>;

    async fn block_timestamp(&self, number: u64) -> Result<u64>;
}

#[async_trait]
impl BlockSource for Provider<Http> {
    async fn head_block(&self) -> Result<BlockStamp> {
        let block = self
            .get_block(BlockNumber::Latest)
            .await?
            .ok_or_else(|| eyre!("Latest block not available"))?;
        let number = block.number.ok_or_else(|| eyre!("Latest block has no number"))?;
        Ok(BlockStamp {
            number: number.as_u64(),
            timestamp: block.timestamp.as_u64(),
        })
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let block = self
            .get_block(number)
            .await?
            .ok_or_else(|| eyre!("Block {number} not found"))?;
        Ok(block.timestamp.as_u64())
    }
}

/// Latest block whose timestamp is at or before `target_ts` (unix seconds).
/// When several blocks carry the target timestamp, the highest of them.
///
/// A `hint` from a nearby earlier resolution narrows the search; a hint that
/// lands after the target only caps the upper bound. RPC errors propagate.
pub async fn resolve_block<S>(source: &S, target_ts: u64, hint: Option<u64>) -> Result<u64>
where
    S: BlockSource + ?Sized,
{
    let at = DateTime::from_timestamp(target_ts as i64, 0)
        .map(|instant| instant.to_rfc3339())
        .unwrap_or_else(|| target_ts.to_string());

    let head = source.head_block().await?;
    if head.timestamp <= target_ts {
        info!(at = %at, block = head.number, "Target at or after head, using head block");
        return Ok(head.number);
    }

    let mut low = 0u64;
    let mut high = head.number;
    let mut best = 0u64;

    if let Some(hint) = hint.filter(|hint| *hint <= head.number) {
        let ts = source.block_timestamp(hint).await?;
        if ts <= target_ts {
            best = hint;
            low = hint + 1;
        } else if hint == 0 {
            info!(at = %at, "Target precedes genesis, using block 0");
            return Ok(0);
        } else {
            high = hint - 1;
        }
    }

    let mut probes = 0u32;
    while low <= high {
        let mid = low + (high - low) / 2;
        let ts = source.block_timestamp(mid).await?;
        probes += 1;
        // Several blocks can share a timestamp; keep searching upward on a match
        if ts <= target_ts {
            best = mid;
            low = mid + 1;
        } else {
            if mid == 0 {
                break;
            }
            high = mid - 1;
        }
    }

    debug!(probes, "Block search finished");
    info!(at = %at, block = best, "Resolved block");
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const GENESIS: u64 = 1_000;
    const SPACING: u64 = 10;

    struct FakeChain {
        head: u64,
        broken_block: Option<u64>,
        calls: AtomicUsize,
    }

    impl FakeChain {
        fn new(head: u64) -> Self {
            Self { head, broken_block: None, calls: AtomicUsize::new(0) }
        }

        fn ts(number: u64) -> u64 {
            GENESIS + number * SPACING
        }
    }

    #[async_trait]
    impl BlockSource for FakeChain {
        async fn head_block(&self) -> Result<BlockStamp> {
            Ok(BlockStamp { number: self.head, timestamp: Self::ts(self.head) })
        }

        async fn block_timestamp(&self, number: u64) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(number) == self.broken_block {
                eyre::bail!("rpc timeout on block {number}");
            }
            Ok(Self::ts(number))
        }
    }

    #[tokio::test]
    async fn finds_latest_block_at_or_before_target() {
        let chain = FakeChain::new(1_000);
        assert_eq!(resolve_block(&chain, FakeChain::ts(500) + 5, None).await.unwrap(), 500);
        assert_eq!(resolve_block(&chain, FakeChain::ts(731), None).await.unwrap(), 731);
        assert_eq!(resolve_block(&chain, FakeChain::ts(1) - 1, None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn future_target_returns_head_without_searching() {
        let chain = FakeChain::new(1_000);
        assert_eq!(resolve_block(&chain, FakeChain::ts(5_000), None).await.unwrap(), 1_000);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn target_before_genesis_is_block_zero() {
        let chain = FakeChain::new(1_000);
        assert_eq!(resolve_block(&chain, GENESIS - 100, None).await.unwrap(), 0);
        assert_eq!(resolve_block(&chain, GENESIS - 100, Some(0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hints_on_either_side_give_the_same_block() {
        let chain = FakeChain::new(1_000);
        let target = FakeChain::ts(640) + 3;
        assert_eq!(resolve_block(&chain, target, Some(600)).await.unwrap(), 640);
        assert_eq!(resolve_block(&chain, target, Some(900)).await.unwrap(), 640);
        assert_eq!(resolve_block(&chain, target, Some(640)).await.unwrap(), 640);
        assert_eq!(resolve_block(&chain, target, Some(5_000)).await.unwrap(), 640);
    }

    #[tokio::test]
    async fn close_hint_needs_fewer_lookups() {
        let chain = FakeChain::new(1_000_000);
        let target = FakeChain::ts(999_990) + 1;

        resolve_block(&chain, target, None).await.unwrap();
        let cold = chain.calls.swap(0, Ordering::SeqCst);
        assert_eq!(resolve_block(&chain, target, Some(999_980)).await.unwrap(), 999_990);
        let warm = chain.calls.load(Ordering::SeqCst);
        assert!(warm < cold, "warm {warm} vs cold {cold}");
    }

    /// Block timestamps given explicitly; repeats allowed, non-decreasing.
    struct StampedChain {
        stamps: Vec<u64>,
    }

    #[async_trait]
    impl BlockSource for StampedChain {
        async fn head_block(&self) -> Result<BlockStamp> {
            let number = self.stamps.len() as u64 - 1;
            Ok(BlockStamp { number, timestamp: self.stamps[number as usize] })
        }

        async fn block_timestamp(&self, number: u64) -> Result<u64> {
            self.stamps
                .get(number as usize)
                .copied()
                .ok_or_else(|| eyre!("Block {number} not found"))
        }
    }

    #[tokio::test]
    async fn every_target_resolves_to_the_last_block_at_or_before_it() {
        let chain = StampedChain {
            stamps: vec![100, 100, 102, 105, 105, 105, 106, 110, 110, 111, 115, 115],
        };
        let head = chain.stamps.len() as u64 - 1;

        for target in 95..=120u64 {
            let expected = chain
                .stamps
                .iter()
                .rposition(|ts| *ts <= target)
                .map(|b| b as u64)
                .unwrap_or(0);

            assert_eq!(resolve_block(&chain, target, None).await.unwrap(), expected, "target {target}");
            for hint in 0..=head + 2 {
                assert_eq!(
                    resolve_block(&chain, target, Some(hint)).await.unwrap(),
                    expected,
                    "target {target} hint {hint}"
                );
            }
        }
    }

    #[tokio::test]
    async fn rpc_errors_propagate() {
        let mut chain = FakeChain::new(1_000);
        chain.broken_block = Some(500);
        let err = resolve_block(&chain, FakeChain::ts(200), None).await.unwrap_err();
        assert!(err.to_string().contains("rpc timeout"));
    }
}
