//! Metric aggregator: recomputes a pool's derived fields from its state
//! snapshot plus the oracle book.
//!
//! Refresh order matters: price first, then USD liquidity, then market cap,
//! then bonding-curve graduation, since later steps consume earlier results.
//! A missing oracle sample degrades the refresh (USD fields keep their prior
//! values) instead of failing it.

use std::sync::Arc;

use alloy::primitives::U256;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::{
    error::EngineError,
    metrics::volume::VolumeTracker,
    store::models::{OracleBook, Pool},
    utils::{mul_div, to_wad, WAD},
};

/// Emitted once when a bonding pool crosses its graduation threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraduationEvent {
    pub chain_id: u64,
    pub pool_address: String,
    pub base_token: String,
    pub block_number: u64,
    pub balance_usd: U256,
    pub threshold_usd: U256,
}

pub struct MetricAggregator {
    chain_id: u64,
    oracle_id: String,
    oracle: Arc<OracleBook>,
    volume: VolumeTracker,
    graduations: broadcast::Sender<GraduationEvent>,
}

impl MetricAggregator {
    pub fn new(
        chain_id: u64,
        oracle_id: String,
        oracle: Arc<OracleBook>,
        graduations: broadcast::Sender<GraduationEvent>,
    ) -> Self {
        Self {
            chain_id,
            oracle_id,
            oracle,
            volume: VolumeTracker::new(),
            graduations,
        }
    }

    /// Recompute a pool's derived fields as of `block`.
    ///
    /// The caller commits the returned row as one step, so readers never see
    /// a half-updated pool.
    pub fn refresh(&mut self, pool: &mut Pool, block: u64, timestamp: u64) {
        // 1. price in native quote units; stays at its prior value until the
        // first reserve/liquidity update lands
        if let Some(price) = pool.spot_price() {
            pool.price = price;
        }

        pool.volume_24h_usd = self.volume.volume_24h(&pool.address, timestamp);

        // 2-3. USD-denominated fields need an oracle sample at or before the
        // block; without one they keep their prior values
        let quote_reserve = pool.quote_reserve_wad();
        match self
            .oracle
            .convert(self.chain_id, &self.oracle_id, quote_reserve, block)
        {
            Ok(quote_usd) => {
                // symmetric valuation: both halves of the pool at the quote rate
                pool.liquidity_usd = quote_usd.saturating_mul(U256::from(2u8));

                if let Some(bonding) = &pool.bonding {
                    if let Some(cap) = self.market_cap(pool.price, bonding.total_supply, block) {
                        pool.market_cap_usd = cap;
                    }
                }
            },
            Err(EngineError::OracleDataUnavailable { .. }) => {
                debug!(
                    "chain {}: refresh of pool {} degraded, no oracle sample at block {}",
                    self.chain_id, pool.address, block
                );
                return;
            },
            Err(e) => {
                debug!(
                    "chain {}: refresh of pool {} degraded: {}",
                    self.chain_id, pool.address, e
                );
                return;
            },
        }

        // 4. bonding-curve graduation: one-way, terminal
        self.check_graduation(pool, block);
    }

    fn market_cap(&self, price: U256, total_supply: U256, block: u64) -> Option<U256> {
        if price.is_zero() || total_supply.is_zero() {
            return None;
        }
        let native = mul_div(total_supply, price, *WAD)?;
        self.oracle
            .convert(self.chain_id, &self.oracle_id, native, block)
            .ok()
    }

    fn check_graduation(&self, pool: &mut Pool, block: u64) {
        let liquidity_usd = pool.liquidity_usd;
        let Some(bonding) = pool.bonding.as_mut() else {
            return;
        };
        if bonding.graduated {
            return;
        }

        bonding.graduation_balance_usd = liquidity_usd;
        if bonding.graduation_balance_usd >= bonding.graduation_threshold_usd {
            bonding.graduated = true;
            info!(
                "chain {}: pool {} graduated at block {} (${} wad of ${} wad)",
                self.chain_id, pool.address, block, bonding.graduation_balance_usd,
                bonding.graduation_threshold_usd
            );
            let _ = self.graduations.send(GraduationEvent {
                chain_id: self.chain_id,
                pool_address: pool.address.clone(),
                base_token: pool.base_token.clone(),
                block_number: block,
                balance_usd: bonding.graduation_balance_usd,
                threshold_usd: bonding.graduation_threshold_usd,
            });
        }
    }

    /// Record a swap's trade size into the rolling volume window and accrue
    /// it onto the pool. The trade size is the quote-side amount in raw
    /// units; without an oracle sample the trade is not USD-recorded.
    pub fn on_swap(&mut self, pool: &mut Pool, quote_amount_raw: U256, block: u64, timestamp: u64) {
        let quote_wad = to_wad(quote_amount_raw, pool.quote_decimals);
        match self
            .oracle
            .convert(self.chain_id, &self.oracle_id, quote_wad, block)
        {
            Ok(usd) => {
                self.volume.record(&pool.address, block, timestamp, usd);
                pool.volume_24h_usd = self.volume.volume_24h(&pool.address, timestamp);
            },
            Err(_) => {
                debug!(
                    "chain {}: swap on {} at block {} not USD-recorded, no oracle sample",
                    self.chain_id, pool.address, block
                );
            },
        }
    }

    /// Reorg rollback for aggregator-owned state.
    pub fn rollback_to(&mut self, ancestor: u64) {
        self.volume.rollback_to(ancestor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{BondingCurve, OracleSample};
    use crate::utils::pow10;

    const WETH: &str = "0x4200000000000000000000000000000000000006";
    const TOKEN: &str = "0x1111111111111111111111111111111111111111";
    const FEED: &str = "0xfeed";

    fn oracle_with(samples: &[(u64, u64)]) -> Arc<OracleBook> {
        let book = OracleBook::new();
        for (block, rate) in samples {
            book.append(OracleSample {
                oracle_id: FEED.to_string(),
                chain_id: 1,
                block_number: *block,
                rate_usd: U256::from(*rate) * pow10(18),
                timestamp: block * 12,
            });
        }
        Arc::new(book)
    }

    fn aggregator(oracle: Arc<OracleBook>) -> (MetricAggregator, broadcast::Receiver<GraduationEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (MetricAggregator::new(1, FEED.to_string(), oracle, tx), rx)
    }

    fn synced_v2_pool() -> Pool {
        let mut pool = Pool::from_v2_pair_created(
            1,
            "0xpool".to_string(),
            TOKEN.to_string(),
            WETH.to_string(),
            WETH,
            1000,
            0,
        );
        pool.apply_v2_sync(
            U256::from(1_000_000u64) * pow10(18),
            U256::from(10u64) * pow10(18),
            1005,
            60,
        );
        pool
    }

    #[test]
    fn refresh_computes_price_and_symmetric_liquidity() {
        let (mut agg, _rx) = aggregator(oracle_with(&[(1000, 2000)]));
        let mut pool = synced_v2_pool();
        agg.refresh(&mut pool, 1005, 60);

        assert_eq!(pool.price, pow10(13)); // 10 / 1,000,000
        assert_eq!(pool.liquidity_usd, U256::from(40_000u64) * pow10(18));
    }

    #[test]
    fn oracle_gap_leaves_usd_fields_stale() {
        let (mut agg, _rx) = aggregator(oracle_with(&[]));
        let mut pool = synced_v2_pool();
        pool.market_cap_usd = U256::from(7u64);
        pool.liquidity_usd = U256::from(9u64);

        agg.refresh(&mut pool, 1005, 60);

        // price still updates; USD fields keep prior values
        assert_eq!(pool.price, pow10(13));
        assert_eq!(pool.market_cap_usd, U256::from(7u64));
        assert_eq!(pool.liquidity_usd, U256::from(9u64));
    }

    #[test]
    fn market_cap_from_total_supply() {
        let (mut agg, _rx) = aggregator(oracle_with(&[(1000, 2000)]));
        let mut pool = synced_v2_pool();
        pool.bonding = Some(BondingCurve {
            tokens_to_sell: U256::ZERO,
            total_supply: U256::from(1_000_000_000u64) * pow10(18),
            graduation_threshold_usd: U256::from(1_000_000u64) * pow10(18),
            graduation_balance_usd: U256::ZERO,
            graduated: false,
        });
        agg.refresh(&mut pool, 1005, 60);

        // 1e9 supply * 1e-5 price * $2000 = $20,000,000
        assert_eq!(pool.market_cap_usd, U256::from(20_000_000u64) * pow10(18));
    }

    #[test]
    fn graduation_is_one_way() {
        let (mut agg, mut rx) = aggregator(oracle_with(&[(1000, 2000)]));
        let mut pool = synced_v2_pool();
        pool.bonding = Some(BondingCurve {
            tokens_to_sell: U256::ZERO,
            total_supply: U256::from(1_000_000u64) * pow10(18),
            graduation_threshold_usd: U256::from(30_000u64) * pow10(18),
            graduation_balance_usd: U256::ZERO,
            graduated: false,
        });

        agg.refresh(&mut pool, 1005, 60);
        assert!(pool.bonding.as_ref().unwrap().graduated);
        assert!(rx.try_recv().is_ok());

        // draining liquidity afterwards must not revert graduation
        pool.apply_v2_sync(U256::from(1u64), U256::from(1u64), 1010, 120);
        agg.refresh(&mut pool, 1010, 120);
        assert!(pool.bonding.as_ref().unwrap().graduated);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn swap_accumulates_volume() {
        let (mut agg, _rx) = aggregator(oracle_with(&[(1000, 2000)]));
        let mut pool = synced_v2_pool();
        agg.on_swap(&mut pool, pow10(18), 1006, 70); // 1 WETH = $2000
        agg.on_swap(&mut pool, pow10(18), 1007, 80);
        assert_eq!(pool.volume_24h_usd, U256::from(4000u64) * pow10(18));
    }
}
