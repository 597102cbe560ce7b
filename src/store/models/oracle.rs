//! Oracle sample book and USD conversion.
//!
//! [`OracleBook`] is the append-only store of oracle samples and the price
//! converter built on it. Samples are ordered by block number per
//! `(chain, oracle)` series; a conversion at block B uses the latest sample
//! with block <= B. All math is truncating fixed-point, never rounded up.

use std::sync::RwLock;

use alloy::primitives::U256;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::EngineError,
    utils::{mul_div, WAD},
};

/// One oracle observation: the USD rate (wad) of the quote asset at a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSample {
    pub oracle_id: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub rate_usd: U256,
    pub timestamp: u64,
}

/// Append-only oracle sample store shared across chain tasks.
///
/// Writers are the per-chain oracle sampling jobs; readers are any chain's
/// metric aggregator.
#[derive(Default)]
pub struct OracleBook {
    series: RwLock<FxHashMap<(u64, String), Vec<OracleSample>>>,
}

impl OracleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. Out-of-order blocks within a series are rejected
    /// silently (the caller re-runs jobs over overlapping ranges).
    pub fn append(&self, sample: OracleSample) {
        let mut series = self.series.write().unwrap_or_else(|e| e.into_inner());
        let samples = series
            .entry((sample.chain_id, sample.oracle_id.clone()))
            .or_default();
        if samples
            .last()
            .is_some_and(|last| last.block_number >= sample.block_number)
        {
            return;
        }
        samples.push(sample);
    }

    /// Latest rate at or before `at_block`, if any sample exists.
    pub fn rate_at(&self, chain_id: u64, oracle_id: &str, at_block: u64) -> Option<U256> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        let samples = series.get(&(chain_id, oracle_id.to_string()))?;
        let idx = samples.partition_point(|s| s.block_number <= at_block);
        if idx == 0 {
            None
        } else {
            Some(samples[idx - 1].rate_usd)
        }
    }

    /// Most recent sample in a series, for serving-layer reads.
    pub fn latest(&self, chain_id: u64, oracle_id: &str) -> Option<OracleSample> {
        let series = self.series.read().unwrap_or_else(|e| e.into_inner());
        series
            .get(&(chain_id, oracle_id.to_string()))
            .and_then(|s| s.last().cloned())
    }

    /// Convert a wad-scaled native amount to a wad USD amount using the
    /// latest sample at or before `at_block`. Truncates, never rounds up.
    pub fn convert(
        &self,
        chain_id: u64,
        oracle_id: &str,
        amount_native: U256,
        at_block: u64,
    ) -> Result<U256, EngineError> {
        let rate = self.rate_at(chain_id, oracle_id, at_block).ok_or_else(|| {
            EngineError::OracleDataUnavailable {
                chain_id,
                oracle_id: oracle_id.to_string(),
                block: at_block,
            }
        })?;
        mul_div(amount_native, rate, *WAD).ok_or_else(|| EngineError::OracleDataUnavailable {
            chain_id,
            oracle_id: oracle_id.to_string(),
            block: at_block,
        })
    }

    /// Discard samples derived from blocks past the reorg ancestor.
    pub fn rollback_to(&self, chain_id: u64, ancestor: u64) {
        let mut series = self.series.write().unwrap_or_else(|e| e.into_inner());
        for ((chain, _), samples) in series.iter_mut() {
            if *chain == chain_id {
                samples.retain(|s| s.block_number <= ancestor);
            }
        }
    }
}
