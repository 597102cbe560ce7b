//! Engine error taxonomy.
//!
//! Each variant maps to a distinct failure policy:
//! - [`EngineError::TransientRpc`] is retried with backoff and never advances the cursor
//! - [`EngineError::DecodeAnomaly`] skips the offending log, the cursor advances
//! - [`EngineError::OracleDataUnavailable`] leaves USD-denominated fields stale
//! - [`EngineError::ReorgDepthExceeded`] halts the affected chain
//! - [`EngineError::InvalidFactoryRegistration`] is fatal at startup

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Network or timeout failure talking to the RPC collaborator.
    #[error("transient rpc error: {0}")]
    TransientRpc(String),

    /// A log matched a known signature but its payload did not decode.
    #[error("decode anomaly at block {block} log {log_index}: {reason}")]
    DecodeAnomaly {
        block: u64,
        log_index: u32,
        reason: String,
    },

    /// No oracle sample exists at or before the requested block.
    /// Callers treat this as "USD value temporarily unknown", not a hard failure.
    #[error("no sample for oracle {oracle_id} on chain {chain_id} at or before block {block}")]
    OracleDataUnavailable {
        chain_id: u64,
        oracle_id: String,
        block: u64,
    },

    /// The backward walk during reorg recovery ran past the configured bound.
    /// Deep reorgs are not silently reconciled; the chain halts for operator review.
    #[error("reorg on chain {chain_id} deeper than {max_depth} blocks (walked back to {floor})")]
    ReorgDepthExceeded {
        chain_id: u64,
        max_depth: u64,
        floor: u64,
    },

    /// A factory registration was malformed or conflicted with an existing one.
    #[error("invalid factory registration on chain {chain_id}: {reason}")]
    InvalidFactoryRegistration { chain_id: u64, reason: String },
}

impl EngineError {
    /// Whether the error is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::TransientRpc(_))
    }
}
