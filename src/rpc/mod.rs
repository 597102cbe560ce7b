//! RPC collaborator boundary.
//!
//! The engine consumes chain data exclusively through [`RpcClient`]; the
//! production adapter in [`http`] speaks JSON-RPC, and integration tests
//! substitute an in-memory forked-chain mock. Transport failures surface as
//! [`EngineError::TransientRpc`] and are retried with exponential backoff.

pub mod http;

use std::future::Future;
use std::time::Duration;

use alloy::primitives::{Bytes, B256};
use async_trait::async_trait;
use log::warn;

use crate::error::EngineError;

pub use http::HttpRpc;

/// A single event log, addresses already lowercased.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_number: u64,
    pub log_index: u32,
    pub tx_hash: String,
}

impl LogEntry {
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }

    pub fn log_data(&self) -> alloy::primitives::LogData {
        alloy::primitives::LogData::new_unchecked(self.topics.clone(), self.data.clone())
    }
}

/// Block header fields needed for ordering and reorg detection.
#[derive(Debug, Clone, Copy)]
pub struct BlockHeader {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
}

/// The RPC transport consumed by the ingestion pipeline and scheduler jobs.
///
/// `get_logs` must return logs ordered by `(block number, log index)`.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn latest_block(&self, chain_id: u64) -> Result<u64, EngineError>;

    async fn get_block_header(&self, chain_id: u64, number: u64)
        -> Result<BlockHeader, EngineError>;

    async fn get_logs(
        &self,
        chain_id: u64,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<LogEntry>, EngineError>;

    async fn call_contract(
        &self,
        chain_id: u64,
        address: &str,
        calldata: Bytes,
        at_block: u64,
    ) -> Result<Bytes, EngineError>;
}

/// Retry a transient-fallible operation with exponential backoff.
///
/// Only [`EngineError::TransientRpc`] is retried; every other error class
/// propagates immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    what: &str,
    retries: u32,
    base_delay: Duration,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < retries => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    what,
                    attempt + 1,
                    retries,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("test", 3, Duration::from_millis(1), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(EngineError::TransientRpc("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff("test", 5, Duration::from_millis(1), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(EngineError::DecodeAnomaly {
                    block: 1,
                    log_index: 0,
                    reason: "bad".into(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_last_error() {
        let result: Result<(), _> = retry_with_backoff("test", 2, Duration::from_millis(1), || {
            async { Err(EngineError::TransientRpc("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(EngineError::TransientRpc(_))));
    }
}
