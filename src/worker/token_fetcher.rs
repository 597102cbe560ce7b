//! ERC-20 metadata reads for discovered pool tokens.
//!
//! Decimals are immutable per token, so successful reads are cached for the
//! process lifetime. Tokens that do not answer `decimals()` are treated as
//! 18-decimal; discovery never stalls on metadata.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use log::warn;
use moka::future::Cache;

use crate::{
    abis::decimalsCall,
    config::EngineSettings,
    rpc::{retry_with_backoff, RpcClient},
};

const TOKEN_CACHE_CAPACITY: u64 = 100_000;
const DEFAULT_DECIMALS: u8 = 18;

pub struct TokenFetcher {
    chain_id: u64,
    rpc: Arc<dyn RpcClient>,
    retry_limit: u32,
    retry_base: Duration,
    cache: Cache<String, u8>,
}

impl TokenFetcher {
    pub fn new(chain_id: u64, rpc: Arc<dyn RpcClient>, settings: &EngineSettings) -> Self {
        Self {
            chain_id,
            rpc,
            retry_limit: settings.rpc_retry_limit,
            retry_base: Duration::from_millis(settings.rpc_retry_base_ms),
            cache: Cache::builder().max_capacity(TOKEN_CACHE_CAPACITY).build(),
        }
    }

    /// Decimals of a token, pinned to the discovery block and served from
    /// cache after the first successful read.
    pub async fn decimals(&self, token: &str, at_block: u64) -> u8 {
        if let Some(hit) = self.cache.get(token).await {
            return hit;
        }

        if token.parse::<Address>().is_err() {
            warn!(
                "chain {}: unparseable token address {token}, assuming {DEFAULT_DECIMALS} decimals",
                self.chain_id
            );
            return DEFAULT_DECIMALS;
        }
        let calldata = Bytes::from(decimalsCall {}.abi_encode());

        let rpc = self.rpc.as_ref();
        let chain_id = self.chain_id;
        let raw = retry_with_backoff("erc20 decimals", self.retry_limit, self.retry_base, || {
            let calldata = calldata.clone();
            async move { rpc.call_contract(chain_id, token, calldata, at_block).await }
        })
        .await;

        let decimals = raw
            .map_err(|e| e.to_string())
            .and_then(|bytes| decimalsCall::abi_decode_returns(&bytes).map_err(|e| e.to_string()));
        match decimals {
            Ok(decimals) => {
                self.cache.insert(token.to_string(), decimals).await;
                decimals
            },
            Err(reason) => {
                warn!(
                    "chain {}: decimals() for {token} unavailable, assuming {DEFAULT_DECIMALS}: {reason}",
                    self.chain_id
                );
                DEFAULT_DECIMALS
            },
        }
    }
}
