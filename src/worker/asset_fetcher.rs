//! Launch-parameter reads from the airlock contract.
//!
//! `getAssetData` is immutable per asset once launched, so results are
//! cached; the read itself is pinned to the discovery block.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use moka::future::Cache;

use crate::{
    abis::getAssetDataCall,
    config::EngineSettings,
    error::EngineError,
    rpc::{retry_with_backoff, RpcClient},
    store::models::AssetData,
    utils::hex_encode,
};

const ASSET_CACHE_CAPACITY: u64 = 10_000;

pub struct AssetFetcher {
    chain_id: u64,
    airlock: String,
    rpc: Arc<dyn RpcClient>,
    retry_limit: u32,
    retry_base: Duration,
    cache: Cache<String, Arc<AssetData>>,
}

impl AssetFetcher {
    pub fn new(
        chain_id: u64,
        airlock: String,
        rpc: Arc<dyn RpcClient>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            chain_id,
            airlock,
            rpc,
            retry_limit: settings.rpc_retry_limit,
            retry_base: Duration::from_millis(settings.rpc_retry_base_ms),
            cache: Cache::builder().max_capacity(ASSET_CACHE_CAPACITY).build(),
        }
    }

    /// Fetch an asset's launch parameters, served from cache after the
    /// first read.
    pub async fn get(&self, asset: &str, at_block: u64) -> Result<Arc<AssetData>, EngineError> {
        if let Some(hit) = self.cache.get(asset).await {
            return Ok(hit);
        }

        let address: Address = asset.parse().map_err(|_| EngineError::DecodeAnomaly {
            block: at_block,
            log_index: 0,
            reason: format!("airlock Create carried unparseable asset address {asset}"),
        })?;
        let calldata = Bytes::from(getAssetDataCall { asset: address }.abi_encode());

        let rpc = self.rpc.as_ref();
        let chain_id = self.chain_id;
        let airlock = self.airlock.as_str();
        let raw = retry_with_backoff("airlock getAssetData", self.retry_limit, self.retry_base, || {
            let calldata = calldata.clone();
            async move { rpc.call_contract(chain_id, airlock, calldata, at_block).await }
        })
        .await?;

        let ret = getAssetDataCall::abi_decode_returns(&raw).map_err(|e| {
            EngineError::DecodeAnomaly {
                block: at_block,
                log_index: 0,
                reason: format!("airlock getAssetData for {asset} returned undecodable data: {e}"),
            }
        })?;

        let data = Arc::new(AssetData {
            numeraire: hex_encode(ret.numeraire.as_slice()),
            timelock: hex_encode(ret.timelock.as_slice()),
            governance: hex_encode(ret.governance.as_slice()),
            liquidity_migrator: hex_encode(ret.liquidityMigrator.as_slice()),
            pool_initializer: hex_encode(ret.poolInitializer.as_slice()),
            pool: hex_encode(ret.pool.as_slice()),
            migration_pool: hex_encode(ret.migrationPool.as_slice()),
            num_tokens_to_sell: ret.numTokensToSell,
            total_supply: ret.totalSupply,
            integrator: hex_encode(ret.integrator.as_slice()),
        });
        self.cache.insert(asset.to_string(), data.clone()).await;
        Ok(data)
    }
}
