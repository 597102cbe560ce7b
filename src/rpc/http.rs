//! JSON-RPC production adapter for [`RpcClient`].

use alloy::{
    eips::BlockId,
    primitives::{Address, Bytes},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{Filter, TransactionRequest},
};
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use url::Url;

use crate::{
    config::ChainConfig,
    error::EngineError,
    rpc::{BlockHeader, LogEntry, RpcClient},
    utils::hex_encode,
};

/// HTTP JSON-RPC client, one provider per configured chain.
pub struct HttpRpc {
    providers: FxHashMap<u64, DynProvider>,
}

impl HttpRpc {
    pub fn new(chains: &[ChainConfig]) -> anyhow::Result<Self> {
        let mut providers = FxHashMap::default();
        for chain in chains {
            let url: Url = chain
                .rpc_url
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid rpc url for chain {}: {}", chain.name, e))?;
            let provider = DynProvider::new(ProviderBuilder::new().connect_http(url));
            providers.insert(chain.chain_id, provider);
        }
        Ok(Self { providers })
    }

    fn provider(&self, chain_id: u64) -> Result<&DynProvider, EngineError> {
        self.providers
            .get(&chain_id)
            .ok_or_else(|| EngineError::TransientRpc(format!("no provider for chain {chain_id}")))
    }
}

fn transient(e: impl std::fmt::Display) -> EngineError {
    EngineError::TransientRpc(e.to_string())
}

#[async_trait]
impl RpcClient for HttpRpc {
    async fn latest_block(&self, chain_id: u64) -> Result<u64, EngineError> {
        self.provider(chain_id)?
            .get_block_number()
            .await
            .map_err(transient)
    }

    async fn get_block_header(
        &self,
        chain_id: u64,
        number: u64,
    ) -> Result<BlockHeader, EngineError> {
        let block = self
            .provider(chain_id)?
            .get_block_by_number(number.into())
            .await
            .map_err(transient)?
            .ok_or_else(|| {
                EngineError::TransientRpc(format!("block {number} not found on chain {chain_id}"))
            })?;

        Ok(BlockHeader {
            number,
            hash: block.header.hash,
            parent_hash: block.header.parent_hash,
            timestamp: block.header.timestamp,
        })
    }

    async fn get_logs(
        &self,
        chain_id: u64,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<LogEntry>, EngineError> {
        let parsed: Vec<Address> = addresses
            .iter()
            .filter_map(|a| a.parse().ok())
            .collect();

        let filter = Filter::new()
            .from_block(from_block)
            .to_block(to_block)
            .address(parsed);

        let raw = self
            .provider(chain_id)?
            .get_logs(&filter)
            .await
            .map_err(transient)?;

        let mut logs: Vec<LogEntry> = raw
            .into_iter()
            .filter_map(|l| {
                Some(LogEntry {
                    address: hex_encode(l.address().as_slice()),
                    topics: l.topics().to_vec(),
                    data: l.data().data.clone(),
                    block_number: l.block_number?,
                    log_index: l.log_index? as u32,
                    tx_hash: l
                        .transaction_hash
                        .map(|h| hex_encode(h.as_slice()))
                        .unwrap_or_default(),
                })
            })
            .collect();

        // Providers are expected to return ordered logs; enforce it anyway
        // since application order is a correctness requirement downstream.
        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }

    async fn call_contract(
        &self,
        chain_id: u64,
        address: &str,
        calldata: Bytes,
        at_block: u64,
    ) -> Result<Bytes, EngineError> {
        let to: Address = address
            .parse()
            .map_err(|_| EngineError::TransientRpc(format!("invalid call target {address}")))?;

        let tx = TransactionRequest::default().to(to).input(calldata.into());

        self.provider(chain_id)?
            .call(tx)
            .block(BlockId::number(at_block))
            .await
            .map_err(transient)
    }
}
