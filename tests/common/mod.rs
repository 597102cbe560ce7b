//! Shared test harness: an in-memory forked-chain RPC mock plus config
//! builders used by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use alloy::primitives::{keccak256, Address, Bytes, I256, LogData, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;

use launchdex::{
    config::{ChainAddresses, ChainConfig, EngineSettings, OracleFeedSettings, SharedAddresses},
    error::EngineError,
    rpc::{BlockHeader, LogEntry, RpcClient},
};

pub const CHAIN_ID: u64 = 84532;
pub const WETH: &str = "0x4200000000000000000000000000000000000006";
pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const PAIR: &str = "0x3333333333333333333333333333333333333333";
pub const MIGRATED_POOL: &str = "0x4444444444444444444444444444444444444444";
pub const V2_FACTORY: &str = "0x00000000000000000000000000000000000f2222";
pub const AIRLOCK: &str = "0x000000000000000000000000000000000000a111";
pub const FEED: &str = "0x000000000000000000000000000000000000feed";

pub fn addr(s: &str) -> Address {
    s.parse().expect("valid test address")
}

#[derive(Clone)]
pub struct MockBlock {
    pub header: BlockHeader,
    pub logs: Vec<LogEntry>,
}

#[derive(Default)]
struct ChainState {
    blocks: BTreeMap<u64, MockBlock>,
    calls: HashMap<(String, [u8; 4]), Bytes>,
}

/// In-memory RPC backend with explicit fork control.
///
/// Block hashes derive from `(chain, number, tag)`; rewriting a block range
/// with a different tag simulates a reorg while keeping the fork point's
/// hash stable.
#[derive(Clone, Default)]
pub struct MockRpc {
    chains: Arc<RwLock<HashMap<u64, ChainState>>>,
}

fn mock_hash(chain_id: u64, number: u64, tag: u8) -> B256 {
    let mut input = Vec::with_capacity(17);
    input.extend_from_slice(&chain_id.to_be_bytes());
    input.extend_from_slice(&number.to_be_bytes());
    input.push(tag);
    keccak256(&input)
}

impl MockRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block. The parent hash comes from whatever block currently
    /// sits at `number - 1`, so forks chain correctly off the ancestor.
    pub fn add_block(&self, chain_id: u64, number: u64, tag: u8, timestamp: u64) {
        let mut chains = self.chains.write().unwrap();
        let state = chains.entry(chain_id).or_default();
        let parent_hash = number
            .checked_sub(1)
            .and_then(|n| state.blocks.get(&n))
            .map(|b| b.header.hash)
            .unwrap_or(B256::ZERO);
        state.blocks.insert(
            number,
            MockBlock {
                header: BlockHeader {
                    number,
                    hash: mock_hash(chain_id, number, tag),
                    parent_hash,
                    timestamp,
                },
                logs: Vec::new(),
            },
        );
    }

    /// Drop every block at or above `number`, simulating the old branch
    /// being orphaned.
    pub fn truncate_from(&self, chain_id: u64, number: u64) {
        let mut chains = self.chains.write().unwrap();
        if let Some(state) = chains.get_mut(&chain_id) {
            state.blocks.retain(|n, _| *n < number);
        }
    }

    pub fn add_log(&self, chain_id: u64, number: u64, address: &str, data: LogData) {
        let mut chains = self.chains.write().unwrap();
        let state = chains.entry(chain_id).or_default();
        let Some(block) = state.blocks.get_mut(&number) else {
            panic!("add_log: block {number} does not exist");
        };
        let log_index = block.logs.len() as u32;
        block.logs.push(LogEntry {
            address: address.to_lowercase(),
            topics: data.topics().to_vec(),
            data: data.data,
            block_number: number,
            log_index,
            tx_hash: format!("0x{:064x}", number * 1000 + log_index as u64),
        });
    }

    /// Program a contract read, keyed by target address and selector.
    pub fn set_call(&self, chain_id: u64, to: &str, selector: [u8; 4], ret: Bytes) {
        let mut chains = self.chains.write().unwrap();
        let state = chains.entry(chain_id).or_default();
        state.calls.insert((to.to_lowercase(), selector), ret);
    }
}

#[async_trait]
impl RpcClient for MockRpc {
    async fn latest_block(&self, chain_id: u64) -> Result<u64, EngineError> {
        let chains = self.chains.read().unwrap();
        chains
            .get(&chain_id)
            .and_then(|s| s.blocks.keys().next_back().copied())
            .ok_or_else(|| EngineError::TransientRpc(format!("no blocks for chain {chain_id}")))
    }

    async fn get_block_header(
        &self,
        chain_id: u64,
        number: u64,
    ) -> Result<BlockHeader, EngineError> {
        let chains = self.chains.read().unwrap();
        chains
            .get(&chain_id)
            .and_then(|s| s.blocks.get(&number))
            .map(|b| b.header)
            .ok_or_else(|| {
                EngineError::TransientRpc(format!("block {number} not found on chain {chain_id}"))
            })
    }

    async fn get_logs(
        &self,
        chain_id: u64,
        from_block: u64,
        to_block: u64,
        addresses: &[String],
    ) -> Result<Vec<LogEntry>, EngineError> {
        let wanted: Vec<String> = addresses.iter().map(|a| a.to_lowercase()).collect();
        let chains = self.chains.read().unwrap();
        let Some(state) = chains.get(&chain_id) else {
            return Ok(Vec::new());
        };
        let mut logs: Vec<LogEntry> = state
            .blocks
            .range(from_block..=to_block)
            .flat_map(|(_, b)| b.logs.iter())
            .filter(|l| wanted.contains(&l.address))
            .cloned()
            .collect();
        logs.sort_by_key(|l| (l.block_number, l.log_index));
        Ok(logs)
    }

    async fn call_contract(
        &self,
        chain_id: u64,
        address: &str,
        calldata: Bytes,
        _at_block: u64,
    ) -> Result<Bytes, EngineError> {
        let mut selector = [0u8; 4];
        if calldata.len() >= 4 {
            selector.copy_from_slice(&calldata[..4]);
        }
        let chains = self.chains.read().unwrap();
        chains
            .get(&chain_id)
            .and_then(|s| s.calls.get(&(address.to_lowercase(), selector)))
            .cloned()
            .ok_or_else(|| {
                EngineError::TransientRpc(format!("no call programmed for {address}"))
            })
    }
}

/// ERC-20 `decimals()` return.
pub fn encode_decimals(decimals: u8) -> Bytes {
    Bytes::from(U256::from(decimals).abi_encode())
}

/// Chainlink-style `latestRoundData` return with the given 8-decimal answer.
pub fn encode_round_data(answer_8dp: i128) -> Bytes {
    let ret = (
        U256::from(1u8),
        I256::try_from(answer_8dp).expect("answer fits"),
        U256::ZERO,
        U256::ZERO,
        U256::from(1u8),
    );
    Bytes::from(ret.abi_encode())
}

/// Airlock `getAssetData` return pointing the asset at `pool`.
pub fn encode_asset_data(pool: &str, num_tokens_to_sell: U256, total_supply: U256) -> Bytes {
    let ret = (
        addr(WETH),
        Address::ZERO,
        Address::ZERO,
        Address::ZERO,
        Address::ZERO,
        addr(pool),
        Address::ZERO,
        num_tokens_to_sell,
        total_supply,
        Address::ZERO,
    );
    Bytes::from(ret.abi_encode())
}

pub fn test_chain() -> ChainConfig {
    ChainConfig {
        chain_id: CHAIN_ID,
        name: "base-sepolia".to_string(),
        enabled: true,
        rpc_url: "http://localhost:8545".to_string(),
        v2_start_block: Some(100),
        v3_start_block: None,
        v4_start_block: None,
        oracle_start_block: 100,
        addresses: ChainAddresses {
            shared: SharedAddresses {
                airlock: AIRLOCK.to_string(),
                token_factory: "0x000000000000000000000000000000000000a112".to_string(),
                universal_router: "0x000000000000000000000000000000000000a113".to_string(),
                governance_factory: "0x000000000000000000000000000000000000a114".to_string(),
                migrator: "0x000000000000000000000000000000000000a115".to_string(),
                wrapped_native: WETH.to_string(),
            },
            v2_factory: Some(V2_FACTORY.to_string()),
            v3_factory: None,
            v4_pool_manager: None,
        },
        oracle: OracleFeedSettings {
            feed: FEED.to_string(),
            decimals: 8,
            sample_interval: 1,
        },
        graduation_threshold_usd: 69_000,
    }
}

pub fn test_settings() -> EngineSettings {
    EngineSettings {
        batch_size: 2_000,
        trailing_distance: 0,
        max_reorg_depth: 64,
        rpc_retry_limit: 0,
        rpc_retry_base_ms: 1,
        halt_after_failures: 3,
        poll_interval_ms: 10,
        metric_refresh_interval: 1,
        market_cap_refresh_interval: 1,
    }
}
