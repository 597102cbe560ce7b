//! Factory-pattern address discovery.
//!
//! The resolver owns the registry of factory contracts per chain. Each
//! registration binds a contract address to one creation signature; a log
//! only counts as a discovery when both the emitting address and topic0
//! match a registration. Everything else on those contracts is ignored.

use alloy::{primitives::U256, sol_types::SolEvent};
use log::warn;
use rustc_hash::FxHashMap;

use crate::{
    abis::{AirlockCreate, AirlockMigrate, PairCreated, PoolCreated, V4Initialize},
    config::ChainConfig,
    error::EngineError,
    rpc::LogEntry,
    utils::{compute_v4_pool_id, hex_encode, ZERO_ADDRESS},
};

/// What a creation log resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Discovery {
    V2Pair {
        pair: String,
        token0: String,
        token1: String,
    },
    V3Pool {
        pool: String,
        token0: String,
        token1: String,
        fee: u32,
        tick_spacing: i32,
    },
    V4Pool {
        pool_id: String,
        currency0: String,
        currency1: String,
        fee: u32,
        tick_spacing: i32,
        hooks: String,
        sqrt_price_x96: U256,
        tick: i32,
    },
    AirlockCreate {
        asset: String,
        numeraire: String,
        pool_or_hook: String,
    },
    AirlockMigrate {
        asset: String,
        pool: String,
    },
}

impl Discovery {
    /// Token addresses the discovered pool trades, when it introduces any.
    pub fn token_addresses(&self) -> [Option<&str>; 2] {
        match self {
            Discovery::V2Pair { token0, token1, .. }
            | Discovery::V3Pool { token0, token1, .. } => {
                [Some(token0.as_str()), Some(token1.as_str())]
            },
            Discovery::V4Pool {
                currency0,
                currency1,
                ..
            } => [Some(currency0.as_str()), Some(currency1.as_str())],
            Discovery::AirlockCreate { .. } | Discovery::AirlockMigrate { .. } => [None, None],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactoryKind {
    V2Factory,
    V3Factory,
    V4PoolManager,
    AirlockCreate,
    AirlockMigrate,
}

/// Per-chain factory registry. Built once from config at startup.
pub struct AddressResolver {
    chain_id: u64,
    registrations: FxHashMap<(String, alloy::primitives::B256), FactoryKind>,
}

impl AddressResolver {
    pub fn for_chain(chain: &ChainConfig) -> Result<Self, EngineError> {
        let mut resolver = Self {
            chain_id: chain.chain_id,
            registrations: FxHashMap::default(),
        };

        if let Some(factory) = &chain.addresses.v2_factory {
            resolver.register(factory, PairCreated::SIGNATURE_HASH, FactoryKind::V2Factory)?;
        }
        if let Some(factory) = &chain.addresses.v3_factory {
            resolver.register(factory, PoolCreated::SIGNATURE_HASH, FactoryKind::V3Factory)?;
        }
        if let Some(manager) = &chain.addresses.v4_pool_manager {
            resolver.register(
                manager,
                V4Initialize::SIGNATURE_HASH,
                FactoryKind::V4PoolManager,
            )?;
        }
        let airlock = &chain.addresses.shared.airlock;
        resolver.register(airlock, AirlockCreate::SIGNATURE_HASH, FactoryKind::AirlockCreate)?;
        resolver.register(
            airlock,
            AirlockMigrate::SIGNATURE_HASH,
            FactoryKind::AirlockMigrate,
        )?;

        Ok(resolver)
    }

    fn register(
        &mut self,
        address: &str,
        signature: alloy::primitives::B256,
        kind: FactoryKind,
    ) -> Result<(), EngineError> {
        let address = address.to_lowercase();
        if address.is_empty() || address == ZERO_ADDRESS {
            return Err(EngineError::InvalidFactoryRegistration {
                chain_id: self.chain_id,
                reason: format!("{kind:?} registered with an empty or zero address"),
            });
        }
        if self
            .registrations
            .insert((address.clone(), signature), kind)
            .is_some()
        {
            return Err(EngineError::InvalidFactoryRegistration {
                chain_id: self.chain_id,
                reason: format!("duplicate registration for {address} / {signature}"),
            });
        }
        Ok(())
    }

    /// Contract addresses the log filter must always include.
    pub fn factory_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self
            .registrations
            .keys()
            .map(|(address, _)| address.clone())
            .collect();
        addresses.sort();
        addresses.dedup();
        addresses
    }

    /// Resolve a log against the registry. `Ok(None)` means the log is not a
    /// creation event; a matching signature with an undecodable payload is a
    /// decode anomaly.
    pub fn on_log(&self, log: &LogEntry) -> Result<Option<Discovery>, EngineError> {
        let Some(topic0) = log.topic0() else {
            return Ok(None);
        };
        let Some(kind) = self.registrations.get(&(log.address.clone(), *topic0)) else {
            return Ok(None);
        };

        let data = log.log_data();
        let anomaly = |reason: String| EngineError::DecodeAnomaly {
            block: log.block_number,
            log_index: log.log_index,
            reason,
        };

        let discovery = match kind {
            FactoryKind::V2Factory => {
                let event = PairCreated::decode_log_data(&data).map_err(|e| anomaly(e.to_string()))?;
                let pair = hex_encode(event.pair.as_slice());
                if pair == ZERO_ADDRESS {
                    warn!(
                        "chain {}: PairCreated with zero pair address at block {}, skipping",
                        self.chain_id, log.block_number
                    );
                    return Ok(None);
                }
                Discovery::V2Pair {
                    pair,
                    token0: hex_encode(event.token0.as_slice()),
                    token1: hex_encode(event.token1.as_slice()),
                }
            },
            FactoryKind::V3Factory => {
                let event = PoolCreated::decode_log_data(&data).map_err(|e| anomaly(e.to_string()))?;
                let pool = hex_encode(event.pool.as_slice());
                if pool == ZERO_ADDRESS {
                    warn!(
                        "chain {}: PoolCreated with zero pool address at block {}, skipping",
                        self.chain_id, log.block_number
                    );
                    return Ok(None);
                }
                Discovery::V3Pool {
                    pool,
                    token0: hex_encode(event.token0.as_slice()),
                    token1: hex_encode(event.token1.as_slice()),
                    fee: event.fee.to::<u32>(),
                    tick_spacing: event.tickSpacing.as_i32(),
                }
            },
            FactoryKind::V4PoolManager => {
                let event =
                    V4Initialize::decode_log_data(&data).map_err(|e| anomaly(e.to_string()))?;
                let pool_id = hex_encode(event.id.as_slice());
                let currency0 = hex_encode(event.currency0.as_slice());
                let currency1 = hex_encode(event.currency1.as_slice());
                let hooks = hex_encode(event.hooks.as_slice());
                let fee = event.fee.to::<u32>();
                let tick_spacing = event.tickSpacing.as_i32();

                // Reject spoofed ids: the id must hash from the event's own
                // parameters.
                let computed = compute_v4_pool_id(&currency0, &currency1, fee, tick_spacing, &hooks);
                if pool_id != computed {
                    warn!(
                        "chain {}: V4 Initialize pool id mismatch at block {}: event {}, computed {}",
                        self.chain_id, log.block_number, pool_id, computed
                    );
                    return Ok(None);
                }

                Discovery::V4Pool {
                    pool_id,
                    currency0,
                    currency1,
                    fee,
                    tick_spacing,
                    hooks,
                    sqrt_price_x96: U256::from(event.sqrtPriceX96),
                    tick: event.tick.as_i32(),
                }
            },
            FactoryKind::AirlockCreate => {
                let event =
                    AirlockCreate::decode_log_data(&data).map_err(|e| anomaly(e.to_string()))?;
                Discovery::AirlockCreate {
                    asset: hex_encode(event.asset.as_slice()),
                    numeraire: hex_encode(event.numeraire.as_slice()),
                    pool_or_hook: hex_encode(event.poolOrHook.as_slice()),
                }
            },
            FactoryKind::AirlockMigrate => {
                let event =
                    AirlockMigrate::decode_log_data(&data).map_err(|e| anomaly(e.to_string()))?;
                Discovery::AirlockMigrate {
                    asset: hex_encode(event.asset.as_slice()),
                    pool: hex_encode(event.pool.as_slice()),
                }
            },
        };

        Ok(Some(discovery))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChainAddresses, OracleFeedSettings, SharedAddresses};
    use alloy::primitives::{Address, Bytes};

    fn chain() -> ChainConfig {
        ChainConfig {
            chain_id: 84532,
            name: "base-sepolia".to_string(),
            enabled: true,
            rpc_url: "http://localhost:8545".to_string(),
            v2_start_block: Some(100),
            v3_start_block: None,
            v4_start_block: None,
            oracle_start_block: 100,
            addresses: ChainAddresses {
                shared: SharedAddresses {
                    airlock: "0x000000000000000000000000000000000000a111".to_string(),
                    token_factory: "0x000000000000000000000000000000000000a112".to_string(),
                    universal_router: "0x000000000000000000000000000000000000a113".to_string(),
                    governance_factory: "0x000000000000000000000000000000000000a114".to_string(),
                    migrator: "0x000000000000000000000000000000000000a115".to_string(),
                    wrapped_native: "0x4200000000000000000000000000000000000006".to_string(),
                },
                v2_factory: Some("0x000000000000000000000000000000000000f222".to_string()),
                v3_factory: None,
                v4_pool_manager: None,
            },
            oracle: OracleFeedSettings {
                feed: "0x000000000000000000000000000000000000feed".to_string(),
                decimals: 8,
                sample_interval: 50,
            },
            graduation_threshold_usd: 69_000,
        }
    }

    fn pair_created_log(factory: &str) -> LogEntry {
        let event = PairCreated {
            token0: Address::repeat_byte(0x11),
            token1: Address::repeat_byte(0x22),
            pair: Address::repeat_byte(0x33),
            _3: U256::from(1u8),
        };
        let data = event.encode_log_data();
        LogEntry {
            address: factory.to_string(),
            topics: data.topics().to_vec(),
            data: data.data,
            block_number: 150,
            log_index: 0,
            tx_hash: "0xabc".to_string(),
        }
    }

    #[test]
    fn resolves_pair_created_from_registered_factory() {
        let resolver = AddressResolver::for_chain(&chain()).unwrap();
        let log = pair_created_log("0x000000000000000000000000000000000000f222");
        let discovery = resolver.on_log(&log).unwrap().unwrap();
        assert!(matches!(discovery, Discovery::V2Pair { .. }));
    }

    #[test]
    fn ignores_pair_created_from_unregistered_address() {
        let resolver = AddressResolver::for_chain(&chain()).unwrap();
        let log = pair_created_log("0x000000000000000000000000000000000000dead");
        assert_eq!(resolver.on_log(&log).unwrap(), None);
    }

    #[test]
    fn matching_signature_with_bad_payload_is_an_anomaly() {
        let resolver = AddressResolver::for_chain(&chain()).unwrap();
        let mut log = pair_created_log("0x000000000000000000000000000000000000f222");
        log.data = Bytes::from(vec![0u8; 3]);
        assert!(matches!(
            resolver.on_log(&log),
            Err(EngineError::DecodeAnomaly { .. })
        ));
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut resolver = AddressResolver::for_chain(&chain()).unwrap();
        let err = resolver
            .register(
                "0x000000000000000000000000000000000000f222",
                PairCreated::SIGNATURE_HASH,
                FactoryKind::V2Factory,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidFactoryRegistration { .. }
        ));
    }
}
