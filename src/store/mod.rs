//! Pool state store: canonical chain-scoped tables for pools and watched
//! addresses, with a copy-on-write undo journal for reorg rollback.
//!
//! Single-writer discipline: only the owning chain's ingestion task mutates a
//! store. Readers (the serving layer, tests) share it behind an async RwLock.
//!
//! Every mutation inside a block records the prior row once in the journal,
//! so `rollback_to(ancestor)` restores the exact pre-block state; the
//! pipeline then re-derives forward through the normal path.

pub mod models;

use std::collections::BTreeMap;

use alloy::primitives::B256;
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use models::{Pool, ProtocolVersion, WatchedAddress};

enum JournalOp {
    Pool {
        address: String,
        prior: Option<Box<Pool>>,
    },
    Watched {
        address: String,
        prior: Option<WatchedAddress>,
    },
}

struct JournalEntry {
    block: u64,
    op: JournalOp,
}

/// In-memory table set for one chain.
pub struct ChainStore {
    chain_id: u64,
    pools: FxHashMap<String, Pool>,
    watched: FxHashMap<String, WatchedAddress>,
    block_hashes: BTreeMap<u64, B256>,
    journal: Vec<JournalEntry>,
    current_block: u64,
}

impl ChainStore {
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            pools: FxHashMap::default(),
            watched: FxHashMap::default(),
            block_hashes: BTreeMap::new(),
            journal: Vec::new(),
            current_block: 0,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Mark the block whose mutations the journal should attribute.
    pub fn begin_block(&mut self, block: u64) {
        self.current_block = block;
    }

    // ------------------------------------------------------------------
    // Pools + watched addresses
    // ------------------------------------------------------------------

    /// Insert a newly discovered pool together with its watched-address row,
    /// atomically as a unit. Idempotent: re-discovering an existing address
    /// is a no-op.
    ///
    /// Enforces the bonding invariant: at most one non-graduated bonding
    /// pool per base token per chain.
    pub fn insert_pool_and_watch(&mut self, pool: Pool, watched: WatchedAddress) -> bool {
        if self.pools.contains_key(&pool.address) {
            return false;
        }

        if pool.is_bonding()
            && self
                .pools
                .values()
                .any(|p| p.is_bonding() && p.base_token == pool.base_token)
        {
            warn!(
                "chain {}: dropping duplicate bonding pool {} for asset {}",
                self.chain_id, pool.address, pool.base_token
            );
            return false;
        }

        let address = pool.address.clone();
        self.journal.push(JournalEntry {
            block: self.current_block,
            op: JournalOp::Pool {
                address: address.clone(),
                prior: None,
            },
        });
        self.journal.push(JournalEntry {
            block: self.current_block,
            op: JournalOp::Watched {
                address: watched.address.clone(),
                prior: None,
            },
        });
        self.pools.insert(address.clone(), pool);
        self.watched.insert(watched.address.clone(), watched);
        true
    }

    pub fn pool(&self, address: &str) -> Option<&Pool> {
        self.pools.get(address)
    }

    /// Clone a pool row for mutation. Pair with [`ChainStore::commit_pool`]
    /// so derived fields are never observable mid-update.
    pub fn checkout_pool(&self, address: &str) -> Option<Pool> {
        self.pools.get(address).cloned()
    }

    /// Commit an updated pool row, journaling the prior version once.
    pub fn commit_pool(&mut self, pool: Pool) {
        let prior = self.pools.get(&pool.address).cloned().map(Box::new);
        self.journal.push(JournalEntry {
            block: self.current_block,
            op: JournalOp::Pool {
                address: pool.address.clone(),
                prior,
            },
        });
        self.pools.insert(pool.address.clone(), pool);
    }

    pub fn is_watched(&self, address: &str) -> bool {
        self.watched.contains_key(address)
    }

    pub fn watched_address(&self, address: &str) -> Option<&WatchedAddress> {
        self.watched.get(address)
    }

    /// Active subscription set for the log filter.
    pub fn watch_list(&self) -> Vec<String> {
        self.watched
            .values()
            .filter(|w| w.active)
            .map(|w| w.address.clone())
            .collect()
    }

    /// Contract addresses for the log filter: active watches minus V4
    /// pools, whose logs arrive via the shared pool manager.
    pub fn filter_addresses(&self) -> Vec<String> {
        self.watched
            .values()
            .filter(|w| w.active && w.version != ProtocolVersion::V4)
            .map(|w| w.address.clone())
            .collect()
    }

    /// Mark a migrated bonding pool's subscription inactive.
    pub fn deactivate_watch(&mut self, address: &str) {
        if let Some(existing) = self.watched.get(address) {
            if !existing.active {
                return;
            }
            self.journal.push(JournalEntry {
                block: self.current_block,
                op: JournalOp::Watched {
                    address: address.to_string(),
                    prior: Some(existing.clone()),
                },
            });
        }
        if let Some(row) = self.watched.get_mut(address) {
            row.active = false;
        }
    }

    /// Launched pool for a base token that has not yet migrated. Graduated
    /// pools stay resolvable here until their `Migrate` lands.
    pub fn bonding_pool_for_asset(&self, base_token: &str) -> Option<&Pool> {
        self.pools
            .values()
            .find(|p| p.bonding.is_some() && p.migration_pool.is_none() && p.base_token == base_token)
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    /// Addresses of pools mutated after `block`, from the journal. Used by
    /// the metric refresh job to bound its work to touched pools.
    pub fn pools_touched_since(&self, block: u64) -> Vec<String> {
        let mut seen = FxHashSet::default();
        let mut touched = Vec::new();
        for entry in self.journal.iter().filter(|e| e.block > block) {
            if let JournalOp::Pool { address, .. } = &entry.op {
                if seen.insert(address.clone()) {
                    touched.push(address.clone());
                }
            }
        }
        touched
    }

    // ------------------------------------------------------------------
    // Block hash chain
    // ------------------------------------------------------------------

    pub fn record_block_hash(&mut self, number: u64, hash: B256) {
        self.block_hashes.insert(number, hash);
    }

    pub fn block_hash(&self, number: u64) -> Option<B256> {
        self.block_hashes.get(&number).copied()
    }

    pub fn last_recorded_block(&self) -> Option<u64> {
        self.block_hashes.keys().next_back().copied()
    }

    // ------------------------------------------------------------------
    // Rollback + retention
    // ------------------------------------------------------------------

    /// Undo every mutation attributed to blocks after `ancestor`, restoring
    /// the exact state as of the ancestor block.
    pub fn rollback_to(&mut self, ancestor: u64) {
        while self
            .journal
            .last()
            .is_some_and(|entry| entry.block > ancestor)
        {
            let Some(entry) = self.journal.pop() else { break };
            match entry.op {
                JournalOp::Pool { address, prior } => match prior {
                    Some(pool) => {
                        self.pools.insert(address, *pool);
                    },
                    None => {
                        self.pools.remove(&address);
                    },
                },
                JournalOp::Watched { address, prior } => match prior {
                    Some(watched) => {
                        self.watched.insert(address, watched);
                    },
                    None => {
                        self.watched.remove(&address);
                    },
                },
            }
        }
        self.block_hashes.split_off(&(ancestor + 1));
        self.current_block = ancestor;
    }

    /// Drop journal entries and block hashes below the retention floor.
    /// Reorgs deeper than the floor halt the chain instead of reconciling.
    pub fn prune_below(&mut self, floor: u64) {
        self.journal.retain(|entry| entry.block >= floor);
        self.block_hashes = self.block_hashes.split_off(&floor);
    }
}
