use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Job progress checkpoint: last block at which a job completed successfully.
///
/// One row per `(job name, chain id)`. Written only after the job body
/// succeeds, so re-running the covered range after a crash is always safe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub job: String,
    pub chain_id: u64,
    pub block_number: u64,
    pub updated_at: DateTime<Utc>,
}

/// Per-chain checkpoint table, owned by the block scheduler.
#[derive(Debug, Default)]
pub struct CheckpointStore {
    rows: FxHashMap<String, Checkpoint>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, job: &str) -> Option<u64> {
        self.rows.get(job).map(|c| c.block_number)
    }

    /// Advance a checkpoint. Monotonic: regressions are ignored except via
    /// [`CheckpointStore::rollback_to`].
    pub fn set(&mut self, job: &str, chain_id: u64, block_number: u64) {
        match self.rows.get_mut(job) {
            Some(row) if row.block_number >= block_number => {},
            Some(row) => {
                row.block_number = block_number;
                row.updated_at = Utc::now();
            },
            None => {
                self.rows.insert(
                    job.to_string(),
                    Checkpoint {
                        job: job.to_string(),
                        chain_id,
                        block_number,
                        updated_at: Utc::now(),
                    },
                );
            },
        }
    }

    /// Reorg rollback: clamp every checkpoint to the common ancestor so jobs
    /// re-derive the affected range.
    pub fn rollback_to(&mut self, ancestor: u64) {
        for row in self.rows.values_mut() {
            if row.block_number > ancestor {
                row.block_number = ancestor;
                row.updated_at = Utc::now();
            }
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &Checkpoint> {
        self.rows.values()
    }
}
