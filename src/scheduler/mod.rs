//! Block-interval checkpoint scheduler.
//!
//! Jobs are keyed by `(job name, chain)` and run from the chain's single
//! sequential cursor: on every newly processed block the scheduler runs each
//! job whose interval has elapsed since its last checkpoint, and persists a
//! new checkpoint only after the body succeeds. Bodies are idempotent over
//! overlapping ranges, so a crash between execution and checkpoint write is
//! recovered by re-running.

pub mod jobs;

use std::sync::Arc;

use log::{info, warn};
use tokio::sync::RwLock;

use crate::{
    config::{ChainConfig, EngineSettings},
    metrics::MetricAggregator,
    rpc::RpcClient,
    store::{
        models::{Checkpoint, CheckpointStore, OracleBook},
        ChainStore,
    },
};

/// Checkpoint name of the ingestion cursor itself.
pub const INGEST_JOB: &str = "ingest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    OracleSample,
    MetricRefresh,
    MarketCapRefresh,
}

pub struct JobSpec {
    pub name: &'static str,
    pub kind: JobKind,
    pub interval: u64,
    pub start_block: u64,
}

/// Everything a job body may touch, scoped to one chain's task.
pub struct JobContext<'a> {
    pub chain: &'a ChainConfig,
    pub rpc: &'a dyn RpcClient,
    pub store: &'a RwLock<ChainStore>,
    pub oracle: &'a OracleBook,
    pub aggregator: &'a mut MetricAggregator,
    pub settings: &'a EngineSettings,
    pub block: u64,
    pub timestamp: u64,
}

pub struct BlockScheduler {
    chain_id: u64,
    jobs: Vec<JobSpec>,
    checkpoints: Arc<RwLock<CheckpointStore>>,
}

impl BlockScheduler {
    /// Build the default job set for a chain: oracle sampling, touched-pool
    /// metric refresh, and bonding-pool market cap refresh.
    pub fn for_chain(chain: &ChainConfig, settings: &EngineSettings) -> Self {
        let jobs = vec![
            JobSpec {
                name: "oracle-sample",
                kind: JobKind::OracleSample,
                interval: chain.oracle.sample_interval,
                start_block: chain.oracle_start_block,
            },
            JobSpec {
                name: "metric-refresh",
                kind: JobKind::MetricRefresh,
                interval: settings.metric_refresh_interval,
                start_block: chain.start_block(),
            },
            JobSpec {
                name: "market-cap-refresh",
                kind: JobKind::MarketCapRefresh,
                interval: settings.market_cap_refresh_interval,
                start_block: chain.start_block(),
            },
        ];

        Self {
            chain_id: chain.chain_id,
            jobs,
            checkpoints: Arc::new(RwLock::new(CheckpointStore::new())),
        }
    }

    /// Shared read handle for the serving layer and tests.
    pub fn checkpoints(&self) -> Arc<RwLock<CheckpointStore>> {
        self.checkpoints.clone()
    }

    /// Run every job due at `ctx.block`. Failures are logged and retried on
    /// a later block; the checkpoint only moves on success.
    pub async fn on_block(&self, ctx: &mut JobContext<'_>) {
        for job in &self.jobs {
            if ctx.block < job.start_block {
                continue;
            }
            // Before the first checkpoint, the baseline is the block just
            // before the job's start so the start block itself is covered.
            let last = {
                let checkpoints = self.checkpoints.read().await;
                checkpoints
                    .get(job.name)
                    .unwrap_or(job.start_block.saturating_sub(1))
            };
            if ctx.block.saturating_sub(last) < job.interval {
                continue;
            }

            let result = match job.kind {
                JobKind::OracleSample => jobs::oracle_sample::run(ctx).await,
                JobKind::MetricRefresh => jobs::metric_refresh::run(ctx, last).await,
                JobKind::MarketCapRefresh => jobs::market_cap_refresh::run(ctx).await,
            };

            match result {
                Ok(()) => {
                    let mut checkpoints = self.checkpoints.write().await;
                    checkpoints.set(job.name, self.chain_id, ctx.block);
                },
                Err(e) => {
                    warn!(
                        "chain {}: job {} failed at block {}: {}",
                        self.chain_id, job.name, ctx.block, e
                    );
                },
            }
        }
    }

    /// Last block applied by the ingestion cursor, if any.
    pub async fn cursor(&self) -> Option<u64> {
        self.checkpoints.read().await.get(INGEST_JOB)
    }

    /// Commit the ingestion cursor after a block is fully applied.
    pub async fn advance_cursor(&self, block: u64) {
        self.checkpoints
            .write()
            .await
            .set(INGEST_JOB, self.chain_id, block);
    }

    /// Reorg rollback: clamp every checkpoint to the common ancestor.
    pub async fn rollback_to(&self, ancestor: u64) {
        info!(
            "chain {}: rolling checkpoints back to block {}",
            self.chain_id, ancestor
        );
        self.checkpoints.write().await.rollback_to(ancestor);
    }

    /// Snapshot of all checkpoint rows, for serving-layer reads.
    pub async fn snapshot(&self) -> Vec<Checkpoint> {
        self.checkpoints
            .read()
            .await
            .rows()
            .cloned()
            .collect()
    }
}
