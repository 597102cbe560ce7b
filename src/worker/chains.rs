use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::Settings,
    metrics::GraduationEvent,
    rpc::RpcClient,
    store::models::OracleBook,
    worker::ChainWorker,
};

/// A running chain ingestion task.
struct RunningChain {
    name: String,
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Starts one ingestion task per enabled chain and tears them down
/// gracefully on shutdown. Chain failures are isolated: one chain halting
/// never stops the others.
pub struct ChainManager {
    running_chains: HashMap<u64, RunningChain>,
}

impl ChainManager {
    pub fn start(
        settings: &Settings,
        rpc: Arc<dyn RpcClient>,
        oracle: Arc<OracleBook>,
        graduations: broadcast::Sender<GraduationEvent>,
    ) -> Result<Self> {
        let mut manager = Self {
            running_chains: HashMap::new(),
        };

        for chain in settings.chains.iter().filter(|c| c.enabled) {
            chain
                .validate()
                .context(format!("invalid configuration for chain {}", chain.name))?;

            info!("starting ingestion for chain {} ({})", chain.name, chain.chain_id);
            let worker = ChainWorker::new(
                chain.clone(),
                settings.engine.clone(),
                rpc.clone(),
                oracle.clone(),
                graduations.clone(),
            )
            .context(format!("failed to initialize chain {}", chain.name))?;

            let cancel_token = CancellationToken::new();
            let worker_token = cancel_token.clone();
            let chain_name = chain.name.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = worker.run(worker_token).await {
                    error!("ingestion for {} failed: {:#}", chain_name, e);
                }
            });

            manager.running_chains.insert(
                chain.chain_id,
                RunningChain {
                    name: chain.name.clone(),
                    handle,
                    cancel_token,
                },
            );
        }

        if manager.running_chains.is_empty() {
            warn!("no enabled chains configured");
        } else {
            info!("started {} chain ingestion task(s)", manager.running_chains.len());
        }

        Ok(manager)
    }

    /// Cancel every chain task, then wait for all of them to drain
    /// concurrently, each with its own timeout.
    pub async fn shutdown(self) {
        info!("stopping all chain ingestion tasks...");
        for running in self.running_chains.values() {
            running.cancel_token.cancel();
        }

        let joins = self
            .running_chains
            .into_iter()
            .map(|(chain_id, running)| async move {
                match tokio::time::timeout(Duration::from_secs(10), running.handle).await {
                    Ok(_) => {
                        info!("chain {} ({}) stopped gracefully", running.name, chain_id);
                    },
                    Err(_) => {
                        warn!(
                            "chain {} ({}) did not stop within timeout, continuing...",
                            running.name, chain_id
                        );
                    },
                }
            });
        futures::future::join_all(joins).await;
        info!("shutdown complete");
    }
}
