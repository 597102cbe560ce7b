use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio::sync::broadcast;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use launchdex::{rpc::HttpRpc, ChainManager, GraduationEvent, OracleBook, Settings};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let settings = Settings::new()
        .context("Failed to load config.yaml. Please ensure it exists and is valid")?;

    let rpc = Arc::new(HttpRpc::new(&settings.chains).context("Failed to build RPC providers")?);
    let oracle = Arc::new(OracleBook::new());

    // Graduation announcements fan out to any interested consumer; the
    // binary itself just logs them.
    let (graduations_tx, mut graduations_rx) = broadcast::channel::<GraduationEvent>(256);
    tokio::spawn(async move {
        while let Ok(event) = graduations_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => info!("graduation: {payload}"),
                Err(e) => info!(
                    "asset {} graduated on chain {} at block {} ({e})",
                    event.base_token, event.chain_id, event.block_number
                ),
            }
        }
    });

    let manager = ChainManager::start(&settings, rpc, oracle, graduations_tx)
        .context("Failed to start chain ingestion")?;

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Engine running. Press Ctrl+C to stop.");

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
        };
    }

    manager.shutdown().await;
    Ok(())
}
