use config::{Config, ConfigError, File};
use serde::Deserialize;

use super::chain::ChainConfig;

/// Ingestion engine tunables.
///
/// Defaults are conservative: small trailing distance for fast promotion to
/// live mode, bounded reorg depth, and exponential RPC backoff.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineSettings {
    /// Maximum blocks fetched per log batch while catching up.
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    /// Distance from chain head at which the pipeline switches to live mode.
    #[serde(default = "default_trailing_distance")]
    pub trailing_distance: u64,
    /// Deepest reorg the recovery walk will reconcile before halting.
    #[serde(default = "default_max_reorg_depth")]
    pub max_reorg_depth: u64,
    /// Retries per RPC call before the failure counts against the chain.
    #[serde(default = "default_rpc_retry_limit")]
    pub rpc_retry_limit: u32,
    /// Base delay for exponential backoff between RPC retries.
    #[serde(default = "default_rpc_retry_base_ms")]
    pub rpc_retry_base_ms: u64,
    /// Consecutive failed batches before a chain transitions to halted.
    #[serde(default = "default_halt_after_failures")]
    pub halt_after_failures: u32,
    /// Poll interval while waiting for new blocks at the tip.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Block interval for the touched-pool metric refresh job.
    #[serde(default = "default_metric_refresh_interval")]
    pub metric_refresh_interval: u64,
    /// Block interval for the bonding-pool market cap refresh job.
    #[serde(default = "default_market_cap_refresh_interval")]
    pub market_cap_refresh_interval: u64,
}

fn default_batch_size() -> u64 {
    2_000
}

fn default_trailing_distance() -> u64 {
    12
}

fn default_max_reorg_depth() -> u64 {
    64
}

fn default_rpc_retry_limit() -> u32 {
    5
}

fn default_rpc_retry_base_ms() -> u64 {
    200
}

fn default_halt_after_failures() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_metric_refresh_interval() -> u64 {
    100
}

fn default_market_cap_refresh_interval() -> u64 {
    300
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            trailing_distance: default_trailing_distance(),
            max_reorg_depth: default_max_reorg_depth(),
            rpc_retry_limit: default_rpc_retry_limit(),
            rpc_retry_base_ms: default_rpc_retry_base_ms(),
            halt_after_failures: default_halt_after_failures(),
            poll_interval_ms: default_poll_interval_ms(),
            metric_refresh_interval: default_metric_refresh_interval(),
            market_cap_refresh_interval: default_market_cap_refresh_interval(),
        }
    }
}

/// Root application configuration, loaded from `config.{yaml,toml}` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    pub chains: Vec<ChainConfig>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
