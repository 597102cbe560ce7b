use anyhow::{bail, Result};
use serde::Deserialize;

/// Well-known contract addresses shared across protocol generations on a chain.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SharedAddresses {
    /// Bonding-curve launchpad contract; emits `Create`/`Migrate` and serves
    /// `getAssetData` reads.
    pub airlock: String,
    pub token_factory: String,
    pub universal_router: String,
    pub governance_factory: String,
    pub migrator: String,
    /// Wrapped native token; the default quote side for pool orientation.
    pub wrapped_native: String,
}

/// Oracle feed powering native→USD conversion for a chain.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OracleFeedSettings {
    /// Aggregator contract address; doubles as the oracle id.
    pub feed: String,
    /// Decimals of the feed's answer (Chainlink USD feeds use 8).
    #[serde(default = "default_feed_decimals")]
    pub decimals: u8,
    /// Blocks between oracle samples taken by the scheduler.
    #[serde(default = "default_sample_interval")]
    pub sample_interval: u64,
}

fn default_feed_decimals() -> u8 {
    8
}

fn default_sample_interval() -> u64 {
    50
}

/// Per-protocol and shared address sets for one chain.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChainAddresses {
    pub shared: SharedAddresses,
    #[serde(default)]
    pub v2_factory: Option<String>,
    #[serde(default)]
    pub v3_factory: Option<String>,
    #[serde(default)]
    pub v4_pool_manager: Option<String>,
}

/// Static per-chain configuration, loaded once at startup and immutable after.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub rpc_url: String,
    #[serde(default)]
    pub v2_start_block: Option<u64>,
    #[serde(default)]
    pub v3_start_block: Option<u64>,
    #[serde(default)]
    pub v4_start_block: Option<u64>,
    pub oracle_start_block: u64,
    pub addresses: ChainAddresses,
    pub oracle: OracleFeedSettings,
    /// USD liquidity a bonding pool must accrue before it graduates.
    #[serde(default = "default_graduation_threshold")]
    pub graduation_threshold_usd: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_graduation_threshold() -> u64 {
    69_000
}

impl ChainConfig {
    /// Earliest start block across the configured protocol generations.
    pub fn start_block(&self) -> u64 {
        [self.v2_start_block, self.v3_start_block, self.v4_start_block]
            .into_iter()
            .flatten()
            .chain(std::iter::once(self.oracle_start_block))
            .min()
            .unwrap_or(0)
    }

    /// Validate the start-block invariant: adjacent configured generations
    /// must be non-decreasing, and a factory must exist for each configured
    /// generation. A missing generation imposes no ordering across the gap.
    pub fn validate(&self) -> Result<()> {
        let adjacent = [
            (self.v2_start_block, self.v3_start_block),
            (self.v3_start_block, self.v4_start_block),
        ];
        if adjacent
            .iter()
            .any(|pair| matches!(pair, (Some(lo), Some(hi)) if lo > hi))
        {
            bail!(
                "chain {}: start blocks must be non-decreasing across V2->V3->V4",
                self.name
            );
        }

        if self.v2_start_block.is_some() && self.addresses.v2_factory.is_none() {
            bail!("chain {}: v2_start_block set without a v2_factory", self.name);
        }
        if self.v3_start_block.is_some() && self.addresses.v3_factory.is_none() {
            bail!("chain {}: v3_start_block set without a v3_factory", self.name);
        }
        if self.v4_start_block.is_some() && self.addresses.v4_pool_manager.is_none() {
            bail!(
                "chain {}: v4_start_block set without a v4_pool_manager",
                self.name
            );
        }

        Ok(())
    }
}
