use serde::{Deserialize, Serialize};

use super::pool::ProtocolVersion;

/// A dynamically discovered contract address under active log subscription.
///
/// Created when a factory creation event is observed. Never deleted (pools
/// are not destroyed on chain) but marked inactive once liquidity migrates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedAddress {
    pub chain_id: u64,
    pub version: ProtocolVersion,
    pub address: String,
    pub discovered_at_block: u64,
    pub active: bool,
}

impl WatchedAddress {
    pub fn new(
        chain_id: u64,
        version: ProtocolVersion,
        address: String,
        discovered_at_block: u64,
    ) -> Self {
        Self {
            chain_id,
            version,
            address,
            discovered_at_block,
            active: true,
        }
    }
}
