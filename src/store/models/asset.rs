use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Launch parameters of an asset, read from the airlock contract's
/// `getAssetData` view when the asset is first discovered.
///
/// Immutable once fetched unless the airlock re-emits an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetData {
    pub numeraire: String,
    pub timelock: String,
    pub governance: String,
    pub liquidity_migrator: String,
    pub pool_initializer: String,
    pub pool: String,
    pub migration_pool: String,
    pub num_tokens_to_sell: U256,
    pub total_supply: U256,
    pub integrator: String,
}
