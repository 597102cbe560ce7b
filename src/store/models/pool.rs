use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::utils::{
    invert_wad, mul_div, price_wad_from_sqrt, to_wad, validate_price_wad, ZERO_ADDRESS, WAD,
};

/// Protocol generation tag for a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V2,
    V3,
    V4,
}

impl ProtocolVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolVersion::V2 => "v2",
            ProtocolVersion::V3 => "v3",
            ProtocolVersion::V4 => "v4",
        }
    }
}

/// Version-specific chain state snapshot.
///
/// V2 pools carry raw reserves; V3/V4 pools carry in-range liquidity plus the
/// current sqrt price and tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PoolState {
    V2 {
        reserve0: U256,
        reserve1: U256,
    },
    Concentrated {
        liquidity: u128,
        sqrt_price_x96: U256,
        tick: i32,
    },
}

/// Bonding-curve phase of a launched asset, terminal once `graduated` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondingCurve {
    pub tokens_to_sell: U256,
    pub total_supply: U256,
    pub graduation_threshold_usd: U256,
    pub graduation_balance_usd: U256,
    pub graduated: bool,
}

/// Canonical pool entity, one per `(chain id, pool address)`.
///
/// For V4 the address column holds the 32-byte pool id. Derived fields are
/// written only by the metric aggregator; everything else is written by the
/// owning chain's ingestion task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub chain_id: u64,
    pub address: String,
    pub version: ProtocolVersion,

    pub base_token: String,
    pub quote_token: String,
    /// Whether the base token is token0 (ordering by address magnitude).
    pub base_is_token0: bool,
    pub base_decimals: u8,
    pub quote_decimals: u8,

    /// Fee in hundredths of a bip where the protocol carries one.
    pub fee: Option<u32>,
    pub tick_spacing: Option<i32>,
    pub hooks: Option<String>,

    pub state: PoolState,

    pub created_at_block: u64,
    pub created_at: u64,
    pub last_updated_block: u64,
    pub last_updated: u64,
    pub last_swap_at: Option<u64>,

    // Derived, owned by the metric aggregator (all wad-scaled).
    pub price: U256,
    pub liquidity_usd: U256,
    pub market_cap_usd: U256,
    pub volume_24h_usd: U256,

    // Cumulative swap fee accumulators (raw token units).
    pub total_fee0: U256,
    pub total_fee1: U256,

    pub bonding: Option<BondingCurve>,
    pub migration_pool: Option<String>,
}

/// Default V2 pair fee: 30 bips in hundredths-of-a-bip units.
const V2_FEE: u32 = 3_000;

/// Orient a token pair: the wrapped native token (the numeraire) is the quote
/// side when present, otherwise token1 quotes token0.
fn orient<'a>(token0: &'a str, token1: &'a str, wrapped_native: &str) -> (&'a str, &'a str, bool) {
    if token0 == wrapped_native {
        (token1, token0, false)
    } else {
        (token0, token1, true)
    }
}

impl Pool {
    #[allow(clippy::too_many_arguments)]
    fn base(
        chain_id: u64,
        address: String,
        version: ProtocolVersion,
        base_token: String,
        quote_token: String,
        base_is_token0: bool,
        state: PoolState,
        block_number: u64,
        timestamp: u64,
    ) -> Self {
        Self {
            chain_id,
            address,
            version,
            base_token,
            quote_token,
            base_is_token0,
            base_decimals: 18,
            quote_decimals: 18,
            fee: None,
            tick_spacing: None,
            hooks: None,
            state,
            created_at_block: block_number,
            created_at: timestamp,
            last_updated_block: block_number,
            last_updated: timestamp,
            last_swap_at: None,
            price: U256::ZERO,
            liquidity_usd: U256::ZERO,
            market_cap_usd: U256::ZERO,
            volume_24h_usd: U256::ZERO,
            total_fee0: U256::ZERO,
            total_fee1: U256::ZERO,
            bonding: None,
            migration_pool: None,
        }
    }

    pub fn from_v2_pair_created(
        chain_id: u64,
        pair: String,
        token0: String,
        token1: String,
        wrapped_native: &str,
        block_number: u64,
        timestamp: u64,
    ) -> Self {
        let (base, quote, base_is_token0) = orient(&token0, &token1, wrapped_native);
        let mut pool = Self::base(
            chain_id,
            pair,
            ProtocolVersion::V2,
            base.to_string(),
            quote.to_string(),
            base_is_token0,
            PoolState::V2 {
                reserve0: U256::ZERO,
                reserve1: U256::ZERO,
            },
            block_number,
            timestamp,
        );
        pool.fee = Some(V2_FEE);
        pool
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_v3_pool_created(
        chain_id: u64,
        pool_address: String,
        token0: String,
        token1: String,
        fee: u32,
        tick_spacing: i32,
        wrapped_native: &str,
        block_number: u64,
        timestamp: u64,
    ) -> Self {
        let (base, quote, base_is_token0) = orient(&token0, &token1, wrapped_native);
        let mut pool = Self::base(
            chain_id,
            pool_address,
            ProtocolVersion::V3,
            base.to_string(),
            quote.to_string(),
            base_is_token0,
            PoolState::Concentrated {
                liquidity: 0,
                sqrt_price_x96: U256::ZERO,
                tick: 0,
            },
            block_number,
            timestamp,
        );
        pool.fee = Some(fee);
        pool.tick_spacing = Some(tick_spacing);
        pool
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_v4_initialize(
        chain_id: u64,
        pool_id: String,
        currency0: String,
        currency1: String,
        fee: u32,
        tick_spacing: i32,
        hooks: String,
        sqrt_price_x96: U256,
        tick: i32,
        wrapped_native: &str,
        block_number: u64,
        timestamp: u64,
    ) -> Self {
        // V4 native pools use the zero address for currency0; normalize to
        // the wrapped native token so orientation math stays uniform.
        let currency0 = if currency0 == ZERO_ADDRESS {
            wrapped_native.to_string()
        } else {
            currency0
        };
        let (base, quote, base_is_token0) = orient(&currency0, &currency1, wrapped_native);
        let mut pool = Self::base(
            chain_id,
            pool_id,
            ProtocolVersion::V4,
            base.to_string(),
            quote.to_string(),
            base_is_token0,
            PoolState::Concentrated {
                liquidity: 0,
                sqrt_price_x96,
                tick,
            },
            block_number,
            timestamp,
        );
        pool.fee = Some(fee);
        pool.tick_spacing = Some(tick_spacing);
        pool.hooks = Some(hooks);
        pool
    }

    fn touch(&mut self, block_number: u64, timestamp: u64) {
        self.last_updated_block = block_number;
        self.last_updated = timestamp;
    }

    /// V2 `Sync`: authoritative reserve snapshot.
    pub fn apply_v2_sync(
        &mut self,
        reserve0: U256,
        reserve1: U256,
        block_number: u64,
        timestamp: u64,
    ) {
        if let PoolState::V2 { .. } = self.state {
            self.state = PoolState::V2 { reserve0, reserve1 };
            self.touch(block_number, timestamp);
        }
    }

    /// V3 `Initialize`: sets the starting price; liquidity arrives via mints.
    pub fn apply_initialize(
        &mut self,
        sqrt_price_x96: U256,
        tick: i32,
        block_number: u64,
        timestamp: u64,
    ) {
        if let PoolState::Concentrated { liquidity, .. } = self.state {
            self.state = PoolState::Concentrated {
                liquidity,
                sqrt_price_x96,
                tick,
            };
            self.touch(block_number, timestamp);
        }
    }

    /// V3/V4 `Swap`: carries the post-swap price and active liquidity.
    pub fn apply_concentrated_swap(
        &mut self,
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
        block_number: u64,
        timestamp: u64,
    ) {
        if let PoolState::Concentrated { .. } = self.state {
            self.state = PoolState::Concentrated {
                liquidity,
                sqrt_price_x96,
                tick,
            };
            self.touch(block_number, timestamp);
            self.last_swap_at = Some(timestamp);
        }
    }

    /// V3 `Mint`/`Burn` and V4 `ModifyLiquidity`: signed in-range delta,
    /// saturating at zero.
    pub fn apply_liquidity_delta(&mut self, delta: i128, block_number: u64, timestamp: u64) {
        if let PoolState::Concentrated {
            liquidity,
            sqrt_price_x96,
            tick,
        } = self.state
        {
            let updated = if delta >= 0 {
                liquidity.saturating_add(delta as u128)
            } else {
                liquidity.saturating_sub(delta.unsigned_abs())
            };
            self.state = PoolState::Concentrated {
                liquidity: updated,
                sqrt_price_x96,
                tick,
            };
            self.touch(block_number, timestamp);
        }
    }

    /// Accrue swap fees on the input side from the pool's fee tier.
    /// Fees are in hundredths of a bip (1e6 denominator).
    pub fn accrue_fees(&mut self, amount0_in: U256, amount1_in: U256) {
        let Some(fee) = self.fee else { return };
        let fee = U256::from(fee);
        let denom = U256::from(1_000_000u64);
        if let Some(f0) = mul_div(amount0_in, fee, denom) {
            self.total_fee0 = self.total_fee0.saturating_add(f0);
        }
        if let Some(f1) = mul_div(amount1_in, fee, denom) {
            self.total_fee1 = self.total_fee1.saturating_add(f1);
        }
    }

    /// Current wad price of the base token denominated in the quote token,
    /// derived from the state snapshot. None until the first reserve or
    /// price-bearing update lands.
    pub fn spot_price(&self) -> Option<U256> {
        let token0_price = match &self.state {
            PoolState::V2 { reserve0, reserve1 } => {
                if reserve0.is_zero() || reserve1.is_zero() {
                    return None;
                }
                // token1 per token0, decimal-adjusted to a wad
                let r0 = to_wad(*reserve0, self.token0_decimals());
                let r1 = to_wad(*reserve1, self.token1_decimals());
                mul_div(r1, *WAD, r0)?
            },
            PoolState::Concentrated { sqrt_price_x96, .. } => price_wad_from_sqrt(
                *sqrt_price_x96,
                self.token0_decimals(),
                self.token1_decimals(),
            )?,
        };

        let oriented = if self.base_is_token0 {
            token0_price
        } else {
            invert_wad(token0_price)?
        };
        validate_price_wad(oriented)
    }

    /// Quote-side reserve scaled to a wad: the half of the pool the oracle
    /// can denominate directly.
    pub fn quote_reserve_wad(&self) -> U256 {
        match &self.state {
            PoolState::V2 { reserve0, reserve1 } => {
                let raw = if self.base_is_token0 { *reserve1 } else { *reserve0 };
                to_wad(raw, self.quote_decimals)
            },
            PoolState::Concentrated {
                liquidity,
                sqrt_price_x96,
                ..
            } => {
                let (amount0, amount1) =
                    crate::utils::reserves_from_liquidity(*liquidity, *sqrt_price_x96);
                let raw = if self.base_is_token0 { amount1 } else { amount0 };
                to_wad(raw, self.quote_decimals)
            },
        }
    }

    pub fn token0_decimals(&self) -> u8 {
        if self.base_is_token0 {
            self.base_decimals
        } else {
            self.quote_decimals
        }
    }

    pub fn token1_decimals(&self) -> u8 {
        if self.base_is_token0 {
            self.quote_decimals
        } else {
            self.base_decimals
        }
    }

    /// Whether this pool is still in its pre-graduation bonding phase.
    pub fn is_bonding(&self) -> bool {
        self.bonding.as_ref().is_some_and(|b| !b.graduated)
    }
}
