//! Numeric and encoding utilities for the Launchdex engine.
//!
//! - [`wad`] - Q18 fixed-point integer arithmetic (mul_div, decimal scaling)
//! - [`sqrt_price`] - V3/V4 sqrtPriceX96 price math and virtual reserves
//! - [`pool_id`] - Uniswap V4 pool ID computation

mod pool_id;
mod sqrt_price;
mod wad;

/// The Ethereum zero address, used for native-token normalization.
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub use pool_id::compute_v4_pool_id;
pub use sqrt_price::{price_wad_from_sqrt, reserves_from_liquidity, validate_price_wad};
pub use wad::{hex_encode, invert_wad, mul_div, pow10, to_wad, WAD};
