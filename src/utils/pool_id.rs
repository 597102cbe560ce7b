//! Uniswap V4 pool ID computation.
//!
//! V4 pools are keyed by `keccak256(abi.encode(currency0, currency1, fee,
//! tickSpacing, hooks))` rather than a deployed address. The engine stores
//! that 32-byte ID in the pool address column and recomputes it to reject
//! spoofed events on the shared pool manager.

use alloy::primitives::{keccak256, Address};
use alloy::sol_types::SolValue;

/// Compute the V4 pool ID from pool parameters.
///
/// Currencies are sorted by address magnitude before encoding, matching the
/// on-chain `sortsBefore` ordering. Returned as lowercase hex with 0x prefix.
pub fn compute_v4_pool_id(
    currency_a: &str,
    currency_b: &str,
    fee: u32,
    tick_spacing: i32,
    hooks: &str,
) -> String {
    let addr_a: Address = currency_a.parse().unwrap_or_default();
    let addr_b: Address = currency_b.parse().unwrap_or_default();
    let hooks_addr: Address = hooks.parse().unwrap_or_default();

    let (currency0, currency1) = if addr_a < addr_b { (addr_a, addr_b) } else { (addr_b, addr_a) };

    // abi.encode((address, address, uint24, int24, address))
    let encoded = (currency0, currency1, fee, tick_spacing, hooks_addr).abi_encode();
    let hash = keccak256(&encoded);

    format!("{hash:#x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: &str = "0x0000000000000000000000000000000000000000";
    const USDC: &str = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";

    #[test]
    fn pool_id_is_order_independent() {
        let id1 = compute_v4_pool_id(ZERO, USDC, 3000, 60, ZERO);
        let id2 = compute_v4_pool_id(USDC, ZERO, 3000, 60, ZERO);
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_hooks_produce_different_ids() {
        let plain = compute_v4_pool_id(ZERO, USDC, 3000, 60, ZERO);
        let hooked = compute_v4_pool_id(
            ZERO,
            USDC,
            3000,
            60,
            "0x1234567890abcdef1234567890abcdef12345678",
        );
        assert_ne!(plain, hooked);
    }
}
