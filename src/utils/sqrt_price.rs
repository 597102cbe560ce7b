//! Integer price math for concentrated-liquidity pools (V3/V4).
//!
//! Converts sqrtPriceX96 values to wad prices and derives virtual reserves
//! from in-range liquidity, all in integer arithmetic.

use alloy::primitives::U256;
use num_bigint::BigUint;

use super::wad::{pow10, WAD};

/// Wad price of token1 denominated in token0 units from a Q64.96 sqrt price.
///
/// `price = (sqrtPriceX96 / 2^96)^2`, decimal-adjusted by `10^(dec0 - dec1)`
/// and scaled to a wad. Returns `None` for a zero sqrt price or when the
/// result overflows U256.
pub fn price_wad_from_sqrt(sqrt_price_x96: U256, token0_decimals: u8, token1_decimals: u8) -> Option<U256> {
    if sqrt_price_x96.is_zero() || token0_decimals > 36 || token1_decimals > 36 {
        return None;
    }

    let sqrt = BigUint::from_bytes_le(&sqrt_price_x96.to_le_bytes::<32>());
    let wad = BigUint::from_bytes_le(&WAD.to_le_bytes::<32>());

    // numerator = sqrt^2 * WAD * 10^dec0, denominator = 2^192 * 10^dec1
    let mut numerator = &sqrt * &sqrt * wad;
    let mut denominator = BigUint::from(1u8) << 192;
    if token0_decimals >= token1_decimals {
        numerator *= BigUint::from(10u8).pow((token0_decimals - token1_decimals) as u32);
    } else {
        denominator *= BigUint::from(10u8).pow((token1_decimals - token0_decimals) as u32);
    }

    let result: BigUint = numerator / denominator;
    let bytes = result.to_bytes_le();
    if bytes.len() > 32 {
        return None;
    }
    U256::try_from_le_slice(&bytes)
}

/// Virtual reserves at the current price point from in-range liquidity.
///
/// Subgraph-style valuation: `amount0 = L * 2^96 / sqrtP`,
/// `amount1 = L * sqrtP / 2^96`, both raw (pre-decimal) amounts.
pub fn reserves_from_liquidity(liquidity: u128, sqrt_price_x96: U256) -> (U256, U256) {
    if liquidity == 0 || sqrt_price_x96.is_zero() {
        return (U256::ZERO, U256::ZERO);
    }

    let liq = BigUint::from(liquidity);
    let sqrt = BigUint::from_bytes_le(&sqrt_price_x96.to_le_bytes::<32>());
    let q96 = BigUint::from(1u8) << 96;

    let amount0 = (&liq * &q96) / &sqrt;
    let amount1 = (&liq * &sqrt) / &q96;

    let cap = |v: BigUint| -> U256 {
        let bytes = v.to_bytes_le();
        if bytes.len() > 32 {
            U256::MAX
        } else {
            U256::try_from_le_slice(&bytes).unwrap_or(U256::ZERO)
        }
    };

    (cap(amount0), cap(amount1))
}

/// Sanity bound for wad prices: reject ratios outside 1e-18 .. 1e18 tokens.
pub fn validate_price_wad(price: U256) -> Option<U256> {
    if price.is_zero() || price > pow10(36) {
        None
    } else {
        Some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 2^96 as U256.
    fn q96() -> U256 {
        U256::from(1) << 96
    }

    #[test]
    fn unit_sqrt_price_is_one() {
        // sqrtPriceX96 == 2^96 means price 1.0 for equal-decimal tokens
        let price = price_wad_from_sqrt(q96(), 18, 18).unwrap();
        assert_eq!(price, *WAD);
    }

    #[test]
    fn doubled_sqrt_price_is_four() {
        let price = price_wad_from_sqrt(q96() * U256::from(2), 18, 18).unwrap();
        assert_eq!(price, *WAD * U256::from(4));
    }

    #[test]
    fn decimal_adjustment_shifts_price() {
        // token0 with 6 decimals vs token1 with 18: raw price 1.0 adjusts by 1e-12
        let price = price_wad_from_sqrt(q96(), 6, 18).unwrap();
        assert_eq!(price, pow10(6));
    }

    #[test]
    fn zero_sqrt_price_rejected() {
        assert_eq!(price_wad_from_sqrt(U256::ZERO, 18, 18), None);
    }

    #[test]
    fn reserves_at_unit_price() {
        // At price 1.0 both virtual reserves equal the liquidity
        let (a0, a1) = reserves_from_liquidity(1_000_000, q96());
        assert_eq!(a0, U256::from(1_000_000u64));
        assert_eq!(a1, U256::from(1_000_000u64));
    }

    #[test]
    fn reserves_zero_liquidity() {
        assert_eq!(reserves_from_liquidity(0, q96()), (U256::ZERO, U256::ZERO));
    }
}
