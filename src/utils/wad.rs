//! Q18 fixed-point ("wad") integer arithmetic.
//!
//! All monetary quantities in the engine are U256 wads. Wide intermediate
//! products go through BigUint so `mul_div` never overflows, and division
//! always truncates so USD values are never rounded up.

use alloy::primitives::{hex, U256};
use num_bigint::BigUint;
use once_cell::sync::Lazy;

/// 10^18, the wad scaling factor.
pub static WAD: Lazy<U256> = Lazy::new(|| U256::from(10u64).pow(U256::from(18u64)));

static POW10_CACHE: Lazy<[U256; 37]> =
    Lazy::new(|| std::array::from_fn(|i| U256::from(10u64).pow(U256::from(i as u64))));

/// Compute 10^exp as U256, cached for the exponents token decimals produce.
pub fn pow10(exp: u8) -> U256 {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize]
    } else {
        U256::from(10u64).pow(U256::from(exp as u64))
    }
}

/// Encode bytes as a lowercase hex string with 0x prefix.
pub fn hex_encode(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn to_big(v: U256) -> BigUint {
    BigUint::from_bytes_le(&v.to_le_bytes::<32>())
}

fn from_big(v: &BigUint) -> Option<U256> {
    let bytes = v.to_bytes_le();
    if bytes.len() > 32 {
        return None;
    }
    U256::try_from_le_slice(&bytes)
}

/// Compute `a * b / denom` with a 512-bit intermediate, truncating.
///
/// Returns `None` when `denom` is zero or the result does not fit in a U256.
pub fn mul_div(a: U256, b: U256, denom: U256) -> Option<U256> {
    if denom.is_zero() {
        return None;
    }
    let result = to_big(a) * to_big(b) / to_big(denom);
    from_big(&result)
}

/// Scale a raw token amount to a wad given the token's decimals.
///
/// Amounts from tokens with more than 18 decimals are truncated down.
pub fn to_wad(raw: U256, decimals: u8) -> U256 {
    if decimals == 18 {
        raw
    } else if decimals < 18 {
        raw.saturating_mul(pow10(18 - decimals))
    } else {
        raw / pow10(decimals - 18)
    }
}

/// Invert a wad-scaled ratio: `WAD^2 / p`, truncating. None for zero input.
pub fn invert_wad(p: U256) -> Option<U256> {
    if p.is_zero() {
        return None;
    }
    mul_div(*WAD, *WAD, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_truncates() {
        // 10 * 1 / 3 = 3 (never rounded up)
        assert_eq!(
            mul_div(U256::from(10), U256::from(1), U256::from(3)),
            Some(U256::from(3))
        );
    }

    #[test]
    fn mul_div_wide_intermediate() {
        // (2^200 * 2^200) / 2^200 = 2^200: the product overflows U256
        let big = U256::from(1) << 200;
        assert_eq!(mul_div(big, big, big), Some(big));
    }

    #[test]
    fn mul_div_zero_denominator() {
        assert_eq!(mul_div(U256::from(1), U256::from(1), U256::ZERO), None);
    }

    #[test]
    fn to_wad_scales_by_decimals() {
        assert_eq!(to_wad(U256::from(1_000_000u64), 6), *WAD);
        assert_eq!(to_wad(*WAD, 18), *WAD);
        // 24-decimal amounts truncate down to wad precision
        assert_eq!(to_wad(pow10(24), 24), *WAD);
    }

    #[test]
    fn invert_wad_roundtrip() {
        // invert(1e13) = 1e23 (price 1e-5 inverts to 1e5)
        let p = pow10(13);
        assert_eq!(invert_wad(p), Some(pow10(23)));
        assert_eq!(invert_wad(U256::ZERO), None);
    }
}
