//! Decimal amount <-> base unit conversion
//!
//! User-facing amounts are decimal strings ("1.5 WBTC"); the
//! aggregator APIs want integer base units ("150000000"). The decimal
//! to base-unit direction runs entirely on integer math so the same
//! input always produces the same wire amount. Truncation is toward
//! zero - excess fractional digits are dropped, never rounded up.

use alloy_primitives::U256;
use std::str::FromStr;

use crate::error::{QuoteError, QuoteResult};

/// Convert a decimal amount string to integer base units.
///
/// `to_base_units("1", 8)` == 100000000. Fractional digits beyond
/// `decimals` are truncated toward zero.
pub fn to_base_units(amount: &str, decimals: u8) -> QuoteResult<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(QuoteError::InvalidAmount(amount.to_string()));
    }

    let (int_part, frac_part) = match amount.split_once('.') {
        Some((i, f)) => (i, f),
        None => (amount, ""),
    };

    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(QuoteError::InvalidAmount(amount.to_string()));
    }

    let scale = U256::from(10u64).pow(U256::from(decimals as u64));
    let whole = U256::from_str(int_part)
        .map_err(|_| QuoteError::InvalidAmount(amount.to_string()))?;

    // Take at most `decimals` fractional digits, right-padded with
    // zeros so "1.5" at 8 decimals contributes 50000000
    let frac_taken: String = frac_part.chars().take(decimals as usize).collect();
    let frac_scaled = if frac_taken.is_empty() {
        U256::ZERO
    } else {
        let padding = decimals as usize - frac_taken.len();
        let digits = U256::from_str(&frac_taken)
            .map_err(|_| QuoteError::InvalidAmount(amount.to_string()))?;
        digits * U256::from(10u64).pow(U256::from(padding as u64))
    };

    Ok(whole * scale + frac_scaled)
}

/// Normalize an integer base-unit amount (as returned by a provider,
/// always a decimal string) into a displayable decimal quantity.
pub fn from_base_units(base: &str, decimals: u8) -> QuoteResult<f64> {
    // Providers report base units as plain unsigned integer strings.
    // Anything else ("NaN", signs, exponent forms) must not become a
    // quote - a NaN output amount would poison best-quote comparison
    if base.is_empty() || !base.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QuoteError::InvalidAmount(base.to_string()));
    }

    let raw: f64 = base
        .parse()
        .map_err(|_| QuoteError::InvalidAmount(base.to_string()))?;
    Ok(raw / 10f64.powi(decimals as i32))
}

/// Format a normalized amount back into an input-field string, capped
/// at the token's decimal count (mirrors the display truncation the
/// dashboard applies to amount fields).
pub fn format_amount(value: f64, decimals: u8) -> String {
    let shown = decimals.min(8) as usize;
    let s = format!("{:.*}", shown, value);
    // trim trailing zeros but keep at least one digit after the point
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_amount_wbtc() {
        // 1 WBTC (8 decimals) -> 100000000 base units
        let base = to_base_units("1", 8).unwrap();
        assert_eq!(base, U256::from(100_000_000u64));
    }

    #[test]
    fn test_fractional_amount() {
        let base = to_base_units("1.5", 8).unwrap();
        assert_eq!(base, U256::from(150_000_000u64));

        let base = to_base_units("0.000001", 6).unwrap();
        assert_eq!(base, U256::from(1u64));
    }

    #[test]
    fn test_truncates_toward_zero() {
        // 9 fractional digits at 8 decimals: the 9th digit is dropped,
        // not rounded
        let base = to_base_units("0.999999999", 8).unwrap();
        assert_eq!(base, U256::from(99_999_999u64));
    }

    #[test]
    fn test_leading_dot_and_empty_int() {
        let base = to_base_units(".5", 6).unwrap();
        assert_eq!(base, U256::from(500_000u64));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(to_base_units("", 6).is_err());
        assert!(to_base_units("1.2.3", 6).is_err());
        assert!(to_base_units("abc", 6).is_err());
        assert!(to_base_units("-1", 6).is_err());
    }

    #[test]
    fn test_normalize_usdt() {
        // Provider returns 65000000000 for a 6-decimal token -> 65000.0
        let v = from_base_units("65000000000", 6).unwrap();
        assert!((v - 65000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_rejects_non_integer_strings() {
        assert!(from_base_units("NaN", 6).is_err());
        assert!(from_base_units("-5", 6).is_err());
        assert!(from_base_units("1e9", 6).is_err());
        assert!(from_base_units("1.5", 6).is_err());
        assert!(from_base_units("", 6).is_err());
    }

    #[test]
    fn test_round_trip_tolerance() {
        for decimals in [6u8, 8, 18] {
            for amount in ["1", "0.5", "1234.5678", "0.000123"] {
                let base = to_base_units(amount, decimals).unwrap();
                let back = from_base_units(&base.to_string(), decimals).unwrap();
                let original: f64 = amount.parse().unwrap();
                let tolerance = 10f64.powi(-(decimals as i32));
                assert!(
                    (back - original).abs() < tolerance,
                    "{} at {} decimals drifted: {}",
                    amount,
                    decimals,
                    back
                );
            }
        }
    }

    #[test]
    fn test_format_amount_trims() {
        assert_eq!(format_amount(65000.0, 6), "65000");
        assert_eq!(format_amount(0.5, 8), "0.5");
        assert_eq!(format_amount(0.0, 6), "0");
    }
}
