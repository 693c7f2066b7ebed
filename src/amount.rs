//! Exact decimal SOL amount handling
//!
//! Transfer amounts arrive as decimal text and must convert to lamports
//! without binary-float rounding. Conversion truncates toward zero at nine
//! fractional digits, so `lamports(amount) == floor(amount * 1e9)` holds for
//! every representable decimal amount.

use crate::error::{Error, Result};

/// Smallest ledger unit: 1 SOL = 1_000_000_000 lamports
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Parse a decimal SOL amount string into lamports.
///
/// Accepts plain decimal notation (`"1"`, `"0.5"`, `".25"`). Digits past the
/// ninth fractional place are dropped (truncation, never rounding up).
/// Fails with `InvalidAmount` on malformed input or a result of 0 lamports.
pub fn sol_to_lamports(amount: &str) -> Result<u64> {
    let s = amount.trim();
    if s.is_empty() {
        return Err(Error::InvalidAmount("empty amount".to_string()));
    }
    if s.starts_with('-') {
        return Err(Error::InvalidAmount(format!("amount must be > 0: {s}")));
    }

    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(Error::InvalidAmount(format!("not a decimal number: {s}")));
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return Err(Error::InvalidAmount(format!("not a decimal number: {s}")));
    }

    let whole: u64 = if int_part.is_empty() {
        0
    } else {
        int_part
            .parse()
            .map_err(|_| Error::InvalidAmount(format!("amount too large: {s}")))?
    };

    // Truncate toward zero at 9 fractional digits, right-pad short inputs
    let frac9: String = frac_part.chars().take(9).collect();
    let frac: u64 = if frac9.is_empty() {
        0
    } else {
        format!("{frac9:0<9}")
            .parse()
            .map_err(|_| Error::InvalidAmount(format!("not a decimal number: {s}")))?
    };

    let lamports = whole
        .checked_mul(LAMPORTS_PER_SOL)
        .and_then(|l| l.checked_add(frac))
        .ok_or_else(|| Error::InvalidAmount(format!("amount too large: {s}")))?;

    if lamports == 0 {
        return Err(Error::InvalidAmount(format!("amount must be > 0: {s}")));
    }
    Ok(lamports)
}

/// Convert lamports to SOL (display only; not used for ledger arithmetic)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_and_fractional_amounts() {
        assert_eq!(sol_to_lamports("1").unwrap(), 1_000_000_000);
        assert_eq!(sol_to_lamports("0.5").unwrap(), 500_000_000);
        assert_eq!(sol_to_lamports(".001").unwrap(), 1_000_000);
        assert_eq!(sol_to_lamports("2.000000001").unwrap(), 2_000_000_001);
        assert_eq!(sol_to_lamports("0.000000001").unwrap(), 1);
    }

    #[test]
    fn test_truncates_past_nine_digits_never_rounds_up() {
        // 10 fractional digits: the trailing 9 must be dropped, not rounded
        assert_eq!(sol_to_lamports("0.0000000019").unwrap(), 1);
        assert_eq!(sol_to_lamports("1.9999999999").unwrap(), 1_999_999_999);
    }

    #[test]
    fn test_exactness_where_floats_drift() {
        // 0.1 is not representable in binary; string parsing must stay exact
        assert_eq!(sol_to_lamports("0.1").unwrap(), 100_000_000);
        assert_eq!(sol_to_lamports("0.3").unwrap(), 300_000_000);
        assert_eq!(sol_to_lamports("123456.123456789").unwrap(), 123_456_123_456_789);
    }

    #[test]
    fn test_rejects_invalid_input() {
        assert!(sol_to_lamports("").is_err());
        assert!(sol_to_lamports("-1").is_err());
        assert!(sol_to_lamports("0").is_err());
        assert!(sol_to_lamports("0.0000000009").is_err()); // truncates to 0
        assert!(sol_to_lamports("1.2.3").is_err());
        assert!(sol_to_lamports("abc").is_err());
        assert!(sol_to_lamports(".").is_err());
        assert!(sol_to_lamports("1e9").is_err());
    }

    #[test]
    fn test_lamports_to_sol_display() {
        assert_eq!(lamports_to_sol(1_000_000_000), 1.0);
        assert_eq!(lamports_to_sol(500_000_000), 0.5);
    }
}
