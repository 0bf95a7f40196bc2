//! Exact conversion between ADA text and lovelace.

use crate::config::LOVELACE_PER_ADA;
use crate::error::{Result, TransferError};

const DECIMALS: usize = 6;

/// Parses an ADA amount such as `"1.5"` into lovelace.
///
/// At most six decimal places are accepted. No rounding takes place.
pub fn parse_ada(text: &str) -> Result<u64> {
    let text = text.trim();
    let invalid = |reason: &str| TransferError::InvalidAmount(format!("'{text}': {reason}"));

    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("no digits"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("only digits and one decimal point are allowed"));
    }
    if fraction.len() > DECIMALS {
        return Err(invalid("more than six decimal places"));
    }

    let whole: u64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid("too large"))?
    };
    let fraction: u64 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = DECIMALS)
            .parse()
            .map_err(|_| invalid("bad fraction"))?
    };

    whole
        .checked_mul(LOVELACE_PER_ADA)
        .and_then(|l| l.checked_add(fraction))
        .ok_or_else(|| invalid("too large"))
}

/// Formats lovelace as ADA with all six decimals.
pub fn format_ada(lovelace: u128) -> String {
    let per_ada = LOVELACE_PER_ADA as u128;
    format!("{}.{:06}", lovelace / per_ada, lovelace % per_ada)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_and_fraction() {
        assert_eq!(parse_ada("1").unwrap(), 1_000_000);
        assert_eq!(parse_ada("1.5").unwrap(), 1_500_000);
        assert_eq!(parse_ada("0.000001").unwrap(), 1);
        assert_eq!(parse_ada(".25").unwrap(), 250_000);
        assert_eq!(parse_ada("1.99").unwrap(), 1_990_000);
        assert_eq!(parse_ada(" 2 ").unwrap(), 2_000_000);
    }

    #[test]
    fn test_parse_rejects() {
        assert!(parse_ada("").is_err());
        assert!(parse_ada(".").is_err());
        assert!(parse_ada("-1").is_err());
        assert!(parse_ada("1.0000001").is_err());
        assert!(parse_ada("1e6").is_err());
        assert!(parse_ada("1.2.3").is_err());
        assert!(matches!(
            parse_ada("99999999999999999999"),
            Err(TransferError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_format() {
        assert_eq!(format_ada(0), "0.000000");
        assert_eq!(format_ada(1_500_000), "1.500000");
        assert_eq!(format_ada(123_456_789), "123.456789");
    }

    #[test]
    fn test_round_trip() {
        for lovelace in [0u64, 1, 999_999, 1_000_000, 45_000_000_123] {
            assert_eq!(parse_ada(&format_ada(lovelace as u128)).unwrap(), lovelace);
        }
    }
}
