//! Ether ↔ wei conversion with 18-decimal fixed-point semantics.

use alloy_primitives::U256;
use thiserror::Error;

pub const ETHER_DECIMALS: usize = 18;

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid digit in amount '{0}'")]
    InvalidDigit(String),
    #[error("amount '{0}' has more than 18 decimal places")]
    TooManyDecimals(String),
    #[error("amount '{0}' does not fit in 256 bits")]
    Overflow(String),
}

fn wei_per_ether() -> U256 {
    U256::from(WEI_PER_ETHER)
}

/// Parse a display amount (`"0.1"`, `"12"`, `".5"`) into wei.
pub fn to_wei(ether: &str) -> Result<U256, UnitError> {
    let trimmed = ether.trim();
    if trimmed.is_empty() {
        return Err(UnitError::Empty);
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };

    if whole.is_empty() && fraction.is_empty() {
        return Err(UnitError::InvalidDigit(trimmed.to_owned()));
    }
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(UnitError::InvalidDigit(trimmed.to_owned()));
    }
    if fraction.len() > ETHER_DECIMALS {
        return Err(UnitError::TooManyDecimals(trimmed.to_owned()));
    }

    let overflow = || UnitError::Overflow(trimmed.to_owned());

    let whole_wei = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)
            .map_err(|_| overflow())?
            .checked_mul(wei_per_ether())
            .ok_or_else(overflow)?
    };

    let fraction_wei = if fraction.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{fraction:0<width$}", width = ETHER_DECIMALS);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };

    whole_wei.checked_add(fraction_wei).ok_or_else(overflow)
}

/// Render wei as an ether decimal string without trailing zeros (`100000000000000000` → `"0.1"`).
pub fn from_wei(wei: U256) -> String {
    let (whole, remainder) = wei.div_rem(wei_per_ether());
    if remainder.is_zero() {
        return whole.to_string();
    }

    let fraction = format!("{:0>width$}", remainder.to_string(), width = ETHER_DECIMALS);
    format!("{whole}.{}", fraction.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_transfer_amount() {
        assert_eq!(to_wei("0.1").unwrap(), U256::from(100_000_000_000_000_000u128));
        assert_eq!(to_wei("2").unwrap(), U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(to_wei(".5").unwrap(), U256::from(500_000_000_000_000_000u128));
        assert_eq!(to_wei("0.000000000000000001").unwrap(), U256::from(1u8));
    }

    #[test]
    fn renders_display_units() {
        assert_eq!(from_wei(U256::ZERO), "0");
        assert_eq!(from_wei(U256::from(100_000_000_000_000_000u128)), "0.1");
        assert_eq!(from_wei(U256::from(1_000_000_000_000_000_000u128)), "1");
        assert_eq!(from_wei(U256::from(1u8)), "0.000000000000000001");
        assert_eq!(
            from_wei(U256::from(99_999_950_000_000_000_000u128)),
            "99.99995"
        );
    }

    #[test]
    fn display_value_roundtrips_through_wei() {
        let samples = [
            U256::ZERO,
            U256::from(1u8),
            U256::from(123_456_789u64),
            U256::from(100_000_000_000_000_000u128),
            U256::from(987_654_321_000_000_000_123u128),
            U256::MAX,
        ];
        for wei in samples {
            assert_eq!(to_wei(&from_wei(wei)).unwrap(), wei, "roundtrip of {wei}");
        }
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(to_wei(""), Err(UnitError::Empty));
        assert_eq!(to_wei("."), Err(UnitError::InvalidDigit(".".into())));
        assert_eq!(to_wei("-1"), Err(UnitError::InvalidDigit("-1".into())));
        assert_eq!(to_wei("1.2.3"), Err(UnitError::InvalidDigit("1.2.3".into())));
        assert!(matches!(
            to_wei("0.0000000000000000001"),
            Err(UnitError::TooManyDecimals(_))
        ));
        assert!(matches!(to_wei(&"9".repeat(80)), Err(UnitError::Overflow(_))));
    }
}
