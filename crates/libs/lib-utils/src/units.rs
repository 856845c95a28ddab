//! # Currency Units
//!
//! Conversion between decimal display amounts ("0.05" ETH) and wei, on top of
//! `alloy_primitives::utils`. Amounts stay integers so that sums of many small
//! donations never drift. Input is held to a strict decimal grammar before it
//! reaches alloy, and display strings trim trailing zeros the way wallets show them.

use alloy_primitives::utils::{self, Unit};
use alloy_primitives::U256;

/// Decimals of the native currency.
pub const ETHER_DECIMALS: u8 = 18;

/// Parse a non-negative decimal string into smallest units.
///
/// Accepts `"1"`, `"0.5"`, `".5"` and `"5."`. Signs, exponents, separators and
/// more fractional digits than `decimals` are rejected.
pub fn parse_units(value: &str, decimals: u8) -> Result<u128, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Empty);
    }
    if value.starts_with('-') {
        return Err(Error::Negative(value.to_string()));
    }

    let (whole, frac) = value.split_once('.').unwrap_or((value, ""));
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(Error::Invalid(value.to_string()));
    }
    if frac.len() > usize::from(decimals) {
        return Err(Error::TooPrecise(value.to_string()));
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let normalized = if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    };
    Unit::new(decimals).ok_or(Error::Decimals(decimals))?;
    let wei: U256 = utils::parse_units(&normalized, decimals)
        .map_err(|_| Error::Invalid(value.to_string()))?
        .into();
    u128::try_from(wei).map_err(|_| Error::Overflow(value.to_string()))
}

/// Format smallest units as a decimal string with trailing zeros trimmed.
///
/// Whole amounts keep one fractional digit: `1000000000000000000` wei is `"1.0"`.
pub fn format_units(value: u128, decimals: u8) -> Result<String, Error> {
    Unit::new(decimals).ok_or(Error::Decimals(decimals))?;
    let text = utils::format_units(U256::from(value), decimals).map_err(|_| Error::Decimals(decimals))?;
    Ok(trim_fraction(&text))
}

/// Parse an ether amount into wei.
pub fn parse_ether(value: &str) -> Result<u128, Error> {
    parse_units(value, ETHER_DECIMALS)
}

/// Format wei as an ether amount.
pub fn format_ether(value: u128) -> String {
    trim_fraction(&utils::format_ether(U256::from(value)))
}

/// Format wei as ether with exactly `places` fractional digits, rounding half up.
pub fn format_fixed(value: u128, places: u8) -> String {
    let places = places.min(ETHER_DECIMALS);
    let step = U256::from(10u8).pow(U256::from(ETHER_DECIMALS - places));
    let rounded = (U256::from(value) + step / U256::from(2u8)) / step;

    let text = utils::format_ether(rounded * step);
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));
    if places == 0 {
        return whole.to_string();
    }
    let frac: String = frac.chars().chain(std::iter::repeat('0')).take(usize::from(places)).collect();
    format!("{whole}.{frac}")
}

fn trim_fraction(text: &str) -> String {
    match text.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => format!("{text}.0"),
    }
}

// region:    --- Error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Empty,
    Negative(String),
    Invalid(String),
    TooPrecise(String),
    Overflow(String),
    Decimals(u8),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Empty => write!(fmt, "amount is empty"),
            Error::Negative(v) => write!(fmt, "amount {v} is negative"),
            Error::Invalid(v) => write!(fmt, "amount {v} is not a decimal number"),
            Error::TooPrecise(v) => write!(fmt, "amount {v} has too many decimal places"),
            Error::Overflow(v) => write!(fmt, "amount {v} is too large"),
            Error::Decimals(d) => write!(fmt, "{d} decimals is not a valid unit"),
        }
    }
}

impl std::error::Error for Error {}
// endregion: --- Error

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn parses_decimal_ether() {
        assert_eq!(parse_ether("1").unwrap(), ONE_ETHER);
        assert_eq!(parse_ether("0.01").unwrap(), ONE_ETHER / 100);
        assert_eq!(parse_ether(".5").unwrap(), ONE_ETHER / 2);
        assert_eq!(parse_ether("2.").unwrap(), 2 * ONE_ETHER);
        assert_eq!(parse_ether(" 0.000000000000000001 ").unwrap(), 1);
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert_eq!(parse_ether(""), Err(Error::Empty));
        assert_eq!(parse_ether("-1"), Err(Error::Negative("-1".into())));
        assert!(matches!(parse_ether("1e18"), Err(Error::Invalid(_))));
        assert!(matches!(parse_ether("1.2.3"), Err(Error::Invalid(_))));
        assert!(matches!(parse_ether("."), Err(Error::Invalid(_))));
        assert!(matches!(parse_ether("0.0000000000000000001"), Err(Error::TooPrecise(_))));
        assert!(matches!(
            parse_ether("999999999999999999999999999999"),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn integer_summation_has_no_drift() {
        let total: u128 = ["0.1", "0.2", "0.05"]
            .iter()
            .map(|a| parse_ether(a).unwrap())
            .sum();
        assert_eq!(format_ether(total), "0.35");
    }

    #[test]
    fn formats_like_ethers() {
        assert_eq!(format_ether(0), "0.0");
        assert_eq!(format_ether(ONE_ETHER), "1.0");
        assert_eq!(format_ether(ONE_ETHER + ONE_ETHER / 4), "1.25");
        assert_eq!(format_ether(1), "0.000000000000000001");
    }

    #[test]
    fn fixed_display_rounds_half_up() {
        assert_eq!(format_fixed(ONE_ETHER * 35 / 100, 4), "0.3500");
        assert_eq!(format_fixed(123_450_000_000_000_000, 4), "0.1235");
        assert_eq!(format_fixed(123_449_999_999_999_999, 4), "0.1234");
        assert_eq!(format_fixed(ONE_ETHER * 3 / 2, 0), "2");
    }

    #[test]
    fn other_unit_sizes() {
        assert_eq!(parse_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(format_units(1_500_000, 6).unwrap(), "1.5");
        assert_eq!(format_units(7, 0).unwrap(), "7.0");
        assert_eq!(format_units(1, 90), Err(Error::Decimals(90)));
        assert_eq!(parse_units("1", 90), Err(Error::Decimals(90)));
    }
}
