//! Conversions between decimal ether strings and wei.

use crate::error::{CommonError, Result};

pub const ETHER_DECIMALS: usize = 18;
pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

/// Parse a decimal ether amount such as `"0.01"` into wei.
pub fn parse_ether(value: &str) -> Result<u128> {
    let invalid = |reason: &str| CommonError::InvalidAmount(format!("{:?}: {}", value, reason));

    let trimmed = value.trim();
    let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));

    if whole.is_empty() && frac.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if frac.len() > ETHER_DECIMALS {
        return Err(invalid("too many decimal places"));
    }

    let whole_wei = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .ok()
            .and_then(|w| w.checked_mul(WEI_PER_ETHER))
            .ok_or_else(|| invalid("overflow"))?
    };

    let frac_wei = if frac.is_empty() {
        0
    } else {
        format!("{:0<width$}", frac, width = ETHER_DECIMALS)
            .parse::<u128>()
            .map_err(|_| invalid("not a decimal number"))?
    };

    whole_wei.checked_add(frac_wei).ok_or_else(|| invalid("overflow"))
}

/// Format wei as a decimal ether string, trimming trailing zeros.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let frac = wei % WEI_PER_ETHER;

    if frac == 0 {
        return format!("{}.0", whole);
    }

    let digits = format!("{:0width$}", frac, width = ETHER_DECIMALS);
    format!("{}.{}", whole, digits.trim_end_matches('0'))
}
