//! Address syntax validation and EIP-55 checksums.

use crate::error::{CommonError, Result};
use crate::types::{Address, ADDRESS_LENGTH};
use keccak_hash::keccak;

/// Parse an account address.
///
/// Accepts an optional `0x` prefix followed by exactly 40 hex digits. Digits that are
/// all lowercase or all uppercase carry no checksum and are taken as-is; mixed case must
/// match the EIP-55 checksum exactly.
pub fn parse_address(raw: &str) -> Result<Address> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);

    if digits.len() != ADDRESS_LENGTH * 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CommonError::InvalidAddress(format!(
            "expected 40 hex digits, got {:?}",
            raw
        )));
    }

    let bytes = hex::decode(digits).map_err(|e| CommonError::InvalidAddress(e.to_string()))?;
    let address = Address::from_slice(&bytes)
        .ok_or_else(|| CommonError::InvalidAddress("wrong length".to_string()))?;

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && checksum_digits(&digits.to_ascii_lowercase()) != digits {
        return Err(CommonError::InvalidAddress(format!("bad checksum: {}", raw)));
    }

    Ok(address)
}

/// Cheap boolean form of [`parse_address`].
pub fn is_address(raw: &str) -> bool {
    parse_address(raw).is_ok()
}

/// Render an address in EIP-55 mixed-case form.
pub fn to_checksum(address: &Address) -> String {
    format!("0x{}", checksum_digits(&hex::encode(address.0)))
}

fn checksum_digits(lower: &str) -> String {
    let hash = keccak(lower.as_bytes());

    lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let byte = hash.0[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect()
}
