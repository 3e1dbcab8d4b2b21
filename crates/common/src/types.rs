use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const HASH_LENGTH: usize = 32;
pub const ADDRESS_LENGTH: usize = 20;

// --- NewTypes ---

/// 20-byte account identifier on an EVM chain.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != ADDRESS_LENGTH {
            return None;
        }
        let mut arr = [0u8; ADDRESS_LENGTH];
        arr.copy_from_slice(bytes);
        Some(Address(arr))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Lowercase `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::address::to_checksum(self))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&crate::address::to_checksum(self))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        crate::address::parse_address(&s).map_err(serde::de::Error::custom)
    }
}

/// Keccak-256 transaction hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TxHash(pub [u8; HASH_LENGTH]);

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for TxHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        if bytes.len() != HASH_LENGTH {
            return Err(serde::de::Error::custom("Invalid hash length"));
        }
        let mut arr = [0u8; HASH_LENGTH];
        arr.copy_from_slice(&bytes);
        Ok(TxHash(arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_from_slice() {
        assert!(Address::from_slice(&[1u8; 19]).is_none());
        let addr = Address::from_slice(&[0xabu8; 20]).unwrap();
        assert_eq!(addr.to_hex(), format!("0x{}", "ab".repeat(20)));
        assert!(!addr.is_zero());
        assert!(Address::default().is_zero());
    }

    #[test]
    fn test_address_serde_uses_checksum() {
        let addr = crate::address::parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\"");

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_tx_hash_display() {
        let hash = TxHash([0x11; HASH_LENGTH]);
        assert_eq!(hash.to_string(), format!("0x{}", "11".repeat(32)));

        let json = serde_json::to_string(&hash).unwrap();
        let back: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
