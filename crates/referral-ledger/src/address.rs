use std::{fmt, str::FromStr};

use ed25519_dalek::VerifyingKey;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// A 20-byte account identifier, rendered as `0x`-prefixed lowercase hex.
///
/// The all-zero value is reserved as [`Address::NULL`]. It can hold points
/// like any other account, but it is never a known address and never a valid
/// endpoint of a referral.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; Address::LENGTH]);

impl Address {
    pub const LENGTH: usize = 20;

    pub const NULL: Address = Address([0u8; Self::LENGTH]);

    pub const fn from_array(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Derive the address controlled by an Ed25519 key: the last 20 bytes of
    /// `sha256(public_key)`.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
        let mut bytes = [0u8; Self::LENGTH];
        bytes.copy_from_slice(&digest[32 - Self::LENGTH..]);
        Self(bytes)
    }

    /// Mock address for tests: all zero except the last byte.
    pub const fn mock(index: u8) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[Self::LENGTH - 1] = index;
        Self(bytes)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AddressParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("address must be {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let raw = hex::decode(digits)?;
        let bytes: [u8; Self::LENGTH] =
            raw.as_slice()
                .try_into()
                .map_err(|_| AddressParseError::Length {
                    expected: Self::LENGTH,
                    actual: raw.len(),
                })?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Address::from_str(&encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ed25519_dalek::SigningKey;

    #[test]
    fn parses_with_and_without_prefix() {
        let addr = Address::mock(7);
        let rendered = addr.to_string();
        assert_eq!(rendered, "0x0000000000000000000000000000000000000007");
        assert_eq!(Address::from_str(&rendered).unwrap(), addr);
        assert_eq!(Address::from_str(&rendered[2..]).unwrap(), addr);
    }

    #[test]
    fn null_is_the_all_zero_array() {
        assert_eq!(Address::from_array([0u8; Address::LENGTH]), Address::NULL);
        assert!(Address::NULL.is_null());

        let mut bytes = [0u8; Address::LENGTH];
        bytes[Address::LENGTH - 1] = 7;
        assert_eq!(Address::from_array(bytes), Address::mock(7));
        assert_eq!(Address::mock(7).as_bytes(), &bytes);
    }

    #[test]
    fn rejects_wrong_length() {
        match Address::from_str("0xdeadbeef") {
            Err(AddressParseError::Length { expected, actual }) => {
                assert_eq!(expected, 20);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            Address::from_str("0xzz"),
            Err(AddressParseError::Hex(_))
        ));
    }

    #[test]
    fn key_derivation_is_stable_and_not_null() {
        let sk = SigningKey::from_bytes(&[9u8; 32]);
        let a = Address::from_verifying_key(&sk.verifying_key());
        let b = Address::from_verifying_key(&sk.verifying_key());
        assert_eq!(a, b);
        assert!(!a.is_null());
    }

    #[test]
    fn serializes_as_hex_string() {
        let json = serde_json::to_string(&Address::mock(1)).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000000000000001\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Address::mock(1));
    }
}
