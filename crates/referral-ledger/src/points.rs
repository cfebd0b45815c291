use std::{fmt, str::FromStr};

use bnum::types::U256;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// A 256-bit unsigned amount of points.
///
/// Arithmetic is only exposed in checked form; callers decide what an
/// overflow means. Serializes as a decimal string so JSON consumers never
/// lose precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Points(U256);

impl Points {
    pub const ZERO: Points = Points(U256::ZERO);

    pub const MAX: Points = Points(U256::MAX);

    pub const fn new(inner: U256) -> Self {
        Self(inner)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == U256::ZERO
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }

    /// `self - rhs`, or zero if `rhs` is larger.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }

    pub fn into_inner(self) -> U256 {
        self.0
    }
}

impl Default for Points {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for Points {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for Points {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid points amount `{input}`: expected a 256-bit decimal")]
pub struct PointsParseError {
    pub input: String,
}

impl FromStr for Points {
    type Err = PointsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|_| PointsParseError {
                input: trimmed.to_string(),
            })
    }
}

impl Serialize for Points {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Points {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        Points::from_str(&encoded).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_arithmetic_rejects_wrapping() {
        assert_eq!(Points::MAX.checked_add(Points::from(1u64)), None);
        assert_eq!(Points::ZERO.checked_sub(Points::from(1u64)), None);
        assert_eq!(
            Points::from(5u64).checked_sub(Points::from(3u64)),
            Some(Points::from(2u64))
        );
        assert_eq!(
            Points::from(1u64).saturating_sub(Points::from(4u64)),
            Points::ZERO
        );
    }

    #[test]
    fn parses_values_wider_than_u128() {
        let above_u128 = "340282366920938463463374607431768211456";
        let parsed: Points = above_u128.parse().unwrap();
        assert!(parsed > Points::from(u128::MAX));
        assert_eq!(parsed.to_string(), above_u128);
        assert_eq!(parsed.into_inner(), U256::from(u128::MAX) + U256::ONE);
        assert_eq!(Points::new(U256::MAX), Points::MAX);
        assert!("-1".parse::<Points>().is_err());
        assert!("12abc".parse::<Points>().is_err());
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Points::from(42u64)).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Points = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Points::from(42u64));
    }
}
