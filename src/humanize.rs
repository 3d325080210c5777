//! Human-readable byte sizes for configuration values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid size format: {0}")]
    InvalidFormat(String),

    #[error("invalid unit: {0}")]
    InvalidUnit(String),
}

const UNITS: &[(&str, u64)] = &[
    ("B", 1),
    ("KB", 1 << 10),
    ("MB", 1 << 20),
    ("GB", 1 << 30),
];

/// Byte count that reads and writes as "16MB"-style strings in config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(digits_end);

        let amount: u64 = digits
            .parse()
            .map_err(|_| ParseError::InvalidFormat(s.to_string()))?;

        let unit = unit.trim();
        if unit.is_empty() {
            return Ok(Self(amount));
        }

        let upper = unit.to_ascii_uppercase();
        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == upper || name.trim_end_matches('B') == upper)
            .map(|(_, multiplier)| *multiplier)
            .ok_or_else(|| ParseError::InvalidUnit(unit.to_string()))?;

        Ok(Self(amount * multiplier))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, multiplier) in UNITS.iter().rev() {
            if self.0 >= *multiplier && self.0 % multiplier == 0 {
                return write!(f, "{}{}", self.0 / multiplier, name);
            }
        }
        write!(f, "{}B", self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct SizeVisitor;

        impl serde::de::Visitor<'_> for SizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size string (\"16MB\") or integer")
            }

            fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ByteSize(v))
            }

            fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size cannot be negative"))
            }

            fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_numbers() {
        assert_eq!("4096".parse::<ByteSize>().unwrap().as_u64(), 4096);
    }

    #[test]
    fn parses_suffixed_sizes() {
        assert_eq!("8KB".parse::<ByteSize>().unwrap().as_u64(), 8 << 10);
        assert_eq!("16MB".parse::<ByteSize>().unwrap().as_u64(), 16 << 20);
        assert_eq!("2gb".parse::<ByteSize>().unwrap().as_u64(), 2 << 30);
        assert_eq!("5 M".parse::<ByteSize>().unwrap().as_u64(), 5 << 20);
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<ByteSize>().is_err());
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("5XB".parse::<ByteSize>().is_err());
        assert!("-1KB".parse::<ByteSize>().is_err());
    }

    #[test]
    fn displays_the_largest_exact_unit() {
        assert_eq!(ByteSize(16 << 20).to_string(), "16MB");
        assert_eq!(ByteSize(1024).to_string(), "1KB");
        assert_eq!(ByteSize(1500).to_string(), "1500B");
    }

    #[test]
    fn deserializes_strings_and_integers() {
        #[derive(Deserialize)]
        struct Wrapper {
            size: ByteSize,
        }

        let from_str: Wrapper = serde_json::from_str(r#"{"size": "10MB"}"#).unwrap();
        assert_eq!(from_str.size.as_u64(), 10 << 20);

        let from_int: Wrapper = serde_json::from_str(r#"{"size": 2048}"#).unwrap();
        assert_eq!(from_int.size.as_u64(), 2048);
    }
}
