//! Stable identifiers assigned by the authoring tool

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A 128-bit stable event identifier
///
/// Survives renames in the authoring project. The all-zero value means
/// "unset", not "invalid".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(u128);

impl Guid {
    /// The unset identifier
    pub const NULL: Guid = Guid(0);

    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Parse a GUID from a string
    ///
    /// Accepts the braced form `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`, the
    /// same without braces, or 32 bare hex digits. An empty string is the
    /// null GUID.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        s.parse()
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = format!("{:032x}", self.0);
        write!(
            f,
            "{{{}-{}-{}-{}-{}}}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

impl FromStr for Guid {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Guid::NULL);
        }

        let inner = match (trimmed.strip_prefix('{'), trimmed.strip_suffix('}')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => return Err(IdParseError::UnbalancedBraces(s.to_string())),
        };

        let digits: String = inner.chars().filter(|c| *c != '-').collect();
        if digits.len() != 32 {
            return Err(IdParseError::InvalidLength(s.to_string(), digits.len()));
        }

        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdParseError::InvalidHex(s.to_string()));
        }

        u128::from_str_radix(&digits, 16)
            .map(Guid)
            .map_err(|_| IdParseError::InvalidHex(s.to_string()))
    }
}

impl Serialize for Guid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Compact parameter identifier made of two 32-bit words
///
/// This is the wire-level identifier handed to the runtime when setting a
/// parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "(u32, u32)", into = "(u32, u32)")]
pub struct ParamId {
    pub data1: u32,
    pub data2: u32,
}

impl ParamId {
    pub const fn new(data1: u32, data2: u32) -> Self {
        Self { data1, data2 }
    }

    /// Both words packed into one value, `data1` in the high half
    pub const fn as_u64(&self) -> u64 {
        ((self.data1 as u64) << 32) | self.data2 as u64
    }

    pub const fn from_u64(value: u64) -> Self {
        Self {
            data1: (value >> 32) as u32,
            data2: value as u32,
        }
    }
}

impl From<(u32, u32)> for ParamId {
    fn from((data1, data2): (u32, u32)) -> Self {
        Self { data1, data2 }
    }
}

impl From<ParamId> for (u32, u32) {
    fn from(id: ParamId) -> Self {
        (id.data1, id.data2)
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}:{:08x}", self.data1, self.data2)
    }
}

/// Errors that can occur when parsing identifiers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("unbalanced braces in GUID: '{0}'")]
    UnbalancedBraces(String),

    #[error("GUID '{0}' has {1} hex digits (expected 32)")]
    InvalidLength(String, usize),

    #[error("invalid hex digits in GUID: '{0}'")]
    InvalidHex(String),
}
