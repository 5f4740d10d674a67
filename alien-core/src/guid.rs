// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Size of a GUID in bytes.
pub const GUID_LEN: usize = 16;

/// 128-bit identifier of file content, independent of any logical name pointing at it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Guid(Uuid);

impl Guid {
    /// Generate a new random (v4) GUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `Guid` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; GUID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Bytes of the GUID.
    pub fn as_bytes(&self) -> &[u8; GUID_LEN] {
        self.0.as_bytes()
    }

    /// Relative location of this GUID below a storage element's root directory.
    ///
    /// Files are spread over two directory levels (`NN/NNNNN/<guid>`) derived from the GUID
    /// itself so the same GUID always lands in the same folder on every storage element.
    pub fn storage_path(&self) -> String {
        let (msb, lsb) = self.0.as_u64_pair();
        let folded = msb ^ lsb;
        let hash = ((folded >> 32) as u32 ^ folded as u32) as u64;
        format!("{:02}/{:05}/{}", hash % 16, hash % 100_000, self)
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for Guid {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<Guid> for Uuid {
    fn from(value: Guid) -> Self {
        value.0
    }
}

impl From<[u8; GUID_LEN]> for Guid {
    fn from(value: [u8; GUID_LEN]) -> Self {
        Self::from_bytes(value)
    }
}

impl TryFrom<&[u8]> for Guid {
    type Error = GuidError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let value_len = value.len();

        let checked_value: [u8; GUID_LEN] = value
            .try_into()
            .map_err(|_| GuidError::InvalidLength(value_len, GUID_LEN))?;

        Ok(Self::from_bytes(checked_value))
    }
}

impl FromStr for Guid {
    type Err = GuidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(value.trim())?))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guid").field(&self.to_string()).finish()
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
        let value = String::deserialize(deserializer)?;
        value
            .parse()
            .map_err(|err: GuidError| serde::de::Error::custom(err.to_string()))
    }
}

/// Error types for `Guid` struct.
#[derive(Error, Debug)]
pub enum GuidError {
    /// GUID bytes have an invalid length.
    #[error("invalid guid length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    /// GUID string is not a valid UUID.
    #[error("invalid guid string: {0}")]
    InvalidString(#[from] uuid::Error),
}
