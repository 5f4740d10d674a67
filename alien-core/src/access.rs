// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of access a ticket grants on a physical replica.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    /// Permission to read the replica.
    Read,

    /// Permission to upload the replica.
    Write,

    /// Permission to remove the replica from its storage element.
    Delete,
}

impl AccessType {
    /// Lower-case name used in `&`-delimited envelopes and token scopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Read => "read",
            AccessType::Write => "write",
            AccessType::Delete => "delete",
        }
    }

    /// Name used in XML envelopes, where writes are only ever allowed once.
    pub fn legacy_str(&self) -> &'static str {
        match self {
            AccessType::Write => "write-once",
            _ => self.as_str(),
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, AccessType::Read)
    }

    pub fn is_write(&self) -> bool {
        matches!(self, AccessType::Write)
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, AccessType::Delete)
    }
}

impl Display for AccessType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccessType {
    type Err = AccessTypeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "read" => Ok(AccessType::Read),
            "write" | "write-once" => Ok(AccessType::Write),
            "delete" => Ok(AccessType::Delete),
            _ => Err(AccessTypeError(value.to_string())),
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown access type '{0}'")]
pub struct AccessTypeError(pub String);
