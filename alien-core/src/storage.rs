// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage elements, the named physical endpoints replicas live on.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::guid::Guid;
use crate::lfn::Lfn;

/// Numeric identifier of a storage element in the catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeNumber(pub u32);

impl fmt::Display for SeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of the storage element stand-in for replicas without a registered storage element.
pub const NO_SE: &str = "no_se";

/// Envelope protection a storage element expects from us.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopePolicy {
    /// Integrity-protected `&`-delimited envelope, readable by anyone.
    Signed,

    /// Envelope encrypted towards the storage element.
    Encrypted,

    /// JWT bearer token.
    Token,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageElement {
    pub id: SeNumber,
    /// Fully qualified name, for example `ALICE::CERN::EOS`.
    pub name: String,
    /// Transport endpoint, for example `root://eos.cern.ch:1094`.
    pub seio_daemons: String,
    /// Directory below the endpoint which holds the GUID tree.
    pub storage_path: String,
    /// Quality-of-service tags (`disk`, `tape`, ...).
    #[serde(default)]
    pub qos: Vec<String>,
    /// When non-empty only these users may read from this storage element.
    #[serde(default)]
    pub exclusive_read: Vec<String>,
    /// When non-empty only these users may write to this storage element.
    #[serde(default)]
    pub exclusive_write: Vec<String>,
    /// Ranking penalty added to the site distance when sorting for reading.
    #[serde(default)]
    pub demote_read: f64,
    #[serde(default)]
    pub needs_encrypted_envelope: bool,
    #[serde(default)]
    pub needs_scitokens_envelope: bool,
}

impl StorageElement {
    pub fn new(id: u32, name: &str, seio_daemons: &str, storage_path: &str) -> Self {
        Self {
            id: SeNumber(id),
            name: name.to_string(),
            seio_daemons: seio_daemons.to_string(),
            storage_path: storage_path.to_string(),
            qos: Vec::new(),
            exclusive_read: Vec::new(),
            exclusive_write: Vec::new(),
            demote_read: 0.0,
            needs_encrypted_envelope: false,
            needs_scitokens_envelope: false,
        }
    }

    /// Stand-in for a storage element number the catalogue has no entry for, such as the `0` of
    /// archive members. It has no endpoint and no access restrictions.
    pub fn unregistered(id: SeNumber) -> Self {
        Self::new(id.0, NO_SE, "", "/")
    }

    pub fn with_qos(mut self, tags: &[&str]) -> Self {
        self.qos = tags.iter().map(|tag| tag.to_lowercase()).collect();
        self
    }

    pub fn with_encrypted_envelope(mut self) -> Self {
        self.needs_encrypted_envelope = true;
        self
    }

    pub fn with_scitokens_envelope(mut self) -> Self {
        self.needs_scitokens_envelope = true;
        self
    }

    /// Site part of the name: `ALICE::CERN::EOS` and `CERN::EOS` both belong to `CERN`.
    pub fn site(&self) -> &str {
        let parts: Vec<&str> = self.name.split("::").collect();
        match parts.len() {
            0 | 1 => &self.name,
            2 => parts[0],
            _ => parts[1],
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.trim())
    }

    /// dCache endpoints address files by logical name instead of physical location.
    ///
    /// The match on `DCACHE` is case-sensitive.
    pub fn is_dcache(&self) -> bool {
        self.name.contains("DCACHE")
    }

    pub fn has_qos(&self, tag: &str) -> bool {
        self.qos.iter().any(|qos| qos.eq_ignore_ascii_case(tag))
    }

    /// Security requirement for envelopes sent to this storage element.
    ///
    /// Encryption wins over tokens, which win over plain signing.
    pub fn envelope_policy(&self) -> EnvelopePolicy {
        if self.needs_encrypted_envelope {
            EnvelopePolicy::Encrypted
        } else if self.needs_scitokens_envelope {
            EnvelopePolicy::Token
        } else {
            EnvelopePolicy::Signed
        }
    }

    /// Name-based URL of a logical file on this endpoint.
    pub fn name_based_url(&self, lfn: &Lfn) -> String {
        format!(
            "{}/{}",
            self.seio_daemons.trim_end_matches('/'),
            lfn.relative()
        )
    }

    /// Location of a new replica of `guid` on this storage element.
    pub fn generate_pfn(&self, guid: &Guid) -> String {
        let storage_path = self.storage_path.trim_end_matches('/');
        let storage_path = if storage_path.starts_with('/') {
            storage_path.to_string()
        } else {
            format!("/{storage_path}")
        };

        format!(
            "{}/{}/{}",
            self.seio_daemons.trim_end_matches('/'),
            storage_path,
            guid.storage_path()
        )
    }

    pub fn may_read(&self, user: &str) -> bool {
        self.exclusive_read.is_empty() || self.exclusive_read.iter().any(|name| name == user)
    }

    pub fn may_write(&self, user: &str) -> bool {
        self.exclusive_write.is_empty() || self.exclusive_write.iter().any(|name| name == user)
    }
}
