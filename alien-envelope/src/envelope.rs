// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plaintext access envelopes and how they are built from a granted replica.
use std::fmt;
use std::str::FromStr;

use alien_core::{AccessType, FileIdentity, Guid, Lfn, NO_LFN, Replica, StorageElement};
use thiserror::Error;

use crate::format::{
    BEGIN_ENVELOPE, END_ENVELOPE, EnvelopeParseError, ReceivedEnvelope, escape, xml_escape,
};

/// Name of the field listing the signed keys, repeated as the last token of its own value.
pub const HASHORD: &str = "hashord";

/// Storage element names which plugins know under a different alias.
const SE_RENAMES: &[(&str, &str)] = &[("ALICE::CERN::SETEST", "ALICE::CERN::TESTSE")];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EnvelopeKey {
    Turl,
    Xurl,
    Access,
    Lfn,
    Guid,
    Zguid,
    Size,
    Md5,
    Se,
}

impl EnvelopeKey {
    /// Order in which keys appear in the `&`-delimited format and in `hashord`.
    pub const CANONICAL_ORDER: [EnvelopeKey; 9] = [
        EnvelopeKey::Turl,
        EnvelopeKey::Xurl,
        EnvelopeKey::Access,
        EnvelopeKey::Lfn,
        EnvelopeKey::Guid,
        EnvelopeKey::Zguid,
        EnvelopeKey::Size,
        EnvelopeKey::Md5,
        EnvelopeKey::Se,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKey::Turl => "turl",
            EnvelopeKey::Xurl => "xurl",
            EnvelopeKey::Access => "access",
            EnvelopeKey::Lfn => "lfn",
            EnvelopeKey::Guid => "guid",
            EnvelopeKey::Zguid => "zguid",
            EnvelopeKey::Size => "size",
            EnvelopeKey::Md5 => "md5",
            EnvelopeKey::Se => "se",
        }
    }
}

impl fmt::Display for EnvelopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EnvelopeKey {
    type Err = UnknownEnvelopeKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        EnvelopeKey::CANONICAL_ORDER
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownEnvelopeKey(value.to_string()))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown envelope key '{0}'")]
pub struct UnknownEnvelopeKey(pub String);

/// Unsealed description of one granted access to one replica.
///
/// Fields are kept in canonical order and only keys with a value are present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaintextEnvelope {
    access: AccessType,
    fields: Vec<(EnvelopeKey, String)>,
    /// Path of the replica below its storage endpoint, only carried by the XML format.
    pfn: Option<String>,
}

impl PlaintextEnvelope {
    fn new(access: AccessType, pfn: Option<String>) -> Self {
        Self {
            access,
            fields: vec![(EnvelopeKey::Access, access.as_str().to_string())],
            pfn,
        }
    }

    fn set(&mut self, key: EnvelopeKey, value: impl Into<String>) {
        let value = value.into();
        match self.fields.binary_search_by_key(&key, |(key, _)| *key) {
            Ok(index) => self.fields[index].1 = value,
            Err(index) => self.fields.insert(index, (key, value)),
        }
    }

    /// Rebuild the plaintext from an envelope received in either wire format.
    ///
    /// The `&`-delimited format carries no `pfn`. It is recovered from a location-based `turl`,
    /// name-based envelopes (those with an `xurl`) leave it unknown.
    pub fn from_received(received: &ReceivedEnvelope) -> Result<Self, EnvelopeParseError> {
        let pfn = match received.get("pfn") {
            Some(pfn) => Some(pfn.to_string()),
            None if received.get(EnvelopeKey::Xurl.as_str()).is_some() => None,
            None => received
                .get(EnvelopeKey::Turl.as_str())
                .map(|turl| storage_path(turl).to_string()),
        };
        let mut envelope = Self::new(received.access()?, pfn);

        for key in EnvelopeKey::CANONICAL_ORDER {
            if key == EnvelopeKey::Access {
                continue;
            }

            if let Some(value) = received.get(key.as_str()) {
                envelope.set(key, value);
            }
        }

        Ok(envelope)
    }

    pub fn access(&self) -> AccessType {
        self.access
    }

    pub fn get(&self, key: EnvelopeKey) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn pfn(&self) -> Option<&str> {
        self.pfn.as_deref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (EnvelopeKey, &str)> {
        self.fields.iter().map(|(key, value)| (*key, value.as_str()))
    }

    /// Keys present in this envelope, in the order they are serialized.
    pub fn key_order(&self) -> Vec<EnvelopeKey> {
        self.fields.iter().map(|(key, _)| *key).collect()
    }

    /// Value of the `hashord` field, e.g. `turl-access-lfn-se-hashord`.
    pub fn hashord(&self) -> String {
        let mut hashord = String::new();
        for (key, _) in &self.fields {
            hashord.push_str(key.as_str());
            hashord.push('-');
        }
        hashord.push_str(HASHORD);
        hashord
    }

    /// The `&`-delimited form, terminated by the `hashord` field.
    pub fn to_unsigned(&self) -> String {
        let mut unsigned = String::new();
        for (key, value) in &self.fields {
            unsigned.push_str(key.as_str());
            unsigned.push('=');
            unsigned.push_str(&escape(value));
            unsigned.push('&');
        }
        unsigned.push_str(HASHORD);
        unsigned.push('=');
        unsigned.push_str(&self.hashord());
        unsigned
    }

    /// The legacy XML document, wrapped in envelope markers.
    pub fn to_xml(&self) -> String {
        let mut elements: Vec<(&str, &str)> = vec![("access", self.access.legacy_str())];
        for key in [EnvelopeKey::Turl, EnvelopeKey::Xurl, EnvelopeKey::Lfn] {
            if let Some(value) = self.get(key) {
                elements.push((key.as_str(), value));
            }
        }
        if let Some(pfn) = &self.pfn {
            elements.push(("pfn", pfn.as_str()));
        }
        for key in [
            EnvelopeKey::Size,
            EnvelopeKey::Se,
            EnvelopeKey::Guid,
            EnvelopeKey::Zguid,
            EnvelopeKey::Md5,
        ] {
            if let Some(value) = self.get(key) {
                elements.push((key.as_str(), value));
            }
        }

        let mut xml = format!("{BEGIN_ENVELOPE}\n<authz>\n  <file>\n");
        for (tag, value) in elements {
            xml.push_str(&format!("    <{tag}>{}</{tag}>\n", xml_escape(value)));
        }
        xml.push_str(&format!("  </file>\n</authz>\n{END_ENVELOPE}\n"));
        xml
    }
}

/// Path of a transfer URL below its endpoint: everything after the second `//`, keeping one
/// leading slash, without any `#` anchor.
pub fn storage_path(url: &str) -> &str {
    let url = url.split_once('#').map_or(url, |(url, _)| url);

    let Some((_, after_scheme)) = url.split_once("//") else {
        return url;
    };

    match after_scheme.find("//") {
        Some(index) => &after_scheme[index + 1..],
        None => after_scheme
            .find('/')
            .map_or("/", |index| &after_scheme[index..]),
    }
}

/// Replica an envelope grants access to, together with what the catalogue knows about it.
///
/// When the replica is anchored inside an archive, `file`, `replica` and `lfn` describe the
/// archive container.
#[derive(Clone, Copy, Debug)]
pub struct EnvelopeTarget<'a> {
    pub file: &'a FileIdentity,
    pub replica: &'a Replica,
    pub se: &'a StorageElement,
    pub lfn: Option<&'a Lfn>,
}

/// Member of an archive the client actually asked for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveAnchor {
    pub member_guid: Guid,
    /// File name of the member inside the archive.
    pub member_name: String,
    pub archive_lfn: Option<Lfn>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct EnvelopeBuilder;

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the plaintext envelope. No timestamps are involved, equal inputs give equal
    /// envelopes.
    pub fn build(
        &self,
        access: AccessType,
        target: &EnvelopeTarget<'_>,
        anchor: Option<&ArchiveAnchor>,
    ) -> PlaintextEnvelope {
        let lfn = anchor
            .and_then(|anchor| anchor.archive_lfn.as_ref())
            .or(target.lfn);

        let name_based_url = match lfn {
            Some(lfn) if target.se.is_dcache() => Some(target.se.name_based_url(lfn)),
            _ => None,
        };

        let mut turl = name_based_url
            .clone()
            .unwrap_or_else(|| target.replica.pfn.clone());
        if let Some(anchor) = anchor {
            turl.push('#');
            turl.push_str(&anchor.member_name);
        }

        let mut envelope =
            PlaintextEnvelope::new(access, Some(storage_path(&target.replica.pfn).to_string()));
        envelope.set(EnvelopeKey::Turl, turl);
        if let Some(xurl) = name_based_url {
            envelope.set(EnvelopeKey::Xurl, xurl);
        }
        envelope.set(
            EnvelopeKey::Lfn,
            lfn.map_or(NO_LFN, |lfn| lfn.as_str()),
        );
        envelope.set(EnvelopeKey::Guid, target.file.guid.to_string());
        if let Some(anchor) = anchor {
            envelope.set(EnvelopeKey::Zguid, anchor.member_guid.to_string());
        }
        envelope.set(EnvelopeKey::Size, target.file.size.to_string());
        if let Some(md5) = &target.file.md5 {
            envelope.set(EnvelopeKey::Md5, md5.as_str());
        }
        envelope.set(EnvelopeKey::Se, se_alias(&target.se.name));

        envelope
    }
}

fn se_alias(name: &str) -> &str {
    SE_RENAMES
        .iter()
        .find(|(from, _)| name.eq_ignore_ascii_case(from))
        .map_or(name, |(_, to)| *to)
}
