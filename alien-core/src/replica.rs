// SPDX-License-Identifier: MIT OR Apache-2.0

//! Physical replicas and archive-member indirections.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guid::{Guid, GuidError};
use crate::storage::SeNumber;

const GUID_SCHEME: &str = "guid://";
const ZIP_MARKER: &str = "?ZIP=";

/// One physical copy of a file identity's bytes on one storage element.
///
/// The GUID is a plain id, relationships are resolved through the catalogue.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Replica {
    pub guid: Guid,
    pub se: SeNumber,
    /// Raw location string, `scheme://host[:port]/path`.
    pub pfn: String,
}

impl Replica {
    pub fn new(guid: Guid, se: SeNumber, pfn: &str) -> Self {
        Self {
            guid,
            se,
            pfn: pfn.to_string(),
        }
    }

    /// Returns the archive this replica is packed into, if it is an archive member.
    pub fn archive_link(&self) -> Result<Option<ArchiveLink>, ReplicaError> {
        ArchiveLink::parse(&self.pfn)
    }
}

/// Where the container of an archive member can be found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArchiveContainer {
    /// `guid:///<uuid>?ZIP=<member>`: container is another catalogue entry.
    Guid(Guid),

    /// `<url>?ZIP=<member>`: container is the physical file at `url`.
    Location(String),
}

/// Indirection from an archive member to its container archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveLink {
    pub container: ArchiveContainer,
    /// File name of the member inside the archive.
    pub member: String,
}

impl ArchiveLink {
    pub fn parse(pfn: &str) -> Result<Option<Self>, ReplicaError> {
        let (location, member) = match pfn.find(ZIP_MARKER) {
            Some(index) => (&pfn[..index], Some(&pfn[index + ZIP_MARKER.len()..])),
            None => (pfn, None),
        };

        // Only the first query parameter names the member.
        let member = member.map(|member| member.split('&').next().unwrap_or_default());

        if let Some(rest) = location.strip_prefix(GUID_SCHEME) {
            let member = match member {
                Some(member) if !member.is_empty() => member,
                _ => return Err(ReplicaError::MissingMember(pfn.to_string())),
            };

            let guid: Guid = rest.trim_start_matches('/').parse()?;

            return Ok(Some(Self {
                container: ArchiveContainer::Guid(guid),
                member: member.to_string(),
            }));
        }

        match member {
            Some("") => Err(ReplicaError::MissingMember(pfn.to_string())),
            Some(member) => Ok(Some(Self {
                container: ArchiveContainer::Location(location.to_string()),
                member: member.to_string(),
            })),
            None => Ok(None),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReplicaError {
    #[error("archive link '{0}' does not name a member")]
    MissingMember(String),

    #[error("archive link points at an invalid guid: {0}")]
    InvalidGuid(#[from] GuidError),
}
