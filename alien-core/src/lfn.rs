// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logical file names, the hierarchical paths of the catalogue namespace.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::file::Permissions;
use crate::guid::Guid;

/// Placeholder written into envelopes when no logical name points at a GUID.
pub const NO_LFN: &str = "/NOLFN";

/// Canonical, absolute catalogue path.
///
/// Canonical form has exactly one leading `/`, no repeated slashes and no trailing slash (except
/// for the root itself).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Lfn(String);

impl Lfn {
    pub fn new(path: &str) -> Result<Self, LfnError> {
        let path = path.trim();

        if path.is_empty() {
            return Err(LfnError::Empty);
        }

        if !path.starts_with('/') {
            return Err(LfnError::NotAbsolute(path.to_string()));
        }

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(LfnError::RelativeSegment(path.to_string()));
        }

        Ok(Self(format!("/{}", segments.join("/"))))
    }

    /// Canonical path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical path without the leading slash, used when appending to storage endpoints.
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Last path segment, `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }

        self.0.rsplit('/').next()
    }

    /// Enclosing directory, `None` for the root.
    pub fn parent(&self) -> Option<Lfn> {
        if self.is_root() {
            return None;
        }

        match self.0.rfind('/') {
            Some(0) => Some(Lfn("/".to_string())),
            Some(index) => Some(Lfn(self.0[..index].to_string())),
            None => None,
        }
    }

    pub fn join(&self, name: &str) -> Result<Lfn, LfnError> {
        Lfn::new(&format!("{}/{}", self.0, name))
    }
}

impl FromStr for Lfn {
    type Err = LfnError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::new(value)
    }
}

impl TryFrom<String> for Lfn {
    type Error = LfnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Lfn> for String {
    fn from(value: Lfn) -> Self {
        value.0
    }
}

impl fmt::Display for Lfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Lfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lfn").field(&self.0).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
}

/// A catalogue entry: a path bound to a GUID (regular files) or a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalName {
    pub lfn: Lfn,
    pub kind: EntryKind,
    /// Always `None` for directories.
    pub guid: Option<Guid>,
    pub owner: String,
    pub gowner: String,
    pub perm: Permissions,
}

impl LogicalName {
    pub fn file(lfn: Lfn, guid: Guid, owner: &str, gowner: &str, perm: Permissions) -> Self {
        Self {
            lfn,
            kind: EntryKind::File,
            guid: Some(guid),
            owner: owner.to_string(),
            gowner: gowner.to_string(),
            perm,
        }
    }

    pub fn directory(lfn: Lfn, owner: &str, gowner: &str, perm: Permissions) -> Self {
        Self {
            lfn,
            kind: EntryKind::Directory,
            guid: None,
            owner: owner.to_string(),
            gowner: gowner.to_string(),
            perm,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LfnError {
    #[error("logical file name is empty")]
    Empty,

    #[error("logical file name '{0}' is not an absolute path")]
    NotAbsolute(String),

    #[error("logical file name '{0}' contains relative segments")]
    RelativeSegment(String),
}
