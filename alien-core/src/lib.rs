// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value types shared by the catalogue, authorization and envelope crates.
//!
//! All types are plain, immutable values keyed by ids. A [`Replica`] only knows the [`Guid`] of
//! the file it holds and the [`SeNumber`] of its storage element; every other relationship is
//! resolved through explicit catalogue lookups.
pub mod access;
pub mod file;
pub mod guid;
pub mod lfn;
pub mod replica;
pub mod storage;

pub use access::{AccessType, AccessTypeError};
pub use file::{FileIdentity, PermissionClass, Permissions, PermissionsError};
pub use guid::{Guid, GuidError};
pub use lfn::{EntryKind, Lfn, LfnError, LogicalName, NO_LFN};
pub use replica::{ArchiveContainer, ArchiveLink, Replica, ReplicaError};
pub use storage::{EnvelopePolicy, NO_SE, SeNumber, StorageElement};
