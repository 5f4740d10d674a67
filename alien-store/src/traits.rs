// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for read-only queries on catalogue and topology state.
use alien_core::{FileIdentity, Guid, Lfn, LogicalName, Replica, SeNumber, StorageElement};
use thiserror::Error;
use tracing::warn;

use crate::proximity::{self, ProximityFilter};

/// Replica together with the storage element it lives on.
#[derive(Clone, Debug, PartialEq)]
pub struct LocatedReplica {
    pub replica: Replica,
    pub se: StorageElement,
}

/// Interface for querying file identities, their replicas and the logical names pointing at
/// them.
pub trait ReplicaCatalogue {
    /// Get the file identity registered under this GUID.
    fn get_file(&self, guid: &Guid) -> Result<Option<FileIdentity>, StoreError>;

    /// Get all replicas of a GUID in catalogue insertion order.
    ///
    /// Returns an empty list when the GUID has no replicas or is unknown.
    fn get_replicas(&self, guid: &Guid) -> Result<Vec<Replica>, StoreError>;

    /// Get all logical names pointing at a GUID.
    fn get_lfns(&self, guid: &Guid) -> Result<Vec<Lfn>, StoreError>;

    /// Look up a catalogue entry (file or directory) by path.
    fn lookup_lfn(&self, lfn: &Lfn) -> Result<Option<LogicalName>, StoreError>;

    /// Find the GUID stored at a physical location.
    fn guid_for_pfn(&self, pfn: &str) -> Result<Option<Guid>, StoreError>;
}

/// Interface for storage-element metadata and site proximity.
pub trait SiteTopology {
    fn resolve_se(&self, id: SeNumber) -> Result<Option<StorageElement>, StoreError>;

    /// Look up a storage element by its (case-insensitive) name.
    fn se_by_name(&self, name: &str) -> Result<Option<StorageElement>, StoreError>;

    /// Network distance between a client site and a storage element, `0.0` meaning "same site".
    ///
    /// Returns `None` if the distance is unknown, such storage elements are ranked last.
    fn distance(&self, site: &str, se: &StorageElement) -> Option<f64>;

    /// All storage elements carrying the given quality-of-service tag.
    fn ses_with_qos(&self, tag: &str) -> Result<Vec<StorageElement>, StoreError>;

    /// Order replicas for a client at `site`.
    ///
    /// Replicas on excluded storage elements are dropped, the rest is ordered by a stable sort:
    /// replicas at the client's site first, then the preferred storage elements in the given
    /// order, then by distance. Replicas whose storage element cannot be resolved are dropped.
    fn sort_by_proximity(
        &self,
        replicas: Vec<Replica>,
        site: Option<&str>,
        include: &[String],
        exclude: &[String],
    ) -> Result<Vec<LocatedReplica>, StoreError> {
        let mut located = Vec::with_capacity(replicas.len());

        for replica in replicas {
            match self.resolve_se(replica.se)? {
                Some(se) => located.push(LocatedReplica { replica, se }),
                None => {
                    warn!(se = %replica.se, pfn = %replica.pfn, "dropping replica on unknown storage element");
                }
            }
        }

        let filter = ProximityFilter::new(site, include, exclude);
        Ok(proximity::sort_by(located, &filter, self, |item| &item.se))
    }

    /// Order storage elements for a client at `site`, same rules as `sort_by_proximity`.
    fn sort_ses_by_proximity(
        &self,
        ses: Vec<StorageElement>,
        site: Option<&str>,
        include: &[String],
        exclude: &[String],
    ) -> Vec<StorageElement> {
        let filter = ProximityFilter::new(site, include, exclude);
        proximity::sort_by(ses, &filter, self, |se| se)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store could not answer the query.
    #[error("catalogue backend failed: {0}")]
    Backend(String),

    /// An entry violates a catalogue invariant.
    #[error("inconsistent catalogue entry: {0}")]
    Inconsistent(String),
}
