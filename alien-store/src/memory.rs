// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory catalogue and topology.
use std::collections::{BTreeMap, HashMap};

use alien_core::{FileIdentity, Guid, Lfn, LogicalName, Replica, SeNumber, StorageElement};

use crate::traits::{ReplicaCatalogue, SiteTopology, StoreError};

/// Distance used between two different sites when none was configured.
pub const DEFAULT_REMOTE_DISTANCE: f64 = 1.0;

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    files: HashMap<Guid, FileIdentity>,
    replicas: HashMap<Guid, Vec<Replica>>,
    names: BTreeMap<Lfn, LogicalName>,
    ses: BTreeMap<SeNumber, StorageElement>,
    distances: HashMap<(String, String), f64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file identity.
    ///
    /// Returns `true` when the insert occurred, or `false` when the GUID already existed and was
    /// overwritten.
    pub fn insert_file(&mut self, file: FileIdentity) -> bool {
        self.files.insert(file.guid, file).is_none()
    }

    /// Insert a replica, keeping insertion order per GUID.
    ///
    /// Returns `false` if the exact same replica was already registered.
    pub fn insert_replica(&mut self, replica: Replica) -> bool {
        let replicas = self.replicas.entry(replica.guid).or_default();
        if replicas.contains(&replica) {
            return false;
        }
        replicas.push(replica);
        true
    }

    pub fn insert_name(&mut self, name: LogicalName) {
        self.names.insert(name.lfn.clone(), name);
    }

    pub fn contains_name(&self, lfn: &Lfn) -> bool {
        self.names.contains_key(lfn)
    }

    pub fn insert_se(&mut self, se: StorageElement) {
        self.ses.insert(se.id, se);
    }

    /// Configure the distance between a client site and the site of a storage element.
    pub fn set_distance(&mut self, site: &str, se_site: &str, distance: f64) {
        self.distances
            .insert((site.to_uppercase(), se_site.to_uppercase()), distance);
    }

    /// Remove a replica, returns `true` if it existed.
    pub fn delete_replica(&mut self, guid: &Guid, pfn: &str) -> bool {
        match self.replicas.get_mut(guid) {
            Some(replicas) => {
                let before = replicas.len();
                replicas.retain(|replica| replica.pfn != pfn);
                before != replicas.len()
            }
            None => false,
        }
    }
}

impl ReplicaCatalogue for MemoryStore {
    fn get_file(&self, guid: &Guid) -> Result<Option<FileIdentity>, StoreError> {
        Ok(self.files.get(guid).cloned())
    }

    fn get_replicas(&self, guid: &Guid) -> Result<Vec<Replica>, StoreError> {
        Ok(self.replicas.get(guid).cloned().unwrap_or_default())
    }

    fn get_lfns(&self, guid: &Guid) -> Result<Vec<Lfn>, StoreError> {
        Ok(self
            .names
            .values()
            .filter(|name| name.guid.as_ref() == Some(guid))
            .map(|name| name.lfn.clone())
            .collect())
    }

    fn lookup_lfn(&self, lfn: &Lfn) -> Result<Option<LogicalName>, StoreError> {
        Ok(self.names.get(lfn).cloned())
    }

    fn guid_for_pfn(&self, pfn: &str) -> Result<Option<Guid>, StoreError> {
        Ok(self
            .replicas
            .values()
            .flatten()
            .find(|replica| replica.pfn == pfn)
            .map(|replica| replica.guid))
    }
}

impl SiteTopology for MemoryStore {
    fn resolve_se(&self, id: SeNumber) -> Result<Option<StorageElement>, StoreError> {
        Ok(self.ses.get(&id).cloned())
    }

    fn se_by_name(&self, name: &str) -> Result<Option<StorageElement>, StoreError> {
        Ok(self.ses.values().find(|se| se.is_named(name)).cloned())
    }

    fn distance(&self, site: &str, se: &StorageElement) -> Option<f64> {
        if se.site().eq_ignore_ascii_case(site) {
            return Some(0.0);
        }

        let key = (site.to_uppercase(), se.site().to_uppercase());
        Some(
            self.distances
                .get(&key)
                .copied()
                .unwrap_or(DEFAULT_REMOTE_DISTANCE),
        )
    }

    fn ses_with_qos(&self, tag: &str) -> Result<Vec<StorageElement>, StoreError> {
        Ok(self
            .ses
            .values()
            .filter(|se| se.has_qos(tag))
            .cloned()
            .collect())
    }
}
