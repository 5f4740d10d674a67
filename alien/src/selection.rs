// SPDX-License-Identifier: MIT OR Apache-2.0

//! Answering "give me usable access tickets for this file" for reads, writes and deletes.
//!
//! Selection is best-effort across replicas: a denied replica or a replica whose envelope could
//! not be sealed is logged and skipped, the remaining replicas are still granted. Finding nothing
//! to grant is an empty result, not an error. Only failures of the collaborators themselves
//! (catalogue backend, system clock) abort a selection.
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTimeError;

use alien_auth::{AccessRequest, AuthorizationEngine, Principal};
use alien_core::{
    AccessType, ArchiveContainer, ArchiveLink, FileIdentity, Guid, Lfn, LfnError, Replica,
    StorageElement,
};
use alien_envelope::{
    ArchiveAnchor, EnvelopeBuilder, EnvelopeKey, EnvelopeTarget, PlaintextEnvelope, SealContext,
    SealedEnvelope, Sealers, unix_now,
};
use alien_store::{LocatedReplica, ReplicaCatalogue, SiteTopology, StoreError};
use thiserror::Error;
use tracing::{debug, warn};

/// A file addressed either by content identity or by logical name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileRef {
    Guid(Guid),
    Lfn(Lfn),
}

impl FromStr for FileRef {
    type Err = LfnError;

    /// Anything parsing as a GUID is one, everything else must be an absolute logical name.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().parse::<Guid>() {
            Ok(guid) => Ok(FileRef::Guid(guid)),
            Err(_) => Ok(FileRef::Lfn(value.parse()?)),
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRef::Guid(guid) => write!(f, "{guid}"),
            FileRef::Lfn(lfn) => write!(f, "{lfn}"),
        }
    }
}

impl From<Guid> for FileRef {
    fn from(guid: Guid) -> Self {
        FileRef::Guid(guid)
    }
}

impl From<Lfn> for FileRef {
    fn from(lfn: Lfn) -> Self {
        FileRef::Lfn(lfn)
    }
}

/// Number of new replicas wanted per quality-of-service tag, e.g. `disk=2`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QosRequirements(BTreeMap<String, usize>);

impl QosRequirements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tag: &str, count: usize) -> Self {
        if count > 0 {
            *self.0.entry(tag.to_lowercase()).or_default() += count;
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(tag, count)| (tag.as_str(), *count))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for QosRequirements {
    type Err = SelectionError;

    /// Parse `tag=count` pairs separated by commas, e.g. `disk=2,tape=1`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut qos = QosRequirements::new();
        for pair in value.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (tag, count) = pair
                .split_once('=')
                .ok_or_else(|| SelectionError::InvalidQos(pair.to_string()))?;
            let count = count
                .trim()
                .parse()
                .map_err(|_| SelectionError::InvalidQos(pair.to_string()))?;
            qos = qos.with(tag.trim(), count);
        }
        Ok(qos)
    }
}

/// Storage elements to prefer or avoid, by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SePreferences {
    pub prefer: Vec<String>,
    pub exclude: Vec<String>,
}

impl SePreferences {
    pub fn new(prefer: &[&str], exclude: &[&str]) -> Self {
        Self {
            prefer: prefer.iter().map(|name| name.to_string()).collect(),
            exclude: exclude.iter().map(|name| name.to_string()).collect(),
        }
    }

    fn is_excluded(&self, se: &StorageElement) -> bool {
        self.exclude.iter().any(|name| se.is_named(name))
    }
}

/// A granted replica with its access envelope, before and after sealing.
#[derive(Clone, Debug, PartialEq)]
pub struct SealedTicket {
    pub replica: Replica,
    pub se: StorageElement,
    pub envelope: PlaintextEnvelope,
    pub sealed: SealedEnvelope,
}

impl SealedTicket {
    pub fn turl(&self) -> &str {
        self.envelope.get(EnvelopeKey::Turl).unwrap_or_default()
    }
}

/// Orchestrates catalogue lookups, proximity sorting, authorization and sealing.
pub struct ReplicaSelectionService<S, A> {
    store: S,
    auth: A,
    builder: EnvelopeBuilder,
    sealers: Sealers,
}

impl<S, A> ReplicaSelectionService<S, A>
where
    S: ReplicaCatalogue + SiteTopology,
    A: AuthorizationEngine,
{
    pub fn new(store: S, auth: A, sealers: Sealers) -> Self {
        Self {
            store,
            auth,
            builder: EnvelopeBuilder::new(),
            sealers,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read tickets for every replica of `file` the requester may read, closest first.
    ///
    /// Replicas pointing into an archive are granted on the archive's own replicas, provided the
    /// requester may read the archive as well. Those grants follow the file's direct replicas.
    pub fn select_for_read(
        &self,
        file: &FileRef,
        preferences: &SePreferences,
        requester: &Principal,
    ) -> Result<Vec<SealedTicket>, SelectionError> {
        let Some((identity, lfn)) = self.resolve(file)? else {
            return Ok(Vec::new());
        };

        let replicas = self.store.get_replicas(&identity.guid)?;
        if replicas.is_empty() {
            warn!(file = %file, guid = %identity.guid, "file has no replicas");
            return Ok(Vec::new());
        }

        // Archive members are addressed through the archive's replicas, not their own storage
        // element, so they bypass proximity sorting and storage element resolution.
        let mut direct = Vec::with_capacity(replicas.len());
        let mut links = Vec::new();
        for replica in replicas {
            match replica.archive_link() {
                Ok(None) => direct.push(replica),
                Ok(Some(link)) => links.push((replica, link)),
                Err(err) => {
                    warn!(pfn = %replica.pfn, %err, "skipping replica with invalid archive link");
                }
            }
        }

        let context = SealContext::new(unix_now()?, &requester.name);
        let mut granted = Grants::default();

        for located in self.sort(direct, requester, preferences)? {
            if let Some(reason) = self.deny(requester, &identity, &located, AccessType::Read) {
                debug!(pfn = %located.replica.pfn, se = %located.se.name, %reason, "skipping replica");
                continue;
            }

            let target = EnvelopeTarget {
                file: &identity,
                replica: &located.replica,
                se: &located.se,
                lfn: lfn.as_ref(),
            };
            let envelope = self.builder.build(AccessType::Read, &target, None);
            granted.push(self.seal(located, envelope, &context));
        }

        for (replica, link) in links {
            let se = self
                .store
                .resolve_se(replica.se)?
                .unwrap_or_else(|| StorageElement::unregistered(replica.se));
            let located = LocatedReplica { replica, se };
            if let Some(reason) = self.deny(requester, &identity, &located, AccessType::Read) {
                debug!(pfn = %located.replica.pfn, %reason, "skipping archive member");
                continue;
            }

            for ticket in self.select_archive(&identity, &link, preferences, requester, &context)? {
                granted.push(Some(ticket));
            }
        }

        Ok(granted.finish(file, AccessType::Read))
    }

    /// Write tickets for new replicas of `file` at `lfn`.
    ///
    /// Target storage elements are the preferred ones first, followed by the closest storage
    /// elements satisfying each quality-of-service tag. Excluded storage elements and those
    /// already holding a replica of the file are never chosen.
    pub fn select_for_write(
        &self,
        lfn: &Lfn,
        file: &FileIdentity,
        preferences: &SePreferences,
        qos: &QosRequirements,
        requester: &Principal,
    ) -> Result<Vec<SealedTicket>, SelectionError> {
        if let Some(existing) = self.store.lookup_lfn(lfn)? {
            if existing.guid != Some(file.guid) {
                warn!(%lfn, "logical name is already taken");
                return Ok(Vec::new());
            }
        } else {
            let Some(parent) = lfn.parent().map(|parent| self.store.lookup_lfn(&parent)) else {
                warn!(%lfn, "cannot write to the root directory");
                return Ok(Vec::new());
            };
            let Some(parent) = parent? else {
                warn!(%lfn, "parent directory does not exist");
                return Ok(Vec::new());
            };
            if let Some(reason) = self.auth.can_create(requester, &parent) {
                warn!(%lfn, %reason, "cannot create file");
                return Ok(Vec::new());
            }
        }

        let taken: HashSet<_> = self
            .store
            .get_replicas(&file.guid)?
            .into_iter()
            .map(|replica| replica.se)
            .collect();

        let mut candidates: Vec<StorageElement> = Vec::new();
        let consider = |se: StorageElement, candidates: &mut Vec<StorageElement>| {
            if preferences.is_excluded(&se)
                || taken.contains(&se.id)
                || candidates.iter().any(|candidate| candidate.id == se.id)
            {
                return false;
            }
            candidates.push(se);
            true
        };

        for name in &preferences.prefer {
            match self.store.se_by_name(name)? {
                Some(se) => {
                    consider(se, &mut candidates);
                }
                None => warn!(se = %name, "ignoring unknown storage element"),
            }
        }

        for (tag, count) in qos.iter() {
            let ses = self.store.sort_ses_by_proximity(
                self.store.ses_with_qos(tag)?,
                requester.site.as_deref(),
                &[],
                &preferences.exclude,
            );
            let mut found = 0;
            for se in ses {
                if found == count {
                    break;
                }
                if consider(se, &mut candidates) {
                    found += 1;
                }
            }
            if found < count {
                warn!(qos = %tag, wanted = count, found, "not enough storage elements");
            }
        }

        let context = SealContext::new(unix_now()?, &requester.name);
        let mut granted = Grants::default();

        for se in candidates {
            let replica = Replica::new(file.guid, se.id, &se.generate_pfn(&file.guid));
            let located = LocatedReplica { replica, se };
            if let Some(reason) = self.deny(requester, file, &located, AccessType::Write) {
                debug!(se = %located.se.name, %reason, "skipping storage element");
                continue;
            }

            let target = EnvelopeTarget {
                file,
                replica: &located.replica,
                se: &located.se,
                lfn: Some(lfn),
            };
            let envelope = self.builder.build(AccessType::Write, &target, None);
            granted.push(self.seal(located, envelope, &context));
        }

        Ok(granted.finish(&FileRef::Lfn(lfn.clone()), AccessType::Write))
    }

    /// Delete tickets for every replica of `file` the requester may delete, in catalogue order.
    ///
    /// Archive members have no physical file of their own and are skipped.
    pub fn select_for_delete(
        &self,
        file: &FileRef,
        requester: &Principal,
    ) -> Result<Vec<SealedTicket>, SelectionError> {
        let Some((identity, lfn)) = self.resolve(file)? else {
            return Ok(Vec::new());
        };

        let replicas = self.store.get_replicas(&identity.guid)?;
        if replicas.is_empty() {
            warn!(file = %file, guid = %identity.guid, "file has no replicas");
            return Ok(Vec::new());
        }

        let context = SealContext::new(unix_now()?, &requester.name);
        let mut granted = Grants::default();

        for replica in replicas {
            if !matches!(replica.archive_link(), Ok(None)) {
                debug!(pfn = %replica.pfn, "skipping archive member");
                continue;
            }

            let Some(se) = self.store.resolve_se(replica.se)? else {
                warn!(se = %replica.se, pfn = %replica.pfn, "skipping replica on unknown storage element");
                continue;
            };
            let located = LocatedReplica { replica, se };

            if let Some(reason) = self.deny(requester, &identity, &located, AccessType::Delete) {
                debug!(pfn = %located.replica.pfn, %reason, "skipping replica");
                continue;
            }

            let target = EnvelopeTarget {
                file: &identity,
                replica: &located.replica,
                se: &located.se,
                lfn: lfn.as_ref(),
            };
            let envelope = self.builder.build(AccessType::Delete, &target, None);
            granted.push(self.seal(located, envelope, &context));
        }

        Ok(granted.finish(file, AccessType::Delete))
    }

    /// Find the file identity and the logical name to put into envelopes.
    fn resolve(&self, file: &FileRef) -> Result<Option<(FileIdentity, Option<Lfn>)>, SelectionError> {
        let (guid, lfn) = match file {
            FileRef::Guid(guid) => (*guid, self.store.get_lfns(guid)?.into_iter().next()),
            FileRef::Lfn(lfn) => {
                let Some(entry) = self.store.lookup_lfn(lfn)? else {
                    warn!(%lfn, "no such file");
                    return Ok(None);
                };
                let Some(guid) = entry.guid else {
                    warn!(%lfn, "directories have no replicas");
                    return Ok(None);
                };
                (guid, Some(entry.lfn))
            }
        };

        match self.store.get_file(&guid)? {
            Some(identity) => Ok(Some((identity, lfn))),
            None => {
                warn!(%file, %guid, "file identity is not registered");
                Ok(None)
            }
        }
    }

    fn sort(
        &self,
        replicas: Vec<Replica>,
        requester: &Principal,
        preferences: &SePreferences,
    ) -> Result<Vec<LocatedReplica>, StoreError> {
        self.store.sort_by_proximity(
            replicas,
            requester.site.as_deref(),
            &preferences.prefer,
            &preferences.exclude,
        )
    }

    /// Grants for the member `link.member` of an archive, one per readable archive replica.
    fn select_archive(
        &self,
        member: &FileIdentity,
        link: &ArchiveLink,
        preferences: &SePreferences,
        requester: &Principal,
        context: &SealContext<'_>,
    ) -> Result<Vec<SealedTicket>, SelectionError> {
        let container = match &link.container {
            ArchiveContainer::Guid(guid) => Some(*guid),
            ArchiveContainer::Location(pfn) => self.store.guid_for_pfn(pfn)?,
        };
        let Some(archive) = container
            .map(|guid| self.store.get_file(&guid))
            .transpose()?
            .flatten()
        else {
            warn!(guid = %member.guid, member = %link.member, "archive of member is not registered");
            return Ok(Vec::new());
        };

        let anchor = ArchiveAnchor {
            member_guid: member.guid,
            member_name: link.member.clone(),
            archive_lfn: self.store.get_lfns(&archive.guid)?.into_iter().next(),
        };

        let mut tickets = Vec::new();
        let replicas = self.store.get_replicas(&archive.guid)?;
        for located in self.sort(replicas, requester, preferences)? {
            if let Some(reason) = self.deny(requester, &archive, &located, AccessType::Read) {
                debug!(pfn = %located.replica.pfn, %reason, "skipping archive replica");
                continue;
            }

            // Archives nested in archives are not supported.
            if !matches!(located.replica.archive_link(), Ok(None)) {
                continue;
            }

            let target = EnvelopeTarget {
                file: &archive,
                replica: &located.replica,
                se: &located.se,
                lfn: anchor.archive_lfn.as_ref(),
            };
            let envelope = self.builder.build(AccessType::Read, &target, Some(&anchor));
            if let Some(ticket) = self.seal(located, envelope, context) {
                tickets.push(ticket);
            }
        }

        if tickets.is_empty() {
            debug!(guid = %member.guid, archive = %archive.guid, "archive is not readable");
        }

        Ok(tickets)
    }

    fn deny(
        &self,
        requester: &Principal,
        file: &FileIdentity,
        located: &LocatedReplica,
        access: AccessType,
    ) -> Option<String> {
        self.auth.fill_access(
            requester,
            &AccessRequest {
                file,
                replica: &located.replica,
                se: &located.se,
                access,
            },
        )
    }

    fn seal(
        &self,
        located: LocatedReplica,
        envelope: PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Option<SealedTicket> {
        match self.sealers.seal(&located.se, &envelope, context) {
            Ok(sealed) => Some(SealedTicket {
                replica: located.replica,
                se: located.se,
                envelope,
                sealed,
            }),
            Err(err) => {
                warn!(pfn = %located.replica.pfn, se = %located.se.name, %err, "could not seal envelope");
                None
            }
        }
    }
}

/// Collects sealed tickets, granting every transfer URL once.
#[derive(Default)]
struct Grants {
    tickets: Vec<SealedTicket>,
    turls: HashSet<String>,
}

impl Grants {
    fn push(&mut self, ticket: Option<SealedTicket>) {
        let Some(ticket) = ticket else {
            return;
        };

        if self.turls.insert(ticket.turl().to_string()) {
            self.tickets.push(ticket);
        } else {
            debug!(turl = %ticket.turl(), "dropping duplicate grant");
        }
    }

    fn finish(self, file: &FileRef, access: AccessType) -> Vec<SealedTicket> {
        if self.tickets.is_empty() {
            warn!(%file, %access, "no usable replica");
        }
        self.tickets
    }
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not read system time: {0}")]
    Clock(#[from] SystemTimeError),

    #[error("invalid quality-of-service requirement '{0}'")]
    InvalidQos(String),
}
