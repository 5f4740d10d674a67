// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-replica authorization checks, independent of how a grant is sealed afterwards.
use std::time::{SystemTime, UNIX_EPOCH};

use alien_core::file::{READ_BIT, WRITE_BIT};
use alien_core::{AccessType, FileIdentity, LogicalName, Replica, StorageElement};

use crate::principal::Principal;

/// Everything known about one replica access a principal asks for.
#[derive(Clone, Copy, Debug)]
pub struct AccessRequest<'a> {
    pub file: &'a FileIdentity,
    pub replica: &'a Replica,
    pub se: &'a StorageElement,
    pub access: AccessType,
}

/// Decides whether a principal may access one replica.
///
/// Denials are values, not errors: callers skip the replica and continue with the next one.
pub trait AuthorizationEngine {
    /// Returns `None` when access is granted, otherwise a human-readable denial reason.
    fn fill_access(&self, principal: &Principal, request: &AccessRequest<'_>) -> Option<String>;

    /// Returns `None` when the principal may create new entries below `parent`.
    fn can_create(&self, principal: &Principal, parent: &LogicalName) -> Option<String> {
        if principal.is_admin() {
            return None;
        }

        if !parent.is_directory() {
            return Some(format!("{} is not a directory", parent.lfn));
        }

        let class = principal.class_for(&parent.owner, &parent.gowner);
        if parent.perm.allows(class, WRITE_BIT) {
            None
        } else {
            Some(format!(
                "{} is not allowed to write into {}",
                principal.name, parent.lfn
            ))
        }
    }
}

impl<F> AuthorizationEngine for F
where
    F: Fn(&Principal, &AccessRequest<'_>) -> Option<String>,
{
    fn fill_access(&self, principal: &Principal, request: &AccessRequest<'_>) -> Option<String> {
        self(principal, request)
    }
}

fn system_now() -> Option<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|duration| duration.as_secs())
}

/// Authorization based on catalogue ownership, permission bits and storage-element policies.
#[derive(Clone, Debug)]
pub struct CatalogueAuthorization {
    now: fn() -> Option<u64>,
}

impl Default for CatalogueAuthorization {
    fn default() -> Self {
        Self { now: system_now }
    }
}

impl CatalogueAuthorization {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom clock (unix seconds) to evaluate file expiry.
    ///
    /// A clock returning `None` makes every file with an expiry time unreadable.
    pub fn with_clock(now: fn() -> Option<u64>) -> Self {
        Self { now }
    }
}

impl AuthorizationEngine for CatalogueAuthorization {
    fn fill_access(&self, principal: &Principal, request: &AccessRequest<'_>) -> Option<String> {
        let AccessRequest {
            file,
            replica,
            se,
            access,
        } = *request;

        if replica.guid != file.guid {
            return Some(format!(
                "replica {} does not belong to {}",
                replica.pfn, file.guid
            ));
        }

        if principal.is_admin() {
            return None;
        }

        let class = principal.class_for(&file.owner, &file.gowner);

        match access {
            AccessType::Read => {
                match (self.now)() {
                    Some(now) if file.is_expired(now) => {
                        return Some(format!("{} has expired", file.guid));
                    }
                    None if file.expire_time.is_some() => {
                        return Some(format!(
                            "cannot check expiry of {} without a system clock",
                            file.guid
                        ));
                    }
                    _ => {}
                }

                if !file.perm.allows(class, READ_BIT) {
                    return Some(format!(
                        "{} is not allowed to read {}",
                        principal.name, file.guid
                    ));
                }

                if !se.may_read(&principal.name) {
                    return Some(format!(
                        "{} is not allowed to read from {}",
                        principal.name, se.name
                    ));
                }
            }
            AccessType::Write => {
                if !file.perm.allows(class, WRITE_BIT) {
                    return Some(format!(
                        "{} is not allowed to write {}",
                        principal.name, file.guid
                    ));
                }

                if !se.may_write(&principal.name) {
                    return Some(format!(
                        "{} is not allowed to write to {}",
                        principal.name, se.name
                    ));
                }
            }
            AccessType::Delete => {
                if file.owner != principal.name {
                    return Some(format!(
                        "{} does not own {} and cannot delete it",
                        principal.name, file.guid
                    ));
                }
            }
        }

        None
    }
}
