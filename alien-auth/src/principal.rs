// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeSet;

use alien_core::PermissionClass;
use serde::{Deserialize, Serialize};

/// Role granting unrestricted catalogue access.
pub const ADMIN_ROLE: &str = "admin";

/// An authenticated actor requesting access, together with the site it connects from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub roles: BTreeSet<String>,
    /// Site the client runs at, used for proximity sorting.
    pub site: Option<String>,
}

impl Principal {
    /// New principal whose only role is its own account name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            roles: BTreeSet::from([name.to_string()]),
            site: None,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.roles.insert(role.to_string());
        self
    }

    pub fn at_site(mut self, site: &str) -> Self {
        self.site = Some(site.to_string());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Permission triplet applying to this principal for an entry with the given owners.
    pub fn class_for(&self, owner: &str, gowner: &str) -> PermissionClass {
        if self.name == owner {
            PermissionClass::Owner
        } else if self.has_role(gowner) {
            PermissionClass::Group
        } else {
            PermissionClass::Other
        }
    }
}
