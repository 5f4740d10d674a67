// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access control deciding which replicas a principal may read, write or delete.
mod engine;
mod principal;

pub use engine::{AccessRequest, AuthorizationEngine, CatalogueAuthorization};
pub use principal::{ADMIN_ROLE, Principal};
