// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replica selection and access-envelope issuance for a grid storage federation.
//!
//! Clients ask the [`ReplicaSelectionService`] for access to a file. The service looks up the
//! file's replicas in the [`ReplicaCatalogue`](alien_store::ReplicaCatalogue), orders them by
//! proximity to the client's site through the [`SiteTopology`](alien_store::SiteTopology),
//! checks every replica with an [`AuthorizationEngine`](alien_auth::AuthorizationEngine) and
//! hands out one sealed access envelope per granted replica.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use alien::{Config, FileRef, ReplicaSelectionService, SePreferences};
//! use alien_auth::{CatalogueAuthorization, Principal};
//! use alien_envelope::Sealers;
//! use alien_store::MemoryStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("/etc/alien/alien.toml".as_ref())?;
//! let keys = Arc::new(config.load_keys()?);
//!
//! let service = ReplicaSelectionService::new(
//!     MemoryStore::new(),
//!     CatalogueAuthorization::new(),
//!     Sealers::new(keys, &config.sealer_config()),
//! );
//!
//! let tickets = service.select_for_read(
//!     &"/alice/data/file1".parse::<FileRef>()?,
//!     &SePreferences::default(),
//!     &Principal::new("alice").at_site("CERN"),
//! )?;
//! for ticket in tickets {
//!     println!("{} {}", ticket.turl(), ticket.sealed.token);
//! }
//! # Ok(())
//! # }
//! ```
mod config;
mod selection;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
#[cfg(test)]
mod tests;

pub use config::{
    Config, ConfigError, EnvelopeConfig, IssuerConfig, TokenConfig, DEFAULT_HOSTNAME,
    DEFAULT_SERVICE_NAME, DEFAULT_TOKEN_ISSUER,
};
pub use selection::{
    FileRef, QosRequirements, ReplicaSelectionService, SePreferences, SealedTicket,
    SelectionError,
};
