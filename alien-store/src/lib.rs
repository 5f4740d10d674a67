// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read interfaces for the replica catalogue and the site topology.
//!
//! The catalogue persistence itself (logical names, GUIDs and physical replicas in SQL) lives
//! outside of this workspace. Anything able to answer the queries of [`ReplicaCatalogue`] and
//! [`SiteTopology`] can back the selection service; an in-memory `MemoryStore` is provided behind
//! the `memory` feature flag (enabled by default) for embedding and tests.
//!
//! Proximity sorting is implemented once, on top of [`SiteTopology::distance`], so that every
//! topology backend orders replicas the same deterministic way.
#[cfg(feature = "memory")]
pub mod memory;
pub mod proximity;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod traits;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use proximity::{ProximityFilter, Rank};
pub use traits::{LocatedReplica, ReplicaCatalogue, SiteTopology, StoreError};
