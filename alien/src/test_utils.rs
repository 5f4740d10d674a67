// SPDX-License-Identifier: MIT OR Apache-2.0

use alien_auth::{AuthorizationEngine, CatalogueAuthorization};
use alien_envelope::Sealers;
use alien_envelope::test_utils::{key_material, sealer_config};
use alien_store::MemoryStore;

use crate::selection::ReplicaSelectionService;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Selection service over `store` sealing with the fixed test keys.
pub fn service_with<A: AuthorizationEngine>(
    store: MemoryStore,
    auth: A,
) -> ReplicaSelectionService<MemoryStore, A> {
    ReplicaSelectionService::new(store, auth, Sealers::new(key_material(), &sealer_config()))
}

pub fn service(store: MemoryStore) -> ReplicaSelectionService<MemoryStore, CatalogueAuthorization> {
    service_with(store, CatalogueAuthorization::new())
}
