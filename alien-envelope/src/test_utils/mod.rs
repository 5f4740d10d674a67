// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed RSA-2048 key pairs for tests. Never use these outside of tests.
use std::sync::{Arc, OnceLock};

use crate::crypto::KeyMaterial;
use crate::crypto::keys::private_key_from_pem;
use crate::sealer::SealerConfig;

pub const AUTHEN_PRIVATE_PEM: &str = include_str!("keys/authen_private.pem");
pub const AUTHEN_PUBLIC_PEM: &str = include_str!("keys/authen_public.pem");
pub const SE_PRIVATE_PEM: &str = include_str!("keys/se_private.pem");
pub const SE_PUBLIC_PEM: &str = include_str!("keys/se_public.pem");

pub const TEST_ISSUER: &str = "alien_central.cern.ch";
pub const TEST_TOKEN_ISSUER: &str = "https://alien.example.org/";

static KEY_MATERIAL: OnceLock<Arc<KeyMaterial>> = OnceLock::new();

/// Key material with both the central service and the storage-element key pairs.
///
/// Parsed once per test binary, RSA key parsing is slow in debug builds.
pub fn key_material() -> Arc<KeyMaterial> {
    KEY_MATERIAL
        .get_or_init(|| {
            let keys = KeyMaterial::from_pem(AUTHEN_PRIVATE_PEM, SE_PUBLIC_PEM)
                .expect("valid test key pair");
            let se_private =
                private_key_from_pem(SE_PRIVATE_PEM).expect("valid storage element test key");
            Arc::new(keys.with_se_private(se_private))
        })
        .clone()
}

pub fn sealer_config() -> SealerConfig {
    SealerConfig {
        issuer: TEST_ISSUER.to_string(),
        token_issuer: TEST_TOKEN_ISSUER.to_string(),
        ..SealerConfig::default()
    }
}
