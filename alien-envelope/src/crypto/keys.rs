// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSA key material of the central service and the storage elements.
//!
//! Keys are loaded once at start-up and shared read-only (`Arc<KeyMaterial>`) between all
//! sealers and verifiers of a process.
use std::fmt;
use std::path::{Path, PathBuf};

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Locations of PEM-encoded keys on disk.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfig {
    /// Private key of the central service, used to sign envelopes and tokens.
    pub authen_private_key: PathBuf,

    /// Public key of the central service. When given it must match the private key.
    #[serde(default)]
    pub authen_public_key: Option<PathBuf>,

    /// Public key of the storage elements, used to encrypt envelopes towards them and to verify
    /// envelopes they signed.
    pub se_public_key: PathBuf,

    /// Private key of the storage elements, only present on the receiving side.
    #[serde(default)]
    pub se_private_key: Option<PathBuf>,
}

pub struct KeyMaterial {
    authen_private: RsaPrivateKey,
    authen_public: RsaPublicKey,
    se_public: RsaPublicKey,
    se_private: Option<RsaPrivateKey>,
}

impl KeyMaterial {
    pub fn new(authen_private: RsaPrivateKey, se_public: RsaPublicKey) -> Self {
        Self {
            authen_public: authen_private.to_public_key(),
            authen_private,
            se_public,
            se_private: None,
        }
    }

    /// Attach the storage elements' private key, required to unseal encrypted envelopes.
    pub fn with_se_private(mut self, se_private: RsaPrivateKey) -> Self {
        self.se_private = Some(se_private);
        self
    }

    pub fn from_pem(authen_private_pem: &str, se_public_pem: &str) -> Result<Self, KeyError> {
        Ok(Self::new(
            private_key_from_pem(authen_private_pem)?,
            public_key_from_pem(se_public_pem)?,
        ))
    }

    /// Read all configured keys from disk.
    pub fn load(config: &KeyConfig) -> Result<Self, KeyError> {
        let authen_private = private_key_from_pem(&read_pem(&config.authen_private_key)?)?;
        let se_public = public_key_from_pem(&read_pem(&config.se_public_key)?)?;

        let mut keys = Self::new(authen_private, se_public);

        if let Some(path) = &config.authen_public_key {
            let authen_public = public_key_from_pem(&read_pem(path)?)?;
            if authen_public != keys.authen_public {
                return Err(KeyError::Mismatch(path.clone()));
            }
        }

        if let Some(path) = &config.se_private_key {
            keys = keys.with_se_private(private_key_from_pem(&read_pem(path)?)?);
        }

        Ok(keys)
    }

    pub fn authen_private(&self) -> &RsaPrivateKey {
        &self.authen_private
    }

    pub fn authen_public(&self) -> &RsaPublicKey {
        &self.authen_public
    }

    pub fn se_public(&self) -> &RsaPublicKey {
        &self.se_public
    }

    pub fn se_private(&self) -> Result<&RsaPrivateKey, KeyError> {
        self.se_private.as_ref().ok_or(KeyError::MissingSePrivateKey)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not reveal private keys when printing debug info.
        f.debug_struct("KeyMaterial")
            .field("authen_private", &"***")
            .field("authen_public", &self.authen_public)
            .field("se_public", &self.se_public)
            .field("se_private", &self.se_private.as_ref().map(|_| "***"))
            .finish()
    }
}

fn read_pem(path: &Path) -> Result<String, KeyError> {
    std::fs::read_to_string(path).map_err(|err| KeyError::Io(path.to_path_buf(), err))
}

/// Parse a PKCS#8 (`BEGIN PRIVATE KEY`) or PKCS#1 (`BEGIN RSA PRIVATE KEY`) private key.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        RsaPrivateKey::from_pkcs1_pem(pem).map_err(|err| KeyError::InvalidPem(err.to_string()))
    } else {
        RsaPrivateKey::from_pkcs8_pem(pem).map_err(|err| KeyError::InvalidPem(err.to_string()))
    }
}

/// Parse a SPKI (`BEGIN PUBLIC KEY`) or PKCS#1 (`BEGIN RSA PUBLIC KEY`) public key.
pub fn public_key_from_pem(pem: &str) -> Result<RsaPublicKey, KeyError> {
    if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|err| KeyError::InvalidPem(err.to_string()))
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|err| KeyError::InvalidPem(err.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("could not read key file {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("invalid PEM-encoded RSA key: {0}")]
    InvalidPem(String),

    #[error("public key {0} does not match the configured private key")]
    Mismatch(PathBuf),

    #[error("no storage-element private key configured")]
    MissingSePrivateKey,
}
