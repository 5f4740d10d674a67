// SPDX-License-Identifier: MIT OR Apache-2.0

//! Service configuration, usually read from a TOML file at start-up.
//!
//! ```toml
//! [issuer]
//! name = "alien"
//! hostname = "central.cern.ch"
//!
//! [envelope]
//! lifetime = 86400
//!
//! [token]
//! issuer = "https://alien.cern.ch:8097/"
//! lifetime = 3600
//!
//! [keys]
//! authen_private_key = "/etc/alien/authen/AuthenPriv.pem"
//! se_public_key = "/etc/alien/authen/SEPub.pem"
//! ```
use std::path::{Path, PathBuf};

use alien_envelope::{DEFAULT_LIFETIME, KeyConfig, KeyError, KeyMaterial, SealerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVICE_NAME: &str = "alien";

pub const DEFAULT_HOSTNAME: &str = "localhost";

pub const DEFAULT_TOKEN_ISSUER: &str = "https://localhost:8097/";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub issuer: IssuerConfig,
    pub envelope: EnvelopeConfig,
    pub token: TokenConfig,
    pub keys: KeyConfig,
}

impl Config {
    pub fn from_toml_str(value: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let value = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_toml_str(&value)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.name.trim().is_empty() {
            return Err(ConfigError::Invalid("issuer.name must not be empty".into()));
        }

        if self.envelope.lifetime == 0 {
            return Err(ConfigError::Invalid(
                "envelope.lifetime must be positive".into(),
            ));
        }

        if self.token.lifetime == 0 {
            return Err(ConfigError::Invalid("token.lifetime must be positive".into()));
        }

        Ok(())
    }

    pub fn sealer_config(&self) -> SealerConfig {
        SealerConfig {
            issuer: self.issuer.issuer(),
            lifetime: self.envelope.lifetime,
            token_issuer: self.token.issuer.clone(),
            token_lifetime: self.token.lifetime,
            token_audience: self.token.audience.clone(),
        }
    }

    /// Read the configured keys from disk.
    pub fn load_keys(&self) -> Result<KeyMaterial, ConfigError> {
        if self.keys.authen_private_key.as_os_str().is_empty()
            || self.keys.se_public_key.as_os_str().is_empty()
        {
            return Err(ConfigError::MissingKeys);
        }

        Ok(KeyMaterial::load(&self.keys)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    pub name: String,
    pub hostname: String,
}

impl IssuerConfig {
    /// Value of the `issuer` field of signed envelopes.
    pub fn issuer(&self) -> String {
        format!("{}_{}", self.name, self.hostname)
    }
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVICE_NAME.to_string(),
            hostname: DEFAULT_HOSTNAME.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Validity of signed envelopes in seconds.
    pub lifetime: u64,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            lifetime: DEFAULT_LIFETIME,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub issuer: String,
    pub lifetime: u64,
    pub audience: Option<String>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            lifetime: DEFAULT_LIFETIME,
            audience: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration {0}: {1}")]
    Io(PathBuf, std::io::Error),

    #[error("invalid TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no key files configured")]
    MissingKeys,

    #[error(transparent)]
    Key(#[from] KeyError),
}
