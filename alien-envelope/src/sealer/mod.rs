// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning plaintext envelopes into wire-ready access tickets.
//!
//! Three strategies exist and the destination storage element decides which one applies, see
//! [`StorageElement::envelope_policy`]:
//!
//! - [`SignedSealer`]: `&`-delimited envelope with issuer, validity and an RSA-SHA384 signature,
//!   readable by anyone holding it,
//! - [`EncryptedSealer`]: signed XML envelope encrypted towards the storage elements' key,
//! - [`TokenSealer`]: RS256 bearer token with a `storage.<access>:<path>` scope.
//!
//! [`Sealers`] holds one instance of each, all sharing the same [`KeyMaterial`], and hands out
//! the right one as an [`EnvelopeSealer`] variant.
pub(crate) mod encrypted;
pub(crate) mod signed;
mod token;

use std::sync::Arc;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use alien_core::{EnvelopePolicy, StorageElement};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CipherError, KeyMaterial, SignatureError};
use crate::envelope::PlaintextEnvelope;

pub use encrypted::EncryptedSealer;
pub use signed::SignedSealer;
pub use token::{TokenClaims, TokenSealer};

/// Default validity of envelopes and tokens in seconds.
pub const DEFAULT_LIFETIME: u64 = 86_400;

pub const DEFAULT_ISSUER: &str = "alien_localhost";

pub const DEFAULT_TOKEN_ISSUER: &str = "https://localhost:8097/";

pub fn unix_now() -> Result<u64, SystemTimeError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealerConfig {
    /// Issuer written into signed envelopes, `<service name>_<hostname>`.
    pub issuer: String,

    /// Validity of signed envelopes in seconds.
    pub lifetime: u64,

    /// `iss` claim of bearer tokens.
    pub token_issuer: String,

    /// Validity of bearer tokens in seconds.
    pub token_lifetime: u64,

    /// `aud` claim of bearer tokens, defaults to the storage element name.
    pub token_audience: Option<String>,
}

impl Default for SealerConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            lifetime: DEFAULT_LIFETIME,
            token_issuer: DEFAULT_TOKEN_ISSUER.to_string(),
            token_lifetime: DEFAULT_LIFETIME,
            token_audience: None,
        }
    }
}

/// Request-specific inputs to sealing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SealContext<'a> {
    /// Unix timestamp in seconds from which on the ticket is valid.
    pub issued: u64,

    /// Name of the principal the ticket is handed to.
    pub subject: &'a str,
}

impl<'a> SealContext<'a> {
    pub fn new(issued: u64, subject: &'a str) -> Self {
        Self { issued, subject }
    }

    pub fn now(subject: &'a str) -> Result<Self, SealError> {
        Ok(Self::new(unix_now()?, subject))
    }
}

/// Wire-ready access ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedEnvelope {
    pub policy: EnvelopePolicy,
    pub token: String,
    /// Unix timestamp in seconds after which the ticket is rejected, if it carries one.
    pub expires: Option<u64>,
}

pub trait Seal {
    fn seal(
        &self,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError>;
}

/// Sealing strategy chosen for one destination storage element.
#[derive(Clone, Copy, Debug)]
pub enum EnvelopeSealer<'a> {
    Signed(&'a SignedSealer),
    Encrypted(&'a EncryptedSealer),
    Token(&'a TokenSealer),
}

impl EnvelopeSealer<'_> {
    pub fn policy(&self) -> EnvelopePolicy {
        match self {
            EnvelopeSealer::Signed(_) => EnvelopePolicy::Signed,
            EnvelopeSealer::Encrypted(_) => EnvelopePolicy::Encrypted,
            EnvelopeSealer::Token(_) => EnvelopePolicy::Token,
        }
    }
}

impl Seal for EnvelopeSealer<'_> {
    fn seal(
        &self,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError> {
        match self {
            EnvelopeSealer::Signed(sealer) => sealer.seal(envelope, context),
            EnvelopeSealer::Encrypted(sealer) => sealer.seal(envelope, context),
            EnvelopeSealer::Token(sealer) => sealer.seal(envelope, context),
        }
    }
}

#[derive(Debug)]
pub struct Sealers {
    signed: SignedSealer,
    encrypted: EncryptedSealer,
    token: TokenSealer,
}

impl Sealers {
    pub fn new(keys: Arc<KeyMaterial>, config: &SealerConfig) -> Self {
        Self {
            signed: SignedSealer::new(keys.clone(), &config.issuer, config.lifetime),
            encrypted: EncryptedSealer::new(keys.clone()),
            token: TokenSealer::new(
                keys,
                &config.token_issuer,
                config.token_lifetime,
                config.token_audience.as_deref(),
            ),
        }
    }

    pub fn select(&self, policy: EnvelopePolicy) -> EnvelopeSealer<'_> {
        match policy {
            EnvelopePolicy::Signed => EnvelopeSealer::Signed(&self.signed),
            EnvelopePolicy::Encrypted => EnvelopeSealer::Encrypted(&self.encrypted),
            EnvelopePolicy::Token => EnvelopeSealer::Token(&self.token),
        }
    }

    pub fn for_storage_element(&self, se: &StorageElement) -> EnvelopeSealer<'_> {
        self.select(se.envelope_policy())
    }

    /// Seal an envelope the way its destination storage element requires.
    pub fn seal(
        &self,
        se: &StorageElement,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError> {
        self.for_storage_element(se).seal(envelope, context)
    }
}

#[derive(Debug, Error)]
pub enum SealError {
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error("could not encode token claims: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("envelope has no '{0}' field")]
    MissingField(&'static str),

    #[error(transparent)]
    SystemTime(#[from] SystemTimeError),
}
