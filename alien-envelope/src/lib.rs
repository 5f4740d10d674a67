// SPDX-License-Identifier: MIT OR Apache-2.0

//! Access envelopes granting time-limited read, write or delete access to one replica on a
//! storage element.
//!
//! An envelope starts as a [`PlaintextEnvelope`] assembled by the [`EnvelopeBuilder`] from a
//! granted replica. It is then sealed by one of three strategies chosen by the destination
//! storage element:
//!
//! 1. signed `&`-delimited fields, readable by anyone holding the ticket,
//! 2. a signed XML document encrypted towards the storage elements' key,
//! 3. an RS256 bearer token with a `storage.<access>:<path>` scope.
//!
//! The receiving side checks tickets with the [`EnvelopeVerifier`]. Received plaintext envelopes
//! can be in either the `&`-delimited or the legacy XML format, [`ReceivedEnvelope::parse`]
//! detects which one it got.
//!
//! All keys live in one [`KeyMaterial`] value which is loaded once and shared read-only between
//! sealers and verifiers.
pub mod crypto;
mod envelope;
mod format;
mod sealer;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
mod verifier;

pub use crypto::{KeyConfig, KeyError, KeyMaterial};
pub use envelope::{
    ArchiveAnchor, EnvelopeBuilder, EnvelopeKey, EnvelopeTarget, HASHORD, PlaintextEnvelope,
    UnknownEnvelopeKey, storage_path,
};
pub use format::{
    EnvelopeFields, EnvelopeFormat, EnvelopeParseError, Field, ReceivedEnvelope, escape, unescape,
};
pub use sealer::{
    DEFAULT_LIFETIME, EncryptedSealer, EnvelopeSealer, Seal, SealContext, SealError,
    SealedEnvelope, SealerConfig, Sealers, SignedSealer, TokenClaims, TokenSealer, unix_now,
};
pub use verifier::{EnvelopeVerifier, VerifiedEnvelope, VerifyError};
