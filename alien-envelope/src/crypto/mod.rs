// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSA keys, signatures and hybrid encryption used by the sealers and the verifier.
pub mod cipher;
pub mod keys;
mod secret;
pub mod signature;

pub use cipher::{CipherError, HybridCiphertext};
pub use keys::{KeyConfig, KeyError, KeyMaterial};
pub use signature::{SignatureDigest, SignatureError};
