// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid encryption towards a storage element.
//!
//! A fresh 32-byte session key encrypts the payload with XChaCha20-Poly1305; the session key
//! itself is wrapped with RSA-OAEP (SHA-256) for the storage element's public key.
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use thiserror::Error;

use crate::crypto::secret::Secret;

pub const SESSION_KEY_SIZE: usize = 32;

pub const NONCE_SIZE: usize = 24;

/// Session key wrapped for the recipient together with the authenticated ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HybridCiphertext {
    pub wrapped_key: Vec<u8>,
    /// `nonce || ciphertext`.
    pub body: Vec<u8>,
}

pub fn encrypt(public_key: &RsaPublicKey, plaintext: &[u8]) -> Result<HybridCiphertext, CipherError> {
    let mut rng = OsRng;

    let mut key_bytes = [0u8; SESSION_KEY_SIZE];
    rng.fill_bytes(&mut key_bytes);
    let session_key = Secret::from_bytes(key_bytes);

    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let wrapped_key = public_key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), session_key.as_bytes())
        .map_err(|_| CipherError::KeyWrap)?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(session_key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|_| CipherError::Encrypt)?;

    let mut body = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    body.extend_from_slice(&nonce);
    body.extend_from_slice(&ciphertext);

    Ok(HybridCiphertext { wrapped_key, body })
}

pub fn decrypt(
    private_key: &RsaPrivateKey,
    ciphertext: &HybridCiphertext,
) -> Result<Vec<u8>, CipherError> {
    let key_bytes: [u8; SESSION_KEY_SIZE] = private_key
        .decrypt(Oaep::new::<Sha256>(), &ciphertext.wrapped_key)
        .map_err(|_| CipherError::KeyUnwrap)?
        .try_into()
        .map_err(|_| CipherError::KeyUnwrap)?;
    let session_key = Secret::from_bytes(key_bytes);

    if ciphertext.body.len() < NONCE_SIZE {
        return Err(CipherError::Truncated);
    }
    let (nonce, body) = ciphertext.body.split_at(NONCE_SIZE);

    let cipher = XChaCha20Poly1305::new(Key::from_slice(session_key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(nonce), body)
        .map_err(|_| CipherError::Decrypt)
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("could not wrap session key")]
    KeyWrap,

    #[error("could not unwrap session key")]
    KeyUnwrap,

    #[error("could not encrypt envelope")]
    Encrypt,

    #[error("could not decrypt envelope")]
    Decrypt,

    #[error("ciphertext is shorter than the nonce")]
    Truncated,
}
