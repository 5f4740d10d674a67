// SPDX-License-Identifier: MIT OR Apache-2.0

//! RSASSA-PKCS1-v1_5 signatures over SHA-384 (envelopes) and SHA-256 (storage tokens).
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Sha256, Sha384};
use thiserror::Error;

/// Hash function used with the RSA signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureDigest {
    Sha256,
    Sha384,
}

pub fn sign(
    private_key: &RsaPrivateKey,
    digest: SignatureDigest,
    message: &[u8],
) -> Result<Vec<u8>, SignatureError> {
    let signature = match digest {
        SignatureDigest::Sha256 => SigningKey::<Sha256>::new(private_key.clone())
            .try_sign(message)
            .map_err(|_| SignatureError::SigningFailed)?,
        SignatureDigest::Sha384 => SigningKey::<Sha384>::new(private_key.clone())
            .try_sign(message)
            .map_err(|_| SignatureError::SigningFailed)?,
    };
    Ok(signature.to_vec())
}

pub fn verify(
    public_key: &RsaPublicKey,
    digest: SignatureDigest,
    message: &[u8],
    signature: &[u8],
) -> Result<(), SignatureError> {
    let signature =
        Signature::try_from(signature).map_err(|_| SignatureError::VerificationFailed)?;
    match digest {
        SignatureDigest::Sha256 => VerifyingKey::<Sha256>::new(public_key.clone())
            .verify(message, &signature)
            .map_err(|_| SignatureError::VerificationFailed),
        SignatureDigest::Sha384 => VerifyingKey::<Sha384>::new(public_key.clone())
            .verify(message, &signature)
            .map_err(|_| SignatureError::VerificationFailed),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("could not sign message")]
    SigningFailed,

    #[error("signature does not match")]
    VerificationFailed,
}
