// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use alien_core::EnvelopePolicy;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::crypto::KeyMaterial;
use crate::crypto::cipher::encrypt;
use crate::crypto::signature::{SignatureDigest, sign};
use crate::envelope::PlaintextEnvelope;
use crate::sealer::{Seal, SealContext, SealError, SealedEnvelope};

pub const BEGIN_SIGNATURE: &str = "-----BEGIN SIGNATURE-----";
pub const END_SIGNATURE: &str = "-----END SIGNATURE-----";
pub const BEGIN_SEALED_CIPHER: &str = "-----BEGIN SEALED CIPHER-----";
pub const END_SEALED_CIPHER: &str = "-----END SEALED CIPHER-----";
pub const BEGIN_SEALED_ENVELOPE: &str = "-----BEGIN SEALED ENVELOPE-----";
pub const END_SEALED_ENVELOPE: &str = "-----END SEALED ENVELOPE-----";

/// Signs the XML envelope with the central service key and encrypts it, signature included,
/// towards the storage elements' public key.
///
/// Only a holder of the storage-element private key can read the fields. The XML format has no
/// validity fields, so these tickets carry no expiry.
#[derive(Debug)]
pub struct EncryptedSealer {
    keys: Arc<KeyMaterial>,
}

impl EncryptedSealer {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        Self { keys }
    }
}

impl Seal for EncryptedSealer {
    fn seal(
        &self,
        envelope: &PlaintextEnvelope,
        _context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError> {
        let xml = envelope.to_xml();
        let signature = sign(
            self.keys.authen_private(),
            SignatureDigest::Sha384,
            xml.as_bytes(),
        )?;

        let signed = format!(
            "{xml}\n{BEGIN_SIGNATURE}\n{}\n{END_SIGNATURE}\n",
            STANDARD.encode(signature)
        );
        let ciphertext = encrypt(self.keys.se_public(), signed.as_bytes())?;

        let token = format!(
            "{BEGIN_SEALED_CIPHER}\n{}\n{END_SEALED_CIPHER}\n\
             {BEGIN_SEALED_ENVELOPE}\n{}\n{END_SEALED_ENVELOPE}\n",
            STANDARD.encode(&ciphertext.wrapped_key),
            STANDARD.encode(&ciphertext.body),
        );

        Ok(SealedEnvelope {
            policy: EnvelopePolicy::Encrypted,
            token,
            expires: None,
        })
    }
}
