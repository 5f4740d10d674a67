// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validating received access tickets.
//!
//! Every failure is fatal for the ticket at hand: a forged, corrupted or expired ticket is never
//! treated as valid.
use std::sync::Arc;

use alien_core::AccessType;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use rsa::RsaPublicKey;
use rsa::traits::PublicKeyParts;
use thiserror::Error;
use tracing::debug;

use crate::crypto::cipher::{HybridCiphertext, decrypt};
use crate::crypto::signature::{SignatureDigest, verify};
use crate::crypto::{CipherError, KeyError, KeyMaterial, SignatureError};
use crate::envelope::{EnvelopeKey, HASHORD, PlaintextEnvelope};
use crate::format::{EnvelopeFormat, EnvelopeParseError, ReceivedEnvelope};
use crate::sealer::encrypted::{
    BEGIN_SEALED_CIPHER, BEGIN_SEALED_ENVELOPE, BEGIN_SIGNATURE, END_SEALED_CIPHER,
    END_SEALED_ENVELOPE, END_SIGNATURE,
};
use crate::sealer::signed::SIGNATURE;
use crate::sealer::TokenClaims;

/// Fields of a signed envelope whose signature checked out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedEnvelope {
    envelope: ReceivedEnvelope,
    signed_keys: Vec<String>,
}

impl VerifiedEnvelope {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.envelope.get(key)
    }

    pub fn access(&self) -> Result<AccessType, EnvelopeParseError> {
        self.envelope.access()
    }

    /// All keys covered by the signature, in signing order.
    pub fn signed_keys(&self) -> &[String] {
        &self.signed_keys
    }

    /// Envelope keys in the order they were signed.
    pub fn key_order(&self) -> Vec<EnvelopeKey> {
        self.signed_keys
            .iter()
            .filter_map(|key| key.parse().ok())
            .collect()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get("issuer")
    }

    pub fn expires(&self) -> Option<u64> {
        self.get("expires").and_then(|expires| expires.parse().ok())
    }

    /// Envelopes without a parseable `expires` field never expire.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires().is_some_and(|expires| now >= expires)
    }

    pub fn to_plaintext(&self) -> Result<PlaintextEnvelope, EnvelopeParseError> {
        PlaintextEnvelope::from_received(&self.envelope)
    }
}

#[derive(Debug)]
pub struct EnvelopeVerifier {
    keys: Arc<KeyMaterial>,
    token_issuer: String,
}

impl EnvelopeVerifier {
    pub fn new(keys: Arc<KeyMaterial>, token_issuer: &str) -> Self {
        Self {
            keys,
            token_issuer: token_issuer.to_string(),
        }
    }

    /// Check the signature of an `&`-delimited envelope.
    ///
    /// Self-signed envelopes were issued by the central service and list `hashord` among their
    /// signed keys. Envelopes signed by a storage element carry `hashord` as an unlisted trailer
    /// which is appended after the listed keys.
    pub fn verify(&self, sealed: &str, self_signed: bool) -> Result<VerifiedEnvelope, VerifyError> {
        let envelope = ReceivedEnvelope::parse(sealed)?;
        if envelope.format() != EnvelopeFormat::Delimited {
            return Err(VerifyError::NotSigned);
        }

        let hashord = envelope
            .raw(HASHORD)
            .ok_or(VerifyError::MissingField(HASHORD.to_string()))?;
        let signature = envelope.raw(SIGNATURE).ok_or(VerifyError::MissingSignature)?;
        let signature = STANDARD
            .decode(signature)
            .map_err(|_| VerifyError::InvalidEncoding)?;

        let signed_keys: Vec<String> = hashord.split('-').map(str::to_string).collect();
        let mut signed = Vec::with_capacity(signed_keys.len());
        for key in &signed_keys {
            let value = envelope
                .raw(key)
                .ok_or_else(|| VerifyError::MissingField(key.clone()))?;
            signed.push(format!("{key}={value}"));
        }
        let mut signed = signed.join("&");
        if !self_signed {
            signed.push_str(&format!("&{HASHORD}={hashord}"));
        }

        let public_key = if self_signed {
            self.keys.authen_public()
        } else {
            self.keys.se_public()
        };
        verify(
            public_key,
            SignatureDigest::Sha384,
            signed.as_bytes(),
            &signature,
        )?;

        Ok(VerifiedEnvelope {
            envelope,
            signed_keys,
        })
    }

    pub fn is_valid(&self, sealed: &str, self_signed: bool) -> bool {
        match self.verify(sealed, self_signed) {
            Ok(_) => true,
            Err(err) => {
                debug!(%err, "rejecting envelope");
                false
            }
        }
    }

    /// Decrypt an encrypted envelope and check the central service's signature inside of it.
    pub fn unseal(&self, sealed: &str) -> Result<PlaintextEnvelope, VerifyError> {
        let wrapped_key = armored_block(sealed, BEGIN_SEALED_CIPHER, END_SEALED_CIPHER)?;
        let body = armored_block(sealed, BEGIN_SEALED_ENVELOPE, END_SEALED_ENVELOPE)?;

        let plaintext = decrypt(
            self.keys.se_private()?,
            &HybridCiphertext {
                wrapped_key: decode_block(wrapped_key)?,
                body: decode_block(body)?,
            },
        )?;
        let plaintext = String::from_utf8(plaintext).map_err(|_| VerifyError::InvalidEncoding)?;

        let (xml, signature) = plaintext
            .split_once(&format!("\n{BEGIN_SIGNATURE}\n"))
            .ok_or(VerifyError::MissingSignature)?;
        let signature = signature
            .trim_end()
            .strip_suffix(END_SIGNATURE)
            .ok_or(VerifyError::MissingSignature)?;
        let signature = decode_block(signature)?;

        verify(
            self.keys.authen_public(),
            SignatureDigest::Sha384,
            xml.as_bytes(),
            &signature,
        )?;

        let received = ReceivedEnvelope::parse(xml)?;
        Ok(PlaintextEnvelope::from_received(&received)?)
    }

    /// Validate an RS256 bearer token issued by this service for `audience`.
    pub fn verify_token(&self, token: &str, audience: &str) -> Result<TokenClaims, VerifyError> {
        let key = decoding_key(self.keys.authen_public())?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.token_issuer]);
        validation.set_audience(&[audience]);
        validation.validate_nbf = true;

        let data = jsonwebtoken::decode::<TokenClaims>(token, &key, &validation)?;
        Ok(data.claims)
    }
}

fn decoding_key(public_key: &RsaPublicKey) -> Result<DecodingKey, VerifyError> {
    let modulus = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let exponent = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    Ok(DecodingKey::from_rsa_components(&modulus, &exponent)?)
}

fn armored_block<'a>(input: &'a str, begin: &str, end: &str) -> Result<&'a str, VerifyError> {
    let start = input.find(begin).ok_or(VerifyError::MalformedSeal)? + begin.len();
    let len = input[start..].find(end).ok_or(VerifyError::MalformedSeal)?;
    Ok(input[start..start + len].trim())
}

fn decode_block(block: &str) -> Result<Vec<u8>, VerifyError> {
    let block: String = block.split_whitespace().collect();
    STANDARD
        .decode(block)
        .map_err(|_| VerifyError::InvalidEncoding)
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error(transparent)]
    Parse(#[from] EnvelopeParseError),

    #[error("only '&'-delimited envelopes carry a signature")]
    NotSigned,

    #[error("envelope has no signature")]
    MissingSignature,

    #[error("signed field '{0}' is missing")]
    MissingField(String),

    #[error("invalid base64 or UTF-8 encoding")]
    InvalidEncoding,

    #[error("sealed envelope is missing its cipher or envelope block")]
    MalformedSeal,

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("invalid bearer token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use alien_core::{AccessType, FileIdentity, Guid, Lfn, Replica, StorageElement};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use crate::crypto::KeyMaterial;
    use crate::crypto::keys::private_key_from_pem;
    use crate::crypto::signature::{SignatureDigest, sign};
    use crate::envelope::{
        ArchiveAnchor, EnvelopeBuilder, EnvelopeKey, EnvelopeTarget, PlaintextEnvelope,
    };
    use crate::sealer::{SealContext, Sealers, unix_now};
    use crate::test_utils::{
        AUTHEN_PRIVATE_PEM, SE_PRIVATE_PEM, SE_PUBLIC_PEM, key_material, sealer_config,
    };

    use super::{EnvelopeVerifier, VerifyError};

    struct Fixture {
        file: FileIdentity,
        replica: Replica,
        se: StorageElement,
        lfn: Lfn,
    }

    impl Fixture {
        fn new(se: StorageElement) -> Self {
            let guid = Guid::new();
            Self {
                file: FileIdentity::new(guid, 1024, Some("abc123"), "alice", "alice"),
                replica: Replica::new(
                    guid,
                    se.id,
                    &format!("{}//data/01/12345/{guid}?note=a&b", se.seio_daemons),
                ),
                se,
                lfn: "/alice/test/file1".parse().unwrap(),
            }
        }

        fn envelope(&self, access: AccessType, anchor: Option<&ArchiveAnchor>) -> PlaintextEnvelope {
            let target = EnvelopeTarget {
                file: &self.file,
                replica: &self.replica,
                se: &self.se,
                lfn: Some(&self.lfn),
            };
            EnvelopeBuilder::new().build(access, &target, anchor)
        }
    }

    fn eos() -> StorageElement {
        StorageElement::new(1, "ALICE::CERN::EOS", "root://eos.cern.ch:1094", "/eos")
    }

    fn setup() -> (Sealers, EnvelopeVerifier) {
        let config = sealer_config();
        (
            Sealers::new(key_material(), &config),
            EnvelopeVerifier::new(key_material(), &config.token_issuer),
        )
    }

    #[test]
    fn signed_round_trip() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos());
        let anchor = ArchiveAnchor {
            member_guid: Guid::new(),
            member_name: "member.root".to_string(),
            archive_lfn: None,
        };

        for anchor in [None, Some(&anchor)] {
            let envelope = fixture.envelope(AccessType::Read, anchor);
            let sealed = sealers
                .seal(&fixture.se, &envelope, &SealContext::now("alice").unwrap())
                .unwrap();

            let verified = verifier.verify(&sealed.token, true).unwrap();
            assert_eq!(verified.key_order(), envelope.key_order());
            assert_eq!(verified.to_plaintext().unwrap(), envelope);
            assert_eq!(verified.issuer(), Some("alien_central.cern.ch"));
            assert_eq!(verified.access().unwrap(), AccessType::Read);
            assert!(!verified.is_expired(unix_now().unwrap()));
            assert!(verified.is_expired(sealed.expires.unwrap()));
            assert!(verifier.is_valid(&sealed.token, true));

            // Signed by the central service, not by a storage element.
            assert!(!verifier.is_valid(&sealed.token, false));
        }
    }

    #[test]
    fn tampering_is_detected() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos());
        let envelope = fixture.envelope(AccessType::Read, None);
        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::new(1_700_000_000, "alice"))
            .unwrap();

        let tampered = sealed.token.replace("access=read", "access=write");
        assert!(matches!(
            verifier.verify(&tampered, true),
            Err(VerifyError::Signature(_))
        ));

        let extended = sealed.token.replace("expires=1700086400", "expires=1800086400");
        assert!(!verifier.is_valid(&extended, true));

        let (unsigned, _) = sealed.token.split_once("&signature=").unwrap();
        assert!(matches!(
            verifier.verify(unsigned, true),
            Err(VerifyError::MissingSignature)
        ));

        let without_md5 = sealed.token.replace("&md5=abc123", "");
        assert!(matches!(
            verifier.verify(&without_md5, true),
            Err(VerifyError::MissingField(key)) if key == "md5"
        ));

        assert!(matches!(
            verifier.verify("not an envelope", true),
            Err(VerifyError::Parse(_))
        ));
    }

    #[test]
    fn storage_element_signed() {
        let (_, verifier) = setup();
        let se_private = private_key_from_pem(SE_PRIVATE_PEM).unwrap();

        let signed = "turl=root://eos:1094//eos/f&access=read&size=10\
                      &issuer=ALICE::CERN::EOS&issued=1&expires=2\
                      &hashord=turl-access-size-issuer-issued-expires";
        let signature = sign(&se_private, SignatureDigest::Sha384, signed.as_bytes()).unwrap();
        let token = format!(
            "turl=root://eos:1094//eos/f&access=read&size=10&issuer=ALICE::CERN::EOS\
             &issued=1&expires=2&hashord=turl-access-size-issuer-issued-expires&signature={}",
            STANDARD.encode(signature)
        );

        let verified = verifier.verify(&token, false).unwrap();
        assert_eq!(verified.get("size"), Some("10"));
        assert_eq!(
            verified.key_order(),
            vec![EnvelopeKey::Turl, EnvelopeKey::Access, EnvelopeKey::Size]
        );
        assert!(verified.is_expired(2));
        assert!(!verifier.is_valid(&token, true));
    }

    #[test]
    fn encrypted_round_trip() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos().with_encrypted_envelope());
        let envelope = fixture.envelope(AccessType::Write, None);

        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::now("alice").unwrap())
            .unwrap();
        assert_eq!(verifier.unseal(&sealed.token).unwrap(), envelope);

        // Signed envelopes are not encrypted and vice versa.
        assert!(matches!(
            verifier.unseal("access=read&signature=abc"),
            Err(VerifyError::MalformedSeal)
        ));
        assert!(verifier.verify(&sealed.token, true).is_err());
    }

    #[test]
    fn unseal_needs_storage_element_key() {
        let fixture = Fixture::new(eos().with_encrypted_envelope());
        let envelope = fixture.envelope(AccessType::Read, None);
        let (sealers, _) = setup();
        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::now("alice").unwrap())
            .unwrap();

        let keys = KeyMaterial::from_pem(AUTHEN_PRIVATE_PEM, SE_PUBLIC_PEM).unwrap();
        let verifier = EnvelopeVerifier::new(Arc::new(keys), "https://alien.example.org/");
        assert!(matches!(verifier.unseal(&sealed.token), Err(VerifyError::Key(_))));
    }

    #[test]
    fn corrupted_encrypted_envelope() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos().with_encrypted_envelope());
        let envelope = fixture.envelope(AccessType::Read, None);
        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::now("alice").unwrap())
            .unwrap();

        let (cipher, body) = sealed
            .token
            .split_once("-----BEGIN SEALED ENVELOPE-----\n")
            .unwrap();
        let mut body = body.to_string();
        let replacement = if body.starts_with('A') { "B" } else { "A" };
        body.replace_range(0..1, replacement);
        let corrupted = format!("{cipher}-----BEGIN SEALED ENVELOPE-----\n{body}");

        assert!(matches!(
            verifier.unseal(&corrupted),
            Err(VerifyError::Cipher(_))
        ));
    }

    #[test]
    fn bearer_tokens() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos().with_scitokens_envelope());
        let envelope = fixture.envelope(AccessType::Read, None);
        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::now("alice").unwrap())
            .unwrap();

        let claims = verifier.verify_token(&sealed.token, "ALICE::CERN::EOS").unwrap();
        assert_eq!(claims.sub, "alice");
        assert!(claims.scope.starts_with("storage.read:/data/01/12345/"));

        assert!(verifier.verify_token(&sealed.token, "ALICE::GSI::SE").is_err());

        let other_issuer = EnvelopeVerifier::new(key_material(), "https://elsewhere.org/");
        assert!(other_issuer.verify_token(&sealed.token, "ALICE::CERN::EOS").is_err());

        let mut forged = sealed.token.clone();
        forged.push('A');
        assert!(verifier.verify_token(&forged, "ALICE::CERN::EOS").is_err());
    }

    #[test]
    fn expired_bearer_token() {
        let (sealers, verifier) = setup();
        let fixture = Fixture::new(eos().with_scitokens_envelope());
        let envelope = fixture.envelope(AccessType::Read, None);
        let sealed = sealers
            .seal(&fixture.se, &envelope, &SealContext::new(1_000_000, "alice"))
            .unwrap();

        assert!(matches!(
            verifier.verify_token(&sealed.token, "ALICE::CERN::EOS"),
            Err(VerifyError::Token(_))
        ));
    }
}
