// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use alien_core::EnvelopePolicy;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::KeyMaterial;
use crate::crypto::signature::{SignatureDigest, sign};
use crate::envelope::{EnvelopeKey, PlaintextEnvelope, storage_path};
use crate::sealer::{Seal, SealContext, SealError, SealedEnvelope};

/// JOSE header of WLCG bearer tokens.
pub const TOKEN_HEADER: &str = r#"{"typ":"JWT","alg":"RS256","wlcg.ver":"1.0"}"#;

/// Claims of a storage bearer token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub iat: u64,
    pub nbf: u64,
    pub exp: u64,
    pub jti: String,
    /// `storage.<access>:<path>`.
    pub scope: String,
}

impl TokenClaims {
    /// Access type and storage path granted by the scope.
    pub fn storage_scope(&self) -> Option<(&str, &str)> {
        self.scope.strip_prefix("storage.")?.split_once(':')
    }
}

/// Issues RS256 bearer tokens for storage elements which accept WLCG tokens.
#[derive(Debug)]
pub struct TokenSealer {
    keys: Arc<KeyMaterial>,
    issuer: String,
    lifetime: u64,
    audience: Option<String>,
}

impl TokenSealer {
    pub fn new(keys: Arc<KeyMaterial>, issuer: &str, lifetime: u64, audience: Option<&str>) -> Self {
        Self {
            keys,
            issuer: issuer.to_string(),
            lifetime,
            audience: audience.map(str::to_string),
        }
    }

    pub fn claims(
        &self,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<TokenClaims, SealError> {
        let turl = envelope
            .get(EnvelopeKey::Turl)
            .ok_or(SealError::MissingField("turl"))?;
        let audience = match &self.audience {
            Some(audience) => audience.clone(),
            None => envelope
                .get(EnvelopeKey::Se)
                .ok_or(SealError::MissingField("se"))?
                .to_string(),
        };

        Ok(TokenClaims {
            iss: self.issuer.clone(),
            aud: audience,
            sub: context.subject.to_string(),
            iat: context.issued,
            nbf: context.issued,
            exp: context.issued + self.lifetime,
            jti: Uuid::new_v4().to_string(),
            scope: format!("storage.{}:{}", envelope.access(), storage_path(turl)),
        })
    }
}

impl Seal for TokenSealer {
    fn seal(
        &self,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError> {
        let claims = self.claims(envelope, context)?;

        let mut token = URL_SAFE_NO_PAD.encode(TOKEN_HEADER);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?));

        let signature = sign(
            self.keys.authen_private(),
            SignatureDigest::Sha256,
            token.as_bytes(),
        )?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        Ok(SealedEnvelope {
            policy: EnvelopePolicy::Token,
            token,
            expires: Some(claims.exp),
        })
    }
}
