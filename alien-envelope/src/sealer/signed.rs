// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;

use alien_core::EnvelopePolicy;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::crypto::KeyMaterial;
use crate::crypto::signature::{SignatureDigest, sign};
use crate::envelope::PlaintextEnvelope;
use crate::format::escape;
use crate::sealer::{Seal, SealContext, SealError, SealedEnvelope};

/// Keys appended to `hashord` by the signing service, in order.
pub const TRAILER_KEYS: [&str; 3] = ["issuer", "issued", "expires"];

pub const SIGNATURE: &str = "signature";

/// Signs `&`-delimited envelopes with the central service key.
///
/// The signed string is the unsigned envelope with `-issuer-issued-expires` appended to
/// `hashord`, followed by the three trailer fields. The signature covers exactly these bytes and
/// is appended as `&signature=<base64>`.
#[derive(Debug)]
pub struct SignedSealer {
    keys: Arc<KeyMaterial>,
    issuer: String,
    lifetime: u64,
}

impl SignedSealer {
    pub fn new(keys: Arc<KeyMaterial>, issuer: &str, lifetime: u64) -> Self {
        Self {
            keys,
            issuer: issuer.to_string(),
            lifetime,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }
}

impl Seal for SignedSealer {
    fn seal(
        &self,
        envelope: &PlaintextEnvelope,
        context: &SealContext<'_>,
    ) -> Result<SealedEnvelope, SealError> {
        let expires = context.issued + self.lifetime;

        let mut token = envelope.to_unsigned();
        for key in TRAILER_KEYS {
            token.push('-');
            token.push_str(key);
        }
        token.push_str(&format!(
            "&issuer={}&issued={}&expires={}",
            escape(&self.issuer),
            context.issued,
            expires
        ));

        let signature = sign(
            self.keys.authen_private(),
            SignatureDigest::Sha384,
            token.as_bytes(),
        )?;
        token.push_str(&format!("&{SIGNATURE}={}", STANDARD.encode(signature)));

        Ok(SealedEnvelope {
            policy: EnvelopePolicy::Signed,
            token,
            expires: Some(expires),
        })
    }
}

#[cfg(test)]
mod tests {
    use alien_core::{AccessType, FileIdentity, Guid, Lfn, Replica, SeNumber, StorageElement};

    use crate::envelope::{EnvelopeBuilder, EnvelopeTarget};
    use crate::sealer::{Seal, SealContext};
    use crate::test_utils::key_material;

    use super::SignedSealer;

    #[test]
    fn signed_layout() {
        let guid: Guid = "a1b2c3d4-0000-4000-8000-000000000001".parse().unwrap();
        let file = FileIdentity::new(guid, 1024, Some("abc123"), "alice", "alice");
        let replica = Replica::new(guid, SeNumber(1), "root://eos:1094//eos/f");
        let se = StorageElement::new(1, "ALICE::CERN::EOS", "root://eos:1094", "/eos");
        let lfn: Lfn = "/alice/test/file1".parse().unwrap();
        let target = EnvelopeTarget {
            file: &file,
            replica: &replica,
            se: &se,
            lfn: Some(&lfn),
        };
        let envelope = EnvelopeBuilder::new().build(AccessType::Read, &target, None);

        let sealer = SignedSealer::new(key_material(), "alien_central.cern.ch", 86_400);
        let sealed = sealer
            .seal(&envelope, &SealContext::new(1_700_000_000, "alice"))
            .unwrap();

        let prefix = format!(
            "{}-issuer-issued-expires&issuer=alien_central.cern.ch&issued=1700000000\
             &expires=1700086400&signature=",
            envelope.to_unsigned()
        );
        assert!(sealed.token.starts_with(&prefix));
        assert_eq!(sealed.expires, Some(1_700_086_400));

        // RSA-2048 signatures are 256 bytes, 344 characters in padded base64.
        assert_eq!(sealed.token.len(), prefix.len() + 344);
    }
}
