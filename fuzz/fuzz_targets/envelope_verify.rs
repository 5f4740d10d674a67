// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use alien_envelope::EnvelopeVerifier;
use alien_envelope::test_utils::{TEST_TOKEN_ISSUER, key_material};
use libfuzzer_sys::fuzz_target;

// Untrusted tickets must be rejected with an error, never a panic.
fuzz_target!(|input: &str| {
    let verifier = EnvelopeVerifier::new(key_material(), TEST_TOKEN_ISSUER);

    assert!(verifier.verify(input, true).is_err());
    assert!(verifier.verify(input, false).is_err());
    assert!(verifier.unseal(input).is_err());
    assert!(verifier.verify_token(input, "ALICE::CERN::EOS").is_err());
});
