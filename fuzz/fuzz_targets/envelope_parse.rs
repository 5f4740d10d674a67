// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

use alien_envelope::{EnvelopeFormat, PlaintextEnvelope, ReceivedEnvelope, unescape};
use libfuzzer_sys::fuzz_target;

// Parse arbitrary input in both wire formats.
fuzz_target!(|input: &str| {
    let _ = unescape(input);

    let Ok(received) = ReceivedEnvelope::parse(input) else {
        return;
    };
    assert_eq!(EnvelopeFormat::detect(input).ok(), Some(received.format()));

    if let Ok(envelope) = PlaintextEnvelope::from_received(&received) {
        assert_eq!(received.access().ok(), Some(envelope.access()));
        let _ = envelope.to_unsigned();
        let _ = envelope.to_xml();
    }
});
