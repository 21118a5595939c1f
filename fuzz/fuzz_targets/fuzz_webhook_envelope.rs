#![no_main]

use libfuzzer_sys::fuzz_target;

use senbatsu::line::WebhookEnvelope;

fuzz_target!(|data: &[u8]| {
    // Webhook bodies come straight off the network after the signature
    // check, so envelope parsing must never panic on adversarial input.
    let envelope: WebhookEnvelope = match serde_json::from_slice(data) {
        Ok(envelope) => envelope,
        Err(_) => return, // Invalid JSON is fine, just not a panic
    };

    // Event reduction runs on every parsed event; exercise it too.
    for event in &envelope.events {
        let _ = event.to_inbound();
    }
});
