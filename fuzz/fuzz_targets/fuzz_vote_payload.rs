#![no_main]

use libfuzzer_sys::fuzz_target;

use senbatsu::engine::{parse_vote_payload, vote_payload};

fuzz_target!(|data: &str| {
    // Postback payloads are attacker-controlled; parsing must never
    // panic, only return Some/None.
    let parsed = parse_vote_payload(data);

    // Anything the parser accepts must round-trip through the builder.
    if let Some(candidate_id) = parsed {
        let rebuilt = vote_payload(&candidate_id);
        assert_eq!(parse_vote_payload(&rebuilt), Some(candidate_id));
    }
});
