//! Fuzz target: `parser::parse`
//!
//! Feeds arbitrary bytes as a message under both repeat policies.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Accepted sequences have a repeat count in `1..=MAX_REPEAT`
//! - Expansion yields exactly `entries × repeat` commands
//! - The only rejection is `InvalidRepeatCount`
//!
//! cargo fuzz run fuzz_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use trafficseq::config::RepeatPolicy;
use trafficseq::error::Error;
use trafficseq::protocol::parser::{self, MAX_REPEAT};

fuzz_target!(|data: &[u8]| {
    for policy in [RepeatPolicy::Lenient, RepeatPolicy::Strict] {
        match parser::parse(data, policy) {
            Ok(seq) => {
                assert!((1..=MAX_REPEAT).contains(&seq.repeat()));
                assert_eq!(seq.iter().count(), seq.entries().len() * seq.repeat() as usize);
                assert!(seq.accepted_len() <= seq.len());
            }
            Err(Error::InvalidRepeatCount(_)) => {}
            // Only reachable for bodies longer than any framed line.
            Err(Error::Allocation) => assert!(data.len() > trafficseq::protocol::MAX_MESSAGE_LEN),
            Err(other) => panic!("unexpected parse error: {other}"),
        }
    }
});
