//! Fuzz target: `FramingBuffer`
//!
//! Streams arbitrary bytes through the line accumulator, draining the
//! ring whenever the first fuzz byte's low bits say so.
//!
//! Invariants checked:
//! - No panics under arbitrary byte inputs
//! - Extracted messages are non-empty and at most `MAX_MESSAGE_LEN` bytes
//! - Extracted messages never contain `\n`, `\r` or NUL
//! - The ring never reports more bytes than its capacity
//!
//! cargo fuzz run fuzz_framing

#![no_main]

use libfuzzer_sys::fuzz_target;
use trafficseq::protocol::framing::FramingBuffer;
use trafficseq::protocol::{MAX_MESSAGE_LEN, RING_CAPACITY};

fuzz_target!(|data: &[u8]| {
    let Some((&drain_mask, stream)) = data.split_first() else {
        return;
    };

    let mut fb = FramingBuffer::new();
    for (i, &b) in stream.iter().enumerate() {
        let _ = fb.append(b);
        assert!(fb.pending_bytes() <= RING_CAPACITY);

        if (i as u8) & drain_mask == 0 {
            while let Some(msg) = fb.try_take_message() {
                assert!(!msg.is_empty());
                assert!(msg.len() <= MAX_MESSAGE_LEN);
                assert!(!msg.iter().any(|&c| c == b'\n' || c == b'\r' || c == 0));
            }
        }
    }
});
