//! Runtime diagnostics.
//!
//! A verbose flag toggled at runtime by `D,1` / `D,0` plus a handful of
//! lock-free counters. Every thread (ingestion, dispatch, the three
//! workers) records into the same [`Diagnostics`] through an `Arc`; the
//! counters are published as a serde-serialisable [`RuntimeMetrics`]
//! snapshot when verbose mode is switched on.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Countable runtime occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Counter {
    MessagesDispatched = 0,
    CommandsExecuted,
    FramingOverflows,
    DroppedMessages,
    ParseErrors,
    UnrecognizedChannels,
    RejectedMessages,
    CompletionTimeouts,
}

const COUNTERS: usize = Counter::CompletionTimeouts as usize + 1;

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    pub verbose: bool,
    pub messages_dispatched: u32,
    pub commands_executed: u32,
    pub framing_overflows: u32,
    pub dropped_messages: u32,
    pub parse_errors: u32,
    pub unrecognized_channels: u32,
    pub rejected_messages: u32,
    pub completion_timeouts: u32,
    pub busy_ms: u64,
}

/// Shared diagnostics state.
pub struct Diagnostics {
    verbose: AtomicBool,
    counters: [AtomicU32; COUNTERS],
    busy_ms: AtomicU64,
}

impl Diagnostics {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose: AtomicBool::new(verbose),
            counters: core::array::from_fn(|_| AtomicU32::new(0)),
            busy_ms: AtomicU64::new(0),
        }
    }

    pub fn verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    /// Returns the previous setting.
    pub fn set_verbose(&self, on: bool) -> bool {
        self.verbose.swap(on, Ordering::Relaxed)
    }

    pub fn record(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u32) {
        self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_busy_ms(&self, ms: u64) {
        self.busy_ms.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u32 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> RuntimeMetrics {
        RuntimeMetrics {
            verbose: self.verbose(),
            messages_dispatched: self.get(Counter::MessagesDispatched),
            commands_executed: self.get(Counter::CommandsExecuted),
            framing_overflows: self.get(Counter::FramingOverflows),
            dropped_messages: self.get(Counter::DroppedMessages),
            parse_errors: self.get(Counter::ParseErrors),
            unrecognized_channels: self.get(Counter::UnrecognizedChannels),
            rejected_messages: self.get(Counter::RejectedMessages),
            completion_timeouts: self.get(Counter::CompletionTimeouts),
            busy_ms: self.busy_ms.load(Ordering::Relaxed),
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(false)
    }
}
