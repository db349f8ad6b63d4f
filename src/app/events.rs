//! Outbound engine events.
//!
//! Workers, the coordinator and the ingestion loop emit these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other side
//! decide what to do with them (serial log, test recorder, ...).

use serde::Serialize;

use crate::diagnostics::RuntimeMetrics;
use crate::error::Error;
use crate::protocol::{ChannelId, Command};

/// Structured events emitted by the sequencing core.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Workers are running and the engine accepts messages.
    Started { verbose: bool },

    /// A worker energised its channel (verbose diagnostics only).
    LampOn { channel: ChannelId, duration_ms: u32 },

    /// A worker released its channel (verbose diagnostics only).
    LampOff { channel: ChannelId, elapsed_ms: u64 },

    /// The serial line could not be framed cleanly (forced flush).
    InputFault(Error),

    /// A parsed command was dropped before reaching a queue.
    CommandRejected { command: Command, reason: Error },

    /// Every accepted command of a message finished.
    SequenceCompleted(SequenceReport),

    /// A message was rejected or stalled.
    SequenceFailed(Error),

    /// `D,1` / `D,0` was received.
    DiagnosticsChanged(bool),

    /// Counter snapshot, published when diagnostics are switched on.
    Metrics(RuntimeMetrics),
}

/// Aggregate timing for one dispatched message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SequenceReport {
    /// Commands executed (repeat expansion included).
    pub commands: u32,
    /// Sum of per-command execution time measured by the workers.
    pub busy_ms: u64,
    /// Wall time from parse to the last completion.
    pub latency_ms: u64,
}
