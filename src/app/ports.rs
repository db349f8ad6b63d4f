//! Port traits: the hexagonal boundary between the sequencing core and
//! the platform.
//!
//! ```text
//!               ┌──────────────────────────────┐
//!  SerialPort ─▶│  Ingestor → FramingBuffer    │
//!               │  Dispatcher → Coordinator    │──▶ EventSink
//!   TimePort ──▶│  ChannelWorker ×3            │
//!               └──────────────┬───────────────┘
//!                              ▼
//!                          OutputPort
//! ```
//!
//! Adapters in [`crate::adapters`] implement these for ESP-IDF; tests
//! provide recording mocks.

use crate::protocol::ChannelId;

use super::events::EngineEvent;

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: core → lamp GPIO)
// ───────────────────────────────────────────────────────────────

/// The shared output resource. Exactly one worker holds it at a time.
pub trait OutputPort: Send {
    /// Energise (`on = true`) or release a channel. Yellow drives the red
    /// and green lines together; red and green clear the other line first.
    fn set_level(&mut self, channel: ChannelId, on: bool);

    /// Release every line: safe state.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time port (driven adapter: core → monotonic clock / delays)
// ───────────────────────────────────────────────────────────────

/// Monotonic clock plus blocking delay for the current thread.
pub trait TimePort: Send + Sync {
    /// Raw monotonic tick count.
    fn now_ticks(&self) -> u64;

    /// Convert a tick delta into milliseconds.
    fn ticks_to_ms(&self, ticks: u64) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn sleep_ms(&self, ms: u32);

    /// Milliseconds elapsed since `start` (a previous [`now_ticks`](Self::now_ticks)).
    fn elapsed_ms(&self, start: u64) -> u64 {
        self.ticks_to_ms(self.now_ticks().saturating_sub(start))
    }
}

// ───────────────────────────────────────────────────────────────
// Serial port (driving adapter: UART → core)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented, non-blocking serial link.
pub trait SerialPort: Send {
    /// Next received byte, or `None` if nothing is pending.
    fn read_byte(&mut self) -> Option<u8>;

    /// Send one byte (used for echo).
    fn write_byte(&mut self, byte: u8);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`EngineEvent`]s through this port from
/// several threads at once; adapters decide where they go.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}
