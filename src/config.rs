//! System configuration parameters
//!
//! All tunable parameters for the sequencer. Defaults match the stock
//! board firmware; overrides arrive as a JSON blob
//! (see [`SystemConfig::from_json`]).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a `T` marker without a usable integer is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RepeatPolicy {
    /// Fall back to a single pass and log a warning.
    #[default]
    Lenient,
    /// Reject the message with `InvalidRepeatCount`.
    Strict,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Serial ingestion ---
    /// Echo every received byte back to the terminal.
    pub echo_input: bool,
    /// Idle delay between serial polls when no byte is pending (milliseconds)
    pub input_poll_ms: u32,
    /// FreeRTOS priority for the serial ingestion and dispatch threads.
    pub io_priority: u8,
    /// Stack size for the serial ingestion and dispatch threads (KiB).
    pub io_stack_kb: usize,

    // --- Dispatch ---
    /// Idle delay between message-buffer polls (milliseconds)
    pub dispatch_poll_ms: u32,
    /// Slack added on top of the summed command durations before a
    /// sequence is declared stalled (milliseconds)
    pub completion_margin_ms: u32,
    /// Treatment of a malformed `T,<n>` suffix.
    pub repeat_policy: RepeatPolicy,

    // --- Workers ---
    /// Upper bound on a single wait-for-turn sleep before the ledger head
    /// is re-checked (milliseconds)
    pub turn_poll_ms: u32,
    /// Durations pre-reserved per channel queue at boot.
    pub queue_reserve: usize,
    /// FreeRTOS priority for the three lamp workers.
    pub worker_priority: u8,
    /// Stack size per lamp worker (KiB).
    pub worker_stack_kb: usize,

    // --- Diagnostics ---
    /// Start with verbose lamp logging enabled (same as receiving `D,1`).
    pub verbose_at_boot: bool,

    // --- Supervision ---
    /// Task watchdog timeout for the serial ingestion loop (milliseconds)
    pub watchdog_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Serial
            echo_input: true,
            input_poll_ms: 10,
            io_priority: 4,
            io_stack_kb: 6,

            // Dispatch
            dispatch_poll_ms: 10,
            completion_margin_ms: 1_000,
            repeat_policy: RepeatPolicy::Lenient,

            // Workers
            turn_poll_ms: 50,
            queue_reserve: 64,
            worker_priority: 5,
            worker_stack_kb: 4,

            // Diagnostics
            verbose_at_boot: false,

            // Supervision
            watchdog_timeout_ms: 10_000,
        }
    }
}

impl SystemConfig {
    /// Parse a (possibly partial) JSON override; missing fields keep
    /// their defaults. The result is validated before it is returned.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or starve the engine.
    pub fn validate(&self) -> Result<()> {
        if self.input_poll_ms == 0 || self.dispatch_poll_ms == 0 {
            return Err(Error::Config("poll intervals must be non-zero"));
        }
        if self.turn_poll_ms == 0 {
            return Err(Error::Config("turn_poll_ms must be non-zero"));
        }
        if self.worker_stack_kb < 2 {
            return Err(Error::Config("worker_stack_kb below 2 KiB"));
        }
        if self.io_stack_kb < 2 {
            return Err(Error::Config("io_stack_kb below 2 KiB"));
        }
        if self.watchdog_timeout_ms <= self.input_poll_ms {
            return Err(Error::Config("watchdog timeout shorter than input poll"));
        }
        Ok(())
    }
}
