//! Unified error types for the sequencer firmware.
//!
//! One `Error` enum that every subsystem funnels into, keeping the dispatch
//! loop's handling uniform. All variants are `Copy` so they can travel
//! through diagnostics and event records without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An input line hit the accumulator limit before a terminator arrived.
    /// Recovered locally by a forced flush; never fatal.
    FramingOverflow,
    /// A body entry did not match `channel,duration`.
    /// `offset` is the byte position in the message where parsing stopped.
    ParseFormat { offset: usize },
    /// The `T,<n>` repeat value was outside `[1, 100]`, or (under the strict
    /// policy) missing / not an integer (`None`). The whole message is rejected.
    InvalidRepeatCount(Option<i64>),
    /// A channel symbol outside `R`, `Y`, `G`.
    UnrecognizedChannel(u8),
    /// A fixed-capacity buffer or queue reservation could not grow.
    Allocation,
    /// Workers did not report every completion before the epoch deadline.
    CompletionTimeout { outstanding: u32 },
    /// Peripheral or thread initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FramingOverflow => write!(f, "framing: line exceeded buffer, forced flush"),
            Self::ParseFormat { offset } => {
                write!(f, "parse: malformed entry at byte {offset}")
            }
            Self::InvalidRepeatCount(Some(n)) => {
                write!(f, "parse: repeat count {n} outside 1..=100")
            }
            Self::InvalidRepeatCount(None) => write!(f, "parse: repeat count is not an integer"),
            Self::UnrecognizedChannel(sym) => {
                if sym.is_ascii_graphic() {
                    write!(f, "unrecognized channel '{}'", *sym as char)
                } else {
                    write!(f, "unrecognized channel 0x{sym:02x}")
                }
            }
            Self::Allocation => write!(f, "allocation failed"),
            Self::CompletionTimeout { outstanding } => {
                write!(f, "sequence timed out with {outstanding} command(s) outstanding")
            }
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Fatal errors reject the whole message (and, on a bare-metal target,
    /// are the ones worth a watchdog reset if they keep recurring).
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidRepeatCount(_) | Self::Allocation | Self::Init(_)
        )
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::Allocation
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
