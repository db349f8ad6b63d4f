//! Serial text protocol.
//!
//! ```text
//! ┌──────────────┐   bytes   ┌────────────────┐  Message  ┌──────────────┐
//! │ SerialPort   │──────────▶│ FramingBuffer  │──────────▶│ parser::parse│──▶ Commands
//! │ (UART / sim) │           │ line + ring    │           │ T,<n> expand │
//! └──────────────┘           └────────────────┘           └──────────────┘
//! ```
//!
//! Wire format, one message per line (`\n` or `\r` terminated):
//!
//! ```text
//! <channel>,<duration>{,<channel>,<duration>}*[,]T,<repeat>
//! ```

pub mod control;
pub mod framing;
pub mod parser;

use core::fmt;

/// Capacity of the circular message buffer, delimiters included.
pub const RING_CAPACITY: usize = 256;

/// Longest message the line accumulator holds before a forced flush.
pub const MAX_MESSAGE_LEN: usize = RING_CAPACITY - 1;

/// One delimited input line.
pub type Message = heapless::Vec<u8, MAX_MESSAGE_LEN>;

/// Output channel named by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Red,
    Yellow,
    Green,
    /// Any other symbol in channel position; never reaches a queue.
    Unrecognized(u8),
}

impl ChannelId {
    /// The three channels that own a worker and a queue, in index order.
    pub const ALL: [ChannelId; 3] = [ChannelId::Red, ChannelId::Yellow, ChannelId::Green];

    pub const fn from_symbol(symbol: u8) -> Self {
        match symbol {
            b'R' => Self::Red,
            b'Y' => Self::Yellow,
            b'G' => Self::Green,
            other => Self::Unrecognized(other),
        }
    }

    pub const fn symbol(self) -> u8 {
        match self {
            Self::Red => b'R',
            Self::Yellow => b'Y',
            Self::Green => b'G',
            Self::Unrecognized(sym) => sym,
        }
    }

    /// Queue / worker slot, `None` for unrecognized symbols.
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Red => Some(0),
            Self::Yellow => Some(1),
            Self::Green => Some(2),
            Self::Unrecognized(_) => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrecognized(sym) => write!(f, "unrecognized(0x{sym:02x})"),
            known => f.write_str(known.name()),
        }
    }
}

/// A single timed lamp command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    pub channel: ChannelId,
    pub duration_ms: u32,
}

impl Command {
    pub const fn new(channel: ChannelId, duration_ms: u32) -> Self {
        Self {
            channel,
            duration_ms,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel.symbol() as char, self.duration_ms)
    }
}
