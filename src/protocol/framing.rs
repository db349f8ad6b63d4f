//! Line framing and the circular message buffer.
//!
//! Bytes from the serial port are collected into a line accumulator until a
//! terminator (`\n` or `\r`) arrives or the line reaches
//! [`MAX_MESSAGE_LEN`](super::MAX_MESSAGE_LEN). Completed lines are copied
//! into a [`MessageRing`], a fixed byte ring in which every message is
//! followed by a NUL delimiter:
//!
//! ```text
//!  tail                                   head
//!   ▼                                       ▼
//! ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┬───┐
//! │ R │ , │ 5 │ 0 │ \0│ Y │ , │ 5 │ 0 │ \0│   │   │
//! └───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┴───┘
//! ```
//!
//! When a new message does not fit, whole messages are discarded from the
//! tail until it does. Data is lost under sustained overload, but message
//! boundaries are never torn.

use log::{debug, warn};

use super::control::ControlLine;
use super::{MAX_MESSAGE_LEN, Message, RING_CAPACITY};

const DELIMITER: u8 = 0;

// ── Ring buffer ───────────────────────────────────────────────

/// Fixed-capacity circular byte buffer holding delimited messages.
pub struct MessageRing<const N: usize> {
    buf: [u8; N],
    head: usize,
    tail: usize,
    count: usize,
    dropped: u32,
}

impl<const N: usize> Default for MessageRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MessageRing<N> {
    pub const fn new() -> Self {
        const { assert!(N >= 2 && N - 1 <= MAX_MESSAGE_LEN, "ring must hold one message") };
        Self {
            buf: [0; N],
            head: 0,
            tail: 0,
            count: 0,
            dropped: 0,
        }
    }

    /// Append one message and its delimiter, discarding the oldest unread
    /// messages if needed. Messages longer than `N - 1` are truncated.
    ///
    /// Returns how many messages were discarded to make room.
    pub fn push_message(&mut self, msg: &[u8]) -> usize {
        let msg = &msg[..msg.len().min(N - 1)];
        let needed = msg.len() + 1;

        let mut discarded = 0;
        while N - self.count < needed {
            self.discard_oldest();
            discarded += 1;
        }
        self.dropped = self.dropped.saturating_add(discarded as u32);

        for &b in msg {
            self.put(b);
        }
        self.put(DELIMITER);
        discarded
    }

    /// Remove and return the oldest complete message.
    pub fn take_message(&mut self) -> Option<Message> {
        if self.count == 0 {
            return None;
        }
        let mut out = Message::new();
        while let Some(b) = self.pop() {
            if b == DELIMITER {
                break;
            }
            // Cannot overflow: stored messages never exceed N - 1 bytes.
            let _ = out.push(b);
        }
        Some(out)
    }

    /// Occupied bytes, delimiters included.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// Messages discarded by the overwrite policy since boot.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    fn put(&mut self, b: u8) {
        self.buf[self.head] = b;
        self.head = (self.head + 1) % N;
        self.count += 1;
    }

    fn pop(&mut self) -> Option<u8> {
        if self.count == 0 {
            return None;
        }
        let b = self.buf[self.tail];
        self.tail = (self.tail + 1) % N;
        self.count -= 1;
        Some(b)
    }

    fn discard_oldest(&mut self) {
        while let Some(b) = self.pop() {
            if b == DELIMITER {
                break;
            }
        }
    }
}

// ── Framing buffer ────────────────────────────────────────────

/// What a single [`FramingBuffer::append`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appended {
    /// Symbol stored (or ignored); no line completed.
    Pending,
    /// A terminator closed an empty or whitespace-only line.
    Blank,
    /// A line was committed to the ring. `forced` marks an accumulator
    /// overflow flush; `discarded` counts older messages overwritten.
    Queued { forced: bool, discarded: usize },
    /// A control line was recognised and consumed.
    Control(ControlLine),
}

/// Line accumulator in front of the message ring.
pub struct FramingBuffer {
    line: Message,
    ring: MessageRing<RING_CAPACITY>,
    overflows: u32,
}

impl Default for FramingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FramingBuffer {
    pub const fn new() -> Self {
        Self {
            line: Message::new(),
            ring: MessageRing::new(),
            overflows: 0,
        }
    }

    /// Store one received symbol.
    pub fn append(&mut self, symbol: u8) -> Appended {
        match symbol {
            DELIMITER => Appended::Pending,
            b'\n' | b'\r' => self.commit(false),
            _ => {
                // Never full here: the line is flushed as soon as it fills.
                let _ = self.line.push(symbol);
                if self.line.len() == MAX_MESSAGE_LEN {
                    self.overflows = self.overflows.saturating_add(1);
                    warn!(
                        "framing: no terminator within {} bytes, forcing flush",
                        MAX_MESSAGE_LEN
                    );
                    self.commit(true)
                } else {
                    Appended::Pending
                }
            }
        }
    }

    /// Remove one complete message, if any.
    pub fn try_take_message(&mut self) -> Option<Message> {
        self.ring.take_message()
    }

    /// Bytes waiting in the ring.
    pub fn pending_bytes(&self) -> usize {
        self.ring.len()
    }

    /// Forced flushes since boot.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }

    /// Messages lost to the ring overwrite policy since boot.
    pub fn dropped(&self) -> u32 {
        self.ring.dropped()
    }

    fn commit(&mut self, forced: bool) -> Appended {
        let line = core::mem::take(&mut self.line);

        if line.trim_ascii().is_empty() {
            return Appended::Blank;
        }
        if let Some(ctl) = ControlLine::parse(&line) {
            return Appended::Control(ctl);
        }

        debug!(
            "framing: received message \"{}\"",
            String::from_utf8_lossy(&line)
        );
        let discarded = self.ring.push_message(&line);
        if discarded > 0 {
            warn!("framing: ring full, discarded {} unread message(s)", discarded);
        }
        Appended::Queued { forced, discarded }
    }
}
