//! Sequence parser.
//!
//! Turns one framed message into an ordered list of [`Command`]s:
//!
//! ```text
//! message := body ["T," repeat]
//! body    := entry *( *("," | " ") entry )
//! entry   := channel "," duration
//! ```
//!
//! The body is stored once and replayed `repeat` times on iteration, so a
//! `T,100` message never materialises 100 copies.

use log::{debug, warn};

use super::{ChannelId, Command};
use crate::config::RepeatPolicy;
use crate::error::{Error, Result};

/// Largest accepted repeat count.
pub const MAX_REPEAT: u8 = 100;

/// Body entries a single message can carry. The shortest entry is three
/// bytes (`R,0`), so a full line never exceeds this.
pub const MAX_BODY_ENTRIES: usize = 128;

const REPEAT_MARKER: u8 = b'T';

/// Result of parsing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSequence {
    entries: heapless::Vec<Command, MAX_BODY_ENTRIES>,
    repeat: u8,
    stopped_at: Option<usize>,
}

impl ParsedSequence {
    /// Body entries for a single pass.
    pub fn entries(&self) -> &[Command] {
        &self.entries
    }

    pub fn repeat(&self) -> u8 {
        self.repeat
    }

    /// Total commands after expansion.
    pub fn len(&self) -> usize {
        self.entries.len() * self.repeat as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of the malformed entry that cut every pass short.
    pub fn format_error(&self) -> Option<Error> {
        self.stopped_at.map(|offset| Error::ParseFormat { offset })
    }

    /// Commands in execution order: the whole body once, then again.
    pub fn iter(&self) -> impl Iterator<Item = Command> + '_ {
        (0..self.repeat).flat_map(move |_| self.entries.iter().copied())
    }

    /// Commands whose channel owns a worker.
    pub fn accepted_len(&self) -> usize {
        self.entries
            .iter()
            .filter(|c| c.channel.index().is_some())
            .count()
            * self.repeat as usize
    }

    /// Sum of all accepted durations after expansion.
    pub fn accepted_duration_ms(&self) -> u64 {
        let per_pass: u64 = self
            .entries
            .iter()
            .filter(|c| c.channel.index().is_some())
            .map(|c| u64::from(c.duration_ms))
            .sum();
        per_pass * u64::from(self.repeat)
    }
}

/// Parse one message.
///
/// Malformed body entries end the pass silently (see
/// [`ParsedSequence::format_error`]); only repeat-count violations and
/// capacity exhaustion are errors.
pub fn parse(message: &[u8], policy: RepeatPolicy) -> Result<ParsedSequence> {
    let (body, repeat) = match message.iter().position(|&b| b == REPEAT_MARKER) {
        Some(pos) => (&message[..pos], parse_repeat(&message[pos + 1..], policy)?),
        None => (message, 1),
    };

    let mut entries = heapless::Vec::new();
    let mut stopped_at = None;
    let mut cursor = skip_separators(body, 0);

    while cursor < body.len() {
        match parse_entry(body, cursor) {
            Some((cmd, next)) => {
                debug!("parse: {} for {} ms", cmd.channel, cmd.duration_ms);
                entries.push(cmd).map_err(|_| Error::Allocation)?;
                cursor = skip_separators(body, next);
            }
            None => {
                warn!("parse: invalid format in sequence at byte {}", cursor);
                stopped_at = Some(cursor);
                break;
            }
        }
    }

    Ok(ParsedSequence {
        entries,
        repeat,
        stopped_at,
    })
}

/// `rest` is everything after the `T` marker.
fn parse_repeat(rest: &[u8], policy: RepeatPolicy) -> Result<u8> {
    let value = rest
        .strip_prefix(b",")
        .and_then(|digits| parse_int(digits, 0))
        .map(|(n, _)| n);

    match value {
        Some(n) if (1..=i64::from(MAX_REPEAT)).contains(&n) => Ok(n as u8),
        Some(n) => Err(Error::InvalidRepeatCount(Some(n))),
        None => match policy {
            RepeatPolicy::Lenient => {
                warn!("parse: invalid repeat format, playing sequence once");
                Ok(1)
            }
            RepeatPolicy::Strict => Err(Error::InvalidRepeatCount(None)),
        },
    }
}

/// One `channel,duration` entry starting at `at`; returns the command and
/// the index just past the duration digits.
fn parse_entry(body: &[u8], at: usize) -> Option<(Command, usize)> {
    let channel = ChannelId::from_symbol(*body.get(at)?);
    if body.get(at + 1) != Some(&b',') {
        return None;
    }
    let (duration, next) = parse_int(body, at + 2)?;
    let duration_ms = u32::try_from(duration).ok()?;
    Some((Command::new(channel, duration_ms), next))
}

/// Decimal integer with optional sign and leading blanks, `scanf`-style.
/// Saturates instead of overflowing so huge values still read as
/// out-of-range rather than malformed.
fn parse_int(buf: &[u8], mut at: usize) -> Option<(i64, usize)> {
    while buf.get(at).is_some_and(u8::is_ascii_whitespace) {
        at += 1;
    }
    let negative = match buf.get(at) {
        Some(b'-') => {
            at += 1;
            true
        }
        Some(b'+') => {
            at += 1;
            false
        }
        _ => false,
    };

    let start = at;
    let mut value: i64 = 0;
    while let Some(d) = buf.get(at).filter(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(i64::from(d - b'0'));
        at += 1;
    }
    if at == start {
        return None;
    }
    Some((if negative { -value } else { value }, at))
}

fn skip_separators(buf: &[u8], mut at: usize) -> usize {
    while matches!(buf.get(at), Some(b',' | b' ')) {
        at += 1;
    }
    at
}
