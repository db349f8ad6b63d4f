//! Control lines sharing the serial link with light sequences.
//!
//! `D,1` / `D,0` are recognised at framing time and never enter the
//! message ring.

/// A recognised control line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    /// `D,<0|1>`
    Diagnostics(bool),
}

impl ControlLine {
    /// Surrounding whitespace and blanks after the comma are tolerated;
    /// anything else is not a control line.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let line = line.trim_ascii();
        let rest = line.strip_prefix(b"D,")?;
        match rest.trim_ascii_start() {
            b"1" => Some(Self::Diagnostics(true)),
            b"0" => Some(Self::Diagnostics(false)),
            _ => None,
        }
    }
}
