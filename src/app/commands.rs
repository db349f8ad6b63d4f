//! Inbound application commands.
//!
//! Control lines arrive on the same serial link as light sequences but are
//! consumed by the ingestion layer; they never reach the parser.

use crate::protocol::control::ControlLine;

/// Commands the serial operator can send to the firmware itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Set (not toggle) verbose lamp diagnostics.
    SetDiagnostics(bool),
}

impl From<ControlLine> for AppCommand {
    fn from(line: ControlLine) -> Self {
        match line {
            ControlLine::Diagnostics(on) => Self::SetDiagnostics(on),
        }
    }
}
