//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing engine events to the ESP-IDF
//! logger, which goes to the same UART the commands arrive on.

use log::{error, info, warn};

use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EngineEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &EngineEvent) {
        match event {
            EngineEvent::Started { verbose } => {
                info!("START | workers ready, diagnostics={}", if *verbose { "on" } else { "off" });
            }
            EngineEvent::LampOn {
                channel,
                duration_ms,
            } => {
                info!("LAMP  | {} light ON for {} ms", channel.name(), duration_ms);
            }
            EngineEvent::LampOff {
                channel,
                elapsed_ms,
            } => {
                info!("LAMP  | {} light OFF after {} ms", channel.name(), elapsed_ms);
            }
            EngineEvent::CommandRejected { command, reason } => {
                warn!("DROP  | {} ({})", command, reason);
            }
            EngineEvent::SequenceCompleted(report) => match serde_json::to_string(report) {
                Ok(json) => info!("SEQ   | done {}", json),
                Err(_) => info!("SEQ   | {} command(s) done", report.commands),
            },
            EngineEvent::InputFault(err) => {
                warn!("INPUT | {}", err);
            }
            EngineEvent::SequenceFailed(err) if err.is_fatal() => {
                error!("SEQ   | rejected: {}", err);
            }
            EngineEvent::SequenceFailed(err) => {
                warn!("SEQ   | failed: {}", err);
            }
            EngineEvent::DiagnosticsChanged(on) => {
                info!("DIAG  | verbose {}", if *on { "enabled" } else { "disabled" });
            }
            EngineEvent::Metrics(m) => match serde_json::to_string(m) {
                Ok(json) => info!("DIAG  | {}", json),
                Err(_) => warn!("DIAG  | metrics serialisation failed"),
            },
        }
    }
}
