//! Application service: serial ingestion and message dispatch loops.
//!
//! ```text
//!  SerialPort ──▶ Ingestor ──▶ Arc<Mutex<FramingBuffer>> ──▶ Dispatcher ──▶ Engine
//!                   │ echo, D,1 / D,0                           │
//!                   ▼                                           ▼
//!              Diagnostics                                  EventSink
//! ```
//!
//! Both loops are plain structs with a `poll_once` step so tests can drive
//! them deterministically; `run` wraps the step in the production loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};

use crate::config::SystemConfig;
use crate::diagnostics::{Counter, Diagnostics};
use crate::drivers::task_pin::{Core, spawn_on_core};
use crate::drivers::watchdog::Watchdog;
use crate::engine::{Engine, SequenceCoordinator};
use crate::error::{Error, Result};
use crate::protocol::framing::{Appended, FramingBuffer};

use super::commands::AppCommand;
use super::events::{EngineEvent, SequenceReport};
use super::ports::{EventSink, OutputPort, SerialPort, TimePort};

/// Framing buffer shared between the ingestion and dispatch threads.
pub type SharedFraming = Arc<Mutex<FramingBuffer>>;

fn lock_framing(framing: &SharedFraming) -> MutexGuard<'_, FramingBuffer> {
    framing.lock().unwrap_or_else(PoisonError::into_inner)
}

// ───────────────────────────────────────────────────────────────
// Ingestor
// ───────────────────────────────────────────────────────────────

/// Moves bytes from the serial port into the framing buffer.
pub struct Ingestor<S> {
    serial: S,
    framing: SharedFraming,
    diagnostics: Arc<Diagnostics>,
    sink: Arc<dyn EventSink>,
    echo: bool,
}

impl<S: SerialPort> Ingestor<S> {
    pub fn new(
        serial: S,
        framing: SharedFraming,
        diagnostics: Arc<Diagnostics>,
        sink: Arc<dyn EventSink>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            serial,
            framing,
            diagnostics,
            sink,
            echo: config.echo_input,
        }
    }

    /// Handle at most one received byte. `None` if the port was idle.
    pub fn poll_once(&mut self) -> Option<Appended> {
        let byte = self.serial.read_byte()?;
        if self.echo {
            self.serial.write_byte(byte);
        }

        let appended = lock_framing(&self.framing).append(byte);
        match appended {
            Appended::Queued { forced, discarded } => {
                if forced {
                    self.diagnostics.record(Counter::FramingOverflows);
                    self.sink
                        .emit(&EngineEvent::InputFault(Error::FramingOverflow));
                }
                if discarded > 0 {
                    self.diagnostics
                        .add(Counter::DroppedMessages, discarded as u32);
                }
            }
            Appended::Control(line) => self.handle_command(line.into()),
            Appended::Pending | Appended::Blank => {}
        }
        Some(appended)
    }

    /// Serial thread body: drain the port, sleep only when it is idle.
    /// Subscribes this thread to the task watchdog.
    pub fn run(mut self, time: &impl TimePort, poll_ms: u32, watchdog_timeout_ms: u32) {
        info!("serial ingestion started (echo={})", self.echo);
        let watchdog = Watchdog::new(watchdog_timeout_ms);
        loop {
            watchdog.feed();
            if self.poll_once().is_none() {
                time.sleep_ms(poll_ms);
            }
        }
    }

    fn handle_command(&self, cmd: AppCommand) {
        match cmd {
            AppCommand::SetDiagnostics(on) => {
                let was = self.diagnostics.set_verbose(on);
                debug!("diagnostics: {} -> {}", was, on);
                self.sink.emit(&EngineEvent::DiagnosticsChanged(on));
                if on {
                    self.sink
                        .emit(&EngineEvent::Metrics(self.diagnostics.snapshot()));
                }
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Dispatcher
// ───────────────────────────────────────────────────────────────

/// Pulls complete messages and runs each one to completion.
pub struct Dispatcher<O, T> {
    coordinator: SequenceCoordinator<O, T>,
    framing: SharedFraming,
}

impl<O: OutputPort, T: TimePort> Dispatcher<O, T> {
    pub fn new(coordinator: SequenceCoordinator<O, T>, framing: SharedFraming) -> Self {
        Self {
            coordinator,
            framing,
        }
    }

    /// Dispatch the oldest pending message, if any. The framing lock is
    /// released before the sequence starts so ingestion keeps running.
    pub fn poll_once(&self) -> Option<Result<SequenceReport>> {
        let message = lock_framing(&self.framing).try_take_message()?;
        Some(self.coordinator.dispatch(&message))
    }

    /// Dispatch thread body. Errors are already reported through the
    /// event sink by the coordinator.
    pub fn run(self, time: &impl TimePort, poll_ms: u32) {
        info!("dispatcher started");
        loop {
            if self.poll_once().is_none() {
                time.sleep_ms(poll_ms);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// SequencerService
// ───────────────────────────────────────────────────────────────

/// Fully wired sequencer: engine workers plus the serial and dispatch
/// threads.
pub struct SequencerService<O, T> {
    engine: Engine<O, T>,
    framing: SharedFraming,
}

impl<O, T> SequencerService<O, T>
where
    O: OutputPort + 'static,
    T: TimePort + Clone + 'static,
{
    pub fn start<S: SerialPort + 'static>(
        config: &SystemConfig,
        output: O,
        time: T,
        serial: S,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let diagnostics = Arc::new(Diagnostics::new(config.verbose_at_boot));
        let engine = Engine::start(
            output,
            time.clone(),
            Arc::clone(&sink),
            Arc::clone(&diagnostics),
            config,
        )?;
        let framing: SharedFraming = Arc::new(Mutex::new(FramingBuffer::new()));

        let ingestor = Ingestor::new(
            serial,
            Arc::clone(&framing),
            diagnostics,
            sink,
            config,
        );
        let ingest_time = time.clone();
        let (input_poll_ms, watchdog_ms) = (config.input_poll_ms, config.watchdog_timeout_ms);
        spawn_on_core(
            Core::Pro,
            config.io_priority,
            config.io_stack_kb,
            "serial-rx\0",
            move || ingestor.run(&ingest_time, input_poll_ms, watchdog_ms),
        )?;

        let dispatcher = Dispatcher::new(engine.coordinator(config), Arc::clone(&framing));
        let dispatch_poll_ms = config.dispatch_poll_ms;
        spawn_on_core(
            Core::Pro,
            config.io_priority,
            config.io_stack_kb,
            "dispatch\0",
            move || dispatcher.run(&time, dispatch_poll_ms),
        )?;

        Ok(Self { engine, framing })
    }

    pub fn engine(&self) -> &Engine<O, T> {
        &self.engine
    }

    /// Messages framed but not yet dispatched (bytes, delimiters included).
    pub fn pending_bytes(&self) -> usize {
        lock_framing(&self.framing).pending_bytes()
    }
}
