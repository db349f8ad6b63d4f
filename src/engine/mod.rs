//! Turn-ordered sequencing engine.
//!
//! Three channel workers share one output. Commands execute in exactly
//! the order they were submitted, regardless of channel, with at most one
//! command driving the output at any instant.
//!
//! ```text
//!                      ┌────────────┐
//!  SequenceCoordinator │ TurnBoard  │  queues[R|Y|G] + ledger + active
//!   ─── submit ───────▶│            │◀── next_job / finish_turn ── ChannelWorker ×3
//!                      └────────────┘                                   │
//!   ◀── wait ── EpochTracker ◀── record_completion ─────────────────────┤
//!                                                   Mutex<OutputPort> ◀─┘
//! ```

pub mod board;
pub mod coordinator;
pub mod worker;

use std::sync::{Arc, Mutex, PoisonError};

use log::info;

pub use board::{Job, TurnBoard};
pub use coordinator::{EpochTotals, EpochTracker, SequenceCoordinator};
pub use worker::ChannelWorker;

use crate::app::events::EngineEvent;
use crate::app::ports::{EventSink, OutputPort, TimePort};
use crate::config::SystemConfig;
use crate::diagnostics::Diagnostics;
use crate::drivers::task_pin::{Core, spawn_on_core};
use crate::error::Result;
use crate::protocol::ChannelId;

/// NUL-terminated FreeRTOS task names, in [`ChannelId::ALL`] order.
const WORKER_NAMES: [&str; 3] = ["lamp-red\0", "lamp-yellow\0", "lamp-green\0"];

/// State shared by the coordinator and every worker.
pub struct EngineState<O, T> {
    pub(crate) board: TurnBoard,
    pub(crate) epoch: EpochTracker,
    pub(crate) output: Mutex<O>,
    pub(crate) time: T,
    pub(crate) sink: Arc<dyn EventSink>,
    pub(crate) diagnostics: Arc<Diagnostics>,
}

/// Handle to a running engine.
pub struct Engine<O, T> {
    state: Arc<EngineState<O, T>>,
}

impl<O, T> Engine<O, T>
where
    O: OutputPort + 'static,
    T: TimePort + 'static,
{
    /// Build the shared state and spawn the three channel workers.
    pub fn start(
        mut output: O,
        time: T,
        sink: Arc<dyn EventSink>,
        diagnostics: Arc<Diagnostics>,
        config: &SystemConfig,
    ) -> Result<Self> {
        config.validate()?;
        output.all_off();

        let state = Arc::new(EngineState {
            board: TurnBoard::new(config.queue_reserve, config.turn_poll_ms)?,
            epoch: EpochTracker::new(),
            output: Mutex::new(output),
            time,
            sink,
            diagnostics,
        });

        for (channel, name) in ChannelId::ALL.into_iter().zip(WORKER_NAMES) {
            let worker = ChannelWorker::new(channel, Arc::clone(&state));
            spawn_on_core(
                Core::App,
                config.worker_priority,
                config.worker_stack_kb,
                name,
                move || worker.run(),
            )?;
        }

        let verbose = state.diagnostics.verbose();
        info!("engine: {} workers running", WORKER_NAMES.len());
        state.sink.emit(&EngineEvent::Started { verbose });
        Ok(Self { state })
    }

    pub fn coordinator(&self, config: &SystemConfig) -> SequenceCoordinator<O, T> {
        SequenceCoordinator::new(Arc::clone(&self.state), config)
    }

    pub fn board(&self) -> &TurnBoard {
        &self.state.board
    }

    pub fn time(&self) -> &T {
        &self.state.time
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.state.diagnostics
    }

    /// Run `f` with exclusive access to the output (blocks while a worker
    /// is executing).
    pub fn with_output<R>(&self, f: impl FnOnce(&mut O) -> R) -> R {
        let mut output = self
            .state
            .output
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut output)
    }
}
