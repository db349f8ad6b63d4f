//! Channel worker: one thread per lamp channel.
//!
//! ```text
//!  WaitForWork ──job queued──▶ WaitForTurn ──head & free──▶ Executing
//!       ▲                                                     │
//!       └──────────────── Reporting ◀── output released ──────┘
//! ```
//!
//! Executing holds the output lock for the whole on/sleep/off span. The
//! board lock is never taken while the output lock is held.

use std::sync::{Arc, PoisonError};

use log::{info, trace};

use super::EngineState;
use crate::app::events::EngineEvent;
use crate::app::ports::{OutputPort, TimePort};
use crate::diagnostics::Counter;
use crate::protocol::ChannelId;

pub struct ChannelWorker<O, T> {
    channel: ChannelId,
    state: Arc<EngineState<O, T>>,
}

impl<O: OutputPort, T: TimePort> ChannelWorker<O, T> {
    pub(crate) fn new(channel: ChannelId, state: Arc<EngineState<O, T>>) -> Self {
        Self { channel, state }
    }

    /// Worker thread body. Never returns.
    pub fn run(self) {
        info!("{} worker started", self.channel.name());
        loop {
            self.step();
        }
    }

    /// One full cycle: wait, execute, report.
    fn step(&self) {
        let Some(job) = self.state.board.next_job(self.channel) else {
            trace!("{} worker: spurious wake", self.channel.name());
            return;
        };

        let elapsed_ms = self.execute(job.duration_ms);
        self.state.board.finish_turn(self.channel);

        self.state.diagnostics.record(Counter::CommandsExecuted);
        self.state.diagnostics.add_busy_ms(elapsed_ms);
        self.state.epoch.record_completion(job.epoch, elapsed_ms);
    }

    fn execute(&self, duration_ms: u32) -> u64 {
        let state = &self.state;
        let verbose = state.diagnostics.verbose();

        let mut output = state.output.lock().unwrap_or_else(PoisonError::into_inner);
        let start = state.time.now_ticks();
        output.set_level(self.channel, true);
        if verbose {
            state.sink.emit(&EngineEvent::LampOn {
                channel: self.channel,
                duration_ms,
            });
        }

        state.time.sleep_ms(duration_ms);
        output.set_level(self.channel, false);
        drop(output);

        let elapsed_ms = state.time.elapsed_ms(start);
        if verbose {
            state.sink.emit(&EngineEvent::LampOff {
                channel: self.channel,
                elapsed_ms,
            });
        }
        elapsed_ms
    }
}
