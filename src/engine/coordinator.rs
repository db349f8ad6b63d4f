//! Sequence coordinator: one message in, one [`SequenceReport`] out.
//!
//! ```text
//!   parse ─▶ arm epoch(n) ─▶ submit × n ─▶ wait(done | deadline) ─▶ report
//!                 │                               ▲
//!                 └── generation g ── Job{epoch:g} ┘  workers record_completion(g)
//! ```
//!
//! The epoch is armed *before* the first submit so a fast worker cannot
//! report into a tracker that is not yet counting. Each arm bumps the
//! generation; completions carrying an older generation (left over from a
//! timed-out message) are ignored.
//!
//! A timed-out message has its still-queued jobs purged from the board.
//! The command already on the output keeps its turn, and the next message
//! is not armed until the board is idle again.
//!
//! Durations, busy time and latency are read through [`TimePort`]. The
//! completion deadline is a real [`Duration`] handed to the condvar wait:
//! a stalled worker is exactly the case where nothing advances the port's
//! clock. On target both are the same monotonic timer.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};

use super::EngineState;
use crate::app::events::{EngineEvent, SequenceReport};
use crate::app::ports::{OutputPort, TimePort};
use crate::config::{RepeatPolicy, SystemConfig};
use crate::diagnostics::Counter;
use crate::error::{Error, Result};
use crate::protocol::parser;

// ── Epoch tracker ─────────────────────────────────────────────

#[derive(Debug, Default)]
struct EpochState {
    generation: u32,
    expected: u32,
    completed: u32,
    busy_ms: u64,
}

/// Totals for a finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochTotals {
    pub completed: u32,
    pub busy_ms: u64,
}

/// Counts worker completions against the number of accepted commands.
#[derive(Default)]
pub struct EpochTracker {
    state: Mutex<EpochState>,
    done: Condvar,
}

impl EpochTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EpochState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new epoch expecting `expected` completions; returns its
    /// generation tag.
    pub fn arm(&self, expected: u32) -> u32 {
        let mut st = self.lock();
        st.generation = st.generation.wrapping_add(1);
        st.expected = expected;
        st.completed = 0;
        st.busy_ms = 0;
        st.generation
    }

    /// Called by a worker after it released the output. Returns `false`
    /// for a stale generation.
    pub fn record_completion(&self, epoch: u32, elapsed_ms: u64) -> bool {
        let mut st = self.lock();
        if st.generation != epoch {
            debug!("epoch: dropping stale completion for generation {}", epoch);
            return false;
        }
        st.completed += 1;
        st.busy_ms += elapsed_ms;
        if st.completed >= st.expected {
            self.done.notify_all();
        }
        true
    }

    /// Block until every expected completion of `epoch` arrived, or
    /// `timeout` elapsed.
    pub fn wait(&self, epoch: u32, timeout: Duration) -> Result<EpochTotals> {
        let st = self.lock();
        let (st, _) = self
            .done
            .wait_timeout_while(st, timeout, |s| {
                s.generation == epoch && s.completed < s.expected
            })
            .unwrap_or_else(PoisonError::into_inner);

        let outstanding = st.expected.saturating_sub(st.completed);
        if st.generation != epoch || outstanding > 0 {
            return Err(Error::CompletionTimeout { outstanding });
        }
        Ok(EpochTotals {
            completed: st.completed,
            busy_ms: st.busy_ms,
        })
    }
}

// ── Coordinator ───────────────────────────────────────────────

/// Parses messages, feeds the turn board, and waits for the workers.
pub struct SequenceCoordinator<O, T> {
    state: Arc<EngineState<O, T>>,
    policy: RepeatPolicy,
    margin_ms: u32,
}

impl<O: OutputPort, T: TimePort> SequenceCoordinator<O, T> {
    pub(crate) fn new(state: Arc<EngineState<O, T>>, config: &SystemConfig) -> Self {
        Self {
            state,
            policy: config.repeat_policy,
            margin_ms: config.completion_margin_ms,
        }
    }

    /// Execute one message to completion.
    ///
    /// Commands for unrecognized channels are logged and skipped; a
    /// malformed entry truncates every pass (see [`parser::parse`]). An
    /// empty result returns a zero report without touching the workers.
    pub fn dispatch(&self, message: &[u8]) -> Result<SequenceReport> {
        let state = &self.state;
        let started = state.time.now_ticks();

        let parsed = match parser::parse(message, self.policy) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("dispatch: message rejected: {}", e);
                state.diagnostics.record(Counter::RejectedMessages);
                state.sink.emit(&EngineEvent::SequenceFailed(e));
                return Err(e);
            }
        };
        if parsed.format_error().is_some() {
            state.diagnostics.record(Counter::ParseErrors);
        }

        let expected = parsed.accepted_len() as u32;
        if parsed.is_empty() {
            debug!("dispatch: nothing to run");
            state.diagnostics.record(Counter::MessagesDispatched);
            return Ok(SequenceReport::default());
        }

        if !state.board.is_idle() {
            warn!("dispatch: waiting for a stalled command to release the output");
            state.board.wait_idle();
        }

        let epoch = state.epoch.arm(expected);
        for command in parsed.iter() {
            match state.board.submit(command, epoch) {
                Ok(()) => {}
                Err(reason @ Error::UnrecognizedChannel(_)) => {
                    state.diagnostics.record(Counter::UnrecognizedChannels);
                    state
                        .sink
                        .emit(&EngineEvent::CommandRejected { command, reason });
                }
                Err(e) => {
                    error!("dispatch: submit failed: {}", e);
                    state.diagnostics.record(Counter::RejectedMessages);
                    state.sink.emit(&EngineEvent::SequenceFailed(e));
                    return Err(e);
                }
            }
        }

        let budget = parsed.accepted_duration_ms() + u64::from(self.margin_ms);
        let totals = match state.epoch.wait(epoch, Duration::from_millis(budget)) {
            Ok(totals) => totals,
            Err(e) => {
                let purged = state.board.purge_epoch(epoch);
                error!("dispatch: {} ({} queued command(s) dropped)", e, purged);
                state.diagnostics.record(Counter::CompletionTimeouts);
                state.sink.emit(&EngineEvent::SequenceFailed(e));
                return Err(e);
            }
        };

        let report = SequenceReport {
            commands: totals.completed,
            busy_ms: totals.busy_ms,
            latency_ms: state.time.elapsed_ms(started),
        };
        info!(
            "dispatch: {} command(s) in {} ms",
            report.commands, report.latency_ms
        );
        state.diagnostics.record(Counter::MessagesDispatched);
        state.sink.emit(&EngineEvent::SequenceCompleted(report));
        Ok(report)
    }
}
