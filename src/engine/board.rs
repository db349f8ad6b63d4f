//! Turn board: per-channel job queues plus the global order ledger.
//!
//! ```text
//!   submit(G:300) ──▶ queues[G].push(300)   ledger.push(G)   notify work[G]
//!
//!   ledger: [R, G, R, G]        active: None
//!            ▲
//!            └─ only the worker whose channel is at the head may claim;
//!               claiming pops the head and marks the channel active until
//!               finish_turn(), so the next holder cannot start early.
//! ```
//!
//! Everything lives behind one mutex. Each channel has its own "work"
//! condvar for the empty-queue wait, and a single "turn" condvar is
//! broadcast whenever the ledger head or the active holder changes.
//! The turn wait additionally re-checks on a bounded poll interval.
//!
//! Ledger slots carry the epoch of the job they stand for, so a stalled
//! message can be purged without disturbing anyone else's turn order.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::protocol::{ChannelId, Command};

const CHANNELS: usize = ChannelId::ALL.len();

/// One queued unit of work. `epoch` ties the completion back to the
/// message that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub duration_ms: u32,
    pub epoch: u32,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    channel: ChannelId,
    epoch: u32,
}

struct BoardState {
    queues: [VecDeque<Job>; CHANNELS],
    ledger: VecDeque<Slot>,
    active: Option<ChannelId>,
}

impl BoardState {
    fn claim(&mut self, channel: ChannelId) -> bool {
        if self.active.is_some() || self.ledger.front().map(|s| s.channel) != Some(channel) {
            return false;
        }
        self.ledger.pop_front();
        self.active = Some(channel);
        true
    }
}

/// Shared scheduling state for the three channel workers.
pub struct TurnBoard {
    state: Mutex<BoardState>,
    work: [Condvar; CHANNELS],
    turn: Condvar,
    turn_poll: Duration,
}

impl TurnBoard {
    /// `reserve` entries are pre-allocated per queue and for the ledger;
    /// beyond that, growth is fallible.
    pub fn new(reserve: usize, turn_poll_ms: u32) -> Result<Self> {
        let mut queues: [VecDeque<Job>; CHANNELS] = Default::default();
        for q in &mut queues {
            q.try_reserve(reserve)?;
        }
        let mut ledger = VecDeque::new();
        ledger.try_reserve(reserve * CHANNELS)?;

        Ok(Self {
            state: Mutex::new(BoardState {
                queues,
                ledger,
                active: None,
            }),
            work: Default::default(),
            turn: Condvar::new(),
            turn_poll: Duration::from_millis(u64::from(turn_poll_ms)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue the duration on its channel and append the channel to the
    /// ledger in one step, then wake that channel's worker.
    pub fn submit(&self, command: Command, epoch: u32) -> Result<()> {
        let Some(idx) = command.channel.index() else {
            return Err(Error::UnrecognizedChannel(command.channel.symbol()));
        };

        let mut st = self.lock();
        st.queues[idx].try_reserve(1)?;
        st.ledger.try_reserve(1)?;
        st.queues[idx].push_back(Job {
            duration_ms: command.duration_ms,
            epoch,
        });
        st.ledger.push_back(Slot {
            channel: command.channel,
            epoch,
        });
        drop(st);

        trace!("board: submitted {}", command);
        self.work[idx].notify_one();
        self.turn.notify_all();
        Ok(())
    }

    /// Claim the turn if `channel` is at the ledger head and nobody holds
    /// the output. A successful claim must be paired with [`finish_turn`](Self::finish_turn).
    pub fn try_claim_turn(&self, channel: ChannelId) -> bool {
        let claimed = self.lock().claim(channel);
        if claimed {
            self.turn.notify_all();
        }
        claimed
    }

    /// Block until `channel` has queued work *and* holds the turn, then pop
    /// its next job. `None` means the wake was spurious and the turn has
    /// already been given back; the caller simply loops.
    pub fn next_job(&self, channel: ChannelId) -> Option<Job> {
        let idx = channel.index()?;
        let mut st = self.lock();

        while st.queues[idx].is_empty() {
            st = self.work[idx]
                .wait(st)
                .unwrap_or_else(PoisonError::into_inner);
        }

        while !st.claim(channel) {
            st = self
                .turn
                .wait_timeout(st, self.turn_poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }

        match st.queues[idx].pop_front() {
            Some(job) => Some(job),
            None => {
                st.active = None;
                drop(st);
                self.turn.notify_all();
                None
            }
        }
    }

    /// Release the turn held by `channel` and wake everyone waiting on it.
    pub fn finish_turn(&self, channel: ChannelId) {
        let mut st = self.lock();
        if st.active == Some(channel) {
            st.active = None;
        }
        drop(st);
        self.turn.notify_all();
    }

    /// Drop every queued job and ledger slot belonging to `epoch`. A job
    /// already executing is left alone; its turn ends via `finish_turn`.
    ///
    /// Returns the number of jobs removed.
    pub fn purge_epoch(&self, epoch: u32) -> usize {
        let mut st = self.lock();
        let mut removed = 0;
        for q in &mut st.queues {
            let before = q.len();
            q.retain(|job| job.epoch != epoch);
            removed += before - q.len();
        }
        st.ledger.retain(|slot| slot.epoch != epoch);
        drop(st);

        if removed > 0 {
            debug!("board: purged {} job(s) of epoch {}", removed, epoch);
        }
        self.turn.notify_all();
        removed
    }

    /// Block until [`is_idle`](Self::is_idle) holds.
    pub fn wait_idle(&self) {
        let mut st = self.lock();
        while st.active.is_some() || !st.ledger.is_empty() {
            st = self
                .turn
                .wait_timeout(st, self.turn_poll)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Pending ledger entries, head first.
    pub fn ledger_snapshot(&self) -> Vec<ChannelId> {
        self.lock().ledger.iter().map(|s| s.channel).collect()
    }

    pub fn queue_len(&self, channel: ChannelId) -> usize {
        channel
            .index()
            .map_or(0, |idx| self.lock().queues[idx].len())
    }

    pub fn active(&self) -> Option<ChannelId> {
        self.lock().active
    }

    /// No queued work, no pending turns, nobody executing.
    pub fn is_idle(&self) -> bool {
        let st = self.lock();
        st.active.is_none() && st.ledger.is_empty()
    }
}
