//! Mock adapters for integration tests.
//!
//! Records every lamp call so tests can assert on the full output history
//! without touching real GPIO, and runs time virtually so multi-second
//! sequences finish instantly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use trafficseq::app::events::EngineEvent;
use trafficseq::app::ports::{EventSink, OutputPort, SerialPort, TimePort};
use trafficseq::protocol::ChannelId;

// ── Lamp call record ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LampCall {
    On(ChannelId),
    Off(ChannelId),
    AllOff,
}

// ── MockLamps ─────────────────────────────────────────────────

/// Records lamp calls and panics if two channels are ever on at once.
#[derive(Default)]
pub struct MockLamps {
    pub calls: Vec<LampCall>,
    lit: Option<ChannelId>,
}

#[allow(dead_code)]
impl MockLamps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels in the order they were switched on.
    pub fn on_order(&self) -> Vec<ChannelId> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                LampCall::On(ch) => Some(*ch),
                _ => None,
            })
            .collect()
    }

    pub fn lit(&self) -> Option<ChannelId> {
        self.lit
    }
}

impl OutputPort for MockLamps {
    fn set_level(&mut self, channel: ChannelId, on: bool) {
        if on {
            assert!(
                self.lit.is_none(),
                "{channel} switched on while {:?} still lit",
                self.lit
            );
            self.lit = Some(channel);
            self.calls.push(LampCall::On(channel));
        } else {
            assert_eq!(self.lit, Some(channel), "{channel} released but not lit");
            self.lit = None;
            self.calls.push(LampCall::Off(channel));
        }
    }

    fn all_off(&mut self) {
        self.lit = None;
        self.calls.push(LampCall::AllOff);
    }
}

// ── GatedLamps ────────────────────────────────────────────────

/// Blocks every switch-on until the gate is opened; used to stall a
/// worker mid-command.
#[derive(Clone, Default)]
pub struct Gate(Arc<(Mutex<bool>, Condvar)>);

impl Gate {
    pub fn open(&self) {
        let (lock, cv) = &*self.0;
        *lock.lock().unwrap() = true;
        cv.notify_all();
    }

    fn pass(&self) {
        let (lock, cv) = &*self.0;
        let mut open = lock.lock().unwrap();
        while !*open {
            open = cv.wait(open).unwrap();
        }
    }
}

pub struct GatedLamps {
    pub gate: Gate,
    pub completed: Vec<ChannelId>,
}

impl OutputPort for GatedLamps {
    fn set_level(&mut self, channel: ChannelId, on: bool) {
        if on {
            self.gate.pass();
        } else {
            self.completed.push(channel);
        }
    }

    fn all_off(&mut self) {}
}

// ── VirtualClock ──────────────────────────────────────────────

/// Millisecond clock that only advances when somebody sleeps on it.
/// Each sleep also yields briefly for real so polling loops do not spin.
#[derive(Clone, Default)]
pub struct VirtualClock {
    now_ms: Arc<AtomicU64>,
}

#[allow(dead_code)]
impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

impl TimePort for VirtualClock {
    fn now_ticks(&self) -> u64 {
        self.now_ms()
    }

    fn ticks_to_ms(&self, ticks: u64) -> u64 {
        ticks
    }

    fn sleep_ms(&self, ms: u32) {
        self.now_ms.fetch_add(u64::from(ms), Ordering::SeqCst);
        std::thread::sleep(Duration::from_micros(200));
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &EngineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── ScriptedSerial ────────────────────────────────────────────

/// Serial port fed from a shared script; echoed bytes are captured.
#[derive(Clone, Default)]
pub struct ScriptedSerial {
    rx: Arc<Mutex<VecDeque<u8>>>,
    tx: Arc<Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_in(&self, text: &str) {
        self.rx.lock().unwrap().extend(text.bytes());
    }

    pub fn echoed(&self) -> Vec<u8> {
        self.tx.lock().unwrap().clone()
    }
}

impl SerialPort for ScriptedSerial {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.lock().unwrap().pop_front()
    }

    fn write_byte(&mut self, byte: u8) {
        self.tx.lock().unwrap().push(byte);
    }
}
