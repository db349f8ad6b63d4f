//! Serial ingestion and dispatch loop tests, plus the fully wired
//! service running on its own threads.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use trafficseq::app::events::EngineEvent;
use trafficseq::app::ports::EventSink;
use trafficseq::app::service::{Dispatcher, Ingestor, SequencerService, SharedFraming};
use trafficseq::config::SystemConfig;
use trafficseq::diagnostics::{Counter, Diagnostics};
use trafficseq::engine::Engine;
use trafficseq::protocol::ChannelId::{Green, Red, Yellow};
use trafficseq::protocol::MAX_MESSAGE_LEN;
use trafficseq::protocol::framing::{Appended, FramingBuffer};

use crate::mock_hw::{MockLamps, RecordingSink, ScriptedSerial, VirtualClock};

struct Rig {
    serial: ScriptedSerial,
    ingestor: Ingestor<ScriptedSerial>,
    framing: SharedFraming,
    diagnostics: Arc<Diagnostics>,
    sink: Arc<RecordingSink>,
}

fn rig(config: &SystemConfig) -> Rig {
    let serial = ScriptedSerial::new();
    let framing: SharedFraming = Arc::new(Mutex::new(FramingBuffer::new()));
    let diagnostics = Arc::new(Diagnostics::default());
    let sink = RecordingSink::new();
    let dyn_sink: Arc<dyn EventSink> = sink.clone();
    let ingestor = Ingestor::new(
        serial.clone(),
        Arc::clone(&framing),
        Arc::clone(&diagnostics),
        dyn_sink,
        config,
    );
    Rig {
        serial,
        ingestor,
        framing,
        diagnostics,
        sink,
    }
}

impl Rig {
    /// Feed `text` and poll until the port is drained.
    fn type_line(&mut self, text: &str) -> Vec<Appended> {
        self.serial.type_in(text);
        std::iter::from_fn(|| self.ingestor.poll_once())
            .filter(|a| *a != Appended::Pending)
            .collect()
    }

    fn take(&self) -> Option<Vec<u8>> {
        self.framing
            .lock()
            .unwrap()
            .try_take_message()
            .map(|m| m.to_vec())
    }
}

// ── Ingestion ─────────────────────────────────────────────────

#[test]
fn idle_port_polls_none() {
    let mut r = rig(&SystemConfig::default());
    assert!(r.ingestor.poll_once().is_none());
}

#[test]
fn bytes_are_echoed_and_framed() {
    let mut r = rig(&SystemConfig::default());

    let out = r.type_line("R,5,G,7\n");

    assert_eq!(
        out,
        [Appended::Queued {
            forced: false,
            discarded: 0
        }]
    );
    assert_eq!(r.serial.echoed(), b"R,5,G,7\n");
    assert_eq!(r.take().unwrap(), b"R,5,G,7");
    assert!(r.take().is_none());
}

#[test]
fn echo_can_be_disabled() {
    let config = SystemConfig {
        echo_input: false,
        ..SystemConfig::default()
    };
    let mut r = rig(&config);

    r.type_line("Y,1\r");

    assert!(r.serial.echoed().is_empty());
    assert_eq!(r.take().unwrap(), b"Y,1");
}

#[test]
fn diagnostics_control_lines_set_verbose() {
    let mut r = rig(&SystemConfig::default());

    r.type_line("D,1\n");
    assert!(r.diagnostics.verbose());
    assert!(r.take().is_none());
    assert_eq!(
        r.sink
            .count(|e| matches!(e, EngineEvent::DiagnosticsChanged(true))),
        1
    );
    assert_eq!(r.sink.count(|e| matches!(e, EngineEvent::Metrics(_))), 1);

    r.type_line("D,1\n");
    assert!(r.diagnostics.verbose(), "D,1 sets, it does not toggle");

    r.type_line("D,0\n");
    assert!(!r.diagnostics.verbose());
    assert_eq!(
        r.sink
            .count(|e| matches!(e, EngineEvent::DiagnosticsChanged(false))),
        1
    );
}

#[test]
fn overlong_line_counts_a_framing_overflow() {
    let mut r = rig(&SystemConfig::default());

    let line = "R,1,".repeat(100);
    r.type_line(&line);

    assert_eq!(r.diagnostics.get(Counter::FramingOverflows), 1);
    assert_eq!(r.take().unwrap().len(), MAX_MESSAGE_LEN);
}

#[test]
fn ring_overflow_counts_dropped_messages() {
    let mut r = rig(&SystemConfig::default());

    // 20 × "G,1234567890" (13 bytes with delimiter) exceeds the ring.
    for _ in 0..20 {
        r.type_line("G,1234567890\n");
    }

    let dropped = r.diagnostics.get(Counter::DroppedMessages);
    assert!(dropped > 0);
    let mut kept = 0;
    while let Some(msg) = r.take() {
        assert_eq!(msg, b"G,1234567890");
        kept += 1;
    }
    assert_eq!(kept + dropped, 20);
}

// ── Dispatch loop ─────────────────────────────────────────────

#[test]
fn dispatcher_runs_framed_messages_in_arrival_order() {
    let config = SystemConfig {
        turn_poll_ms: 5,
        ..SystemConfig::default()
    };
    let mut r = rig(&config);
    let sink: Arc<dyn EventSink> = r.sink.clone();
    let engine = Engine::start(
        MockLamps::new(),
        VirtualClock::new(),
        sink,
        Arc::clone(&r.diagnostics),
        &config,
    )
    .unwrap();
    let dispatcher = Dispatcher::new(engine.coordinator(&config), Arc::clone(&r.framing));

    r.type_line("R,10,Y,20\nG,5T,2\n");

    let first = dispatcher.poll_once().unwrap().unwrap();
    let second = dispatcher.poll_once().unwrap().unwrap();
    assert!(dispatcher.poll_once().is_none());

    assert_eq!(first.commands, 2);
    assert_eq!(second.commands, 2);
    assert_eq!(
        engine.with_output(|lamps| lamps.on_order()),
        [Red, Yellow, Green, Green]
    );
}

// ── Full service ──────────────────────────────────────────────

#[test]
fn service_threads_execute_typed_sequence() {
    let config = SystemConfig {
        turn_poll_ms: 5,
        input_poll_ms: 1,
        dispatch_poll_ms: 1,
        ..SystemConfig::default()
    };
    let serial = ScriptedSerial::new();
    let sink: Arc<dyn EventSink> = RecordingSink::new();
    let service = SequencerService::start(
        &config,
        MockLamps::new(),
        VirtualClock::new(),
        serial.clone(),
        sink,
    )
    .unwrap();

    serial.type_in("D,1\nR,5,G,5T,2\n");

    let deadline = Instant::now() + Duration::from_secs(10);
    let order = loop {
        let order = service.engine().with_output(|lamps| lamps.on_order());
        if order.len() >= 4 || Instant::now() > deadline {
            break order;
        }
        std::thread::sleep(Duration::from_millis(5));
    };

    assert_eq!(order, [Red, Green, Red, Green]);
    assert!(service.engine().diagnostics().verbose());
    assert_eq!(serial.echoed(), b"D,1\nR,5,G,5T,2\n");
}
