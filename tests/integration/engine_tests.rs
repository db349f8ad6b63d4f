//! Engine integration tests: coordinator, turn board and the three real
//! worker threads against mock lamps and a virtual clock.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use trafficseq::app::events::{EngineEvent, SequenceReport};
use trafficseq::app::ports::EventSink;
use trafficseq::config::{RepeatPolicy, SystemConfig};
use trafficseq::diagnostics::{Counter, Diagnostics};
use trafficseq::engine::{Engine, SequenceCoordinator};
use trafficseq::error::Error;
use trafficseq::protocol::ChannelId::{self, Green, Red, Yellow};

use crate::mock_hw::{Gate, GatedLamps, LampCall, MockLamps, RecordingSink, VirtualClock};

fn test_config() -> SystemConfig {
    SystemConfig {
        turn_poll_ms: 5,
        ..SystemConfig::default()
    }
}

struct Harness {
    engine: Engine<MockLamps, VirtualClock>,
    coordinator: SequenceCoordinator<MockLamps, VirtualClock>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn new(config: &SystemConfig) -> Self {
        let sink = RecordingSink::new();
        let dyn_sink: Arc<dyn EventSink> = sink.clone();
        let engine = Engine::start(
            MockLamps::new(),
            VirtualClock::new(),
            dyn_sink,
            Arc::new(Diagnostics::default()),
            config,
        )
        .unwrap();
        let coordinator = engine.coordinator(config);
        Self {
            engine,
            coordinator,
            sink,
        }
    }

    fn on_order(&self) -> Vec<ChannelId> {
        self.engine.with_output(|lamps| lamps.on_order())
    }

    fn calls(&self) -> Vec<LampCall> {
        self.engine.with_output(|lamps| lamps.calls.clone())
    }

    fn diag(&self, counter: Counter) -> u32 {
        self.engine.diagnostics().get(counter)
    }
}

// ── Ordering ──────────────────────────────────────────────────

#[test]
fn repeated_sequence_runs_in_submission_order() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"R,100,G,200T,2").unwrap();

    assert_eq!(
        report,
        SequenceReport {
            commands: 4,
            busy_ms: 600,
            latency_ms: 600,
        }
    );
    assert_eq!(
        h.calls(),
        [
            LampCall::AllOff,
            LampCall::On(Red),
            LampCall::Off(Red),
            LampCall::On(Green),
            LampCall::Off(Green),
            LampCall::On(Red),
            LampCall::Off(Red),
            LampCall::On(Green),
            LampCall::Off(Green),
        ]
    );
    assert!(h.engine.board().is_idle());
}

#[test]
fn interleaved_channels_follow_the_ledger() {
    let h = Harness::new(&test_config());

    h.coordinator.dispatch(b"G,10,R,10,Y,10,G,10,Y,5,R,1").unwrap();

    assert_eq!(h.on_order(), [Green, Red, Yellow, Green, Yellow, Red]);
}

#[test]
fn same_channel_back_to_back() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"Y,1,Y,2,Y,3,R,4").unwrap();

    assert_eq!(report.commands, 4);
    assert_eq!(report.busy_ms, 10);
    assert_eq!(h.on_order(), [Yellow, Yellow, Yellow, Red]);
}

#[test]
fn consecutive_messages_do_not_overlap() {
    let h = Harness::new(&test_config());

    h.coordinator.dispatch(b"R,500,G,300T,3").unwrap();
    h.coordinator.dispatch(b"Y,50").unwrap();

    assert_eq!(h.on_order(), [Red, Green, Red, Green, Red, Green, Yellow]);
    assert_eq!(h.engine.time().now_ms(), 2_450);
    assert_eq!(h.diag(Counter::MessagesDispatched), 2);
    assert_eq!(h.diag(Counter::CommandsExecuted), 7);
}

#[test]
fn long_pattern_with_repeat_keeps_exact_order() {
    let h = Harness::new(&test_config());
    let pattern = [Red, Yellow, Green, Green, Red, Yellow, Yellow, Red, Green, Red];

    let body: Vec<String> = pattern
        .iter()
        .cycle()
        .take(40)
        .map(|ch| format!("{},1", ch.symbol() as char))
        .collect();
    let message = format!("{}T,5", body.join(","));

    let report = h.coordinator.dispatch(message.as_bytes()).unwrap();

    let expected: Vec<ChannelId> = pattern.iter().copied().cycle().take(40).collect();
    let expected: Vec<ChannelId> = expected.repeat(5);
    assert_eq!(report.commands, 200);
    assert_eq!(h.on_order(), expected);
}

// ── Rejections and partial parses ─────────────────────────────

#[test]
fn unrecognized_channel_is_skipped_without_stalling() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"R,10,X,20,G,30").unwrap();

    assert_eq!(report.commands, 2);
    assert_eq!(report.busy_ms, 40);
    assert_eq!(h.on_order(), [Red, Green]);
    assert_eq!(h.diag(Counter::UnrecognizedChannels), 1);
    assert_eq!(
        h.sink
            .count(|e| matches!(e, EngineEvent::CommandRejected { reason: Error::UnrecognizedChannel(b'X'), .. })),
        1
    );

    // The engine is still healthy afterwards.
    h.coordinator.dispatch(b"Y,5").unwrap();
    assert_eq!(h.on_order(), [Red, Green, Yellow]);
}

#[test]
fn only_unrecognized_channels_complete_immediately() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"B,100,Q,5").unwrap();

    assert_eq!(report.commands, 0);
    assert!(h.on_order().is_empty());
}

#[test]
fn out_of_range_repeat_rejects_whole_message() {
    let h = Harness::new(&test_config());

    let err = h.coordinator.dispatch(b"R,10,G,10T,101").unwrap_err();

    assert_eq!(err, Error::InvalidRepeatCount(Some(101)));
    assert_eq!(h.calls(), [LampCall::AllOff]);
    assert_eq!(h.diag(Counter::RejectedMessages), 1);
    assert_eq!(
        h.sink
            .count(|e| matches!(e, EngineEvent::SequenceFailed(Error::InvalidRepeatCount(_)))),
        1
    );
}

#[test]
fn strict_policy_rejects_malformed_repeat() {
    let config = SystemConfig {
        repeat_policy: RepeatPolicy::Strict,
        ..test_config()
    };
    let h = Harness::new(&config);

    assert_eq!(
        h.coordinator.dispatch(b"R,10T,x").unwrap_err(),
        Error::InvalidRepeatCount(None)
    );
    assert!(h.on_order().is_empty());
}

#[test]
fn lenient_policy_plays_malformed_repeat_once() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"R,10,G,10T,x").unwrap();

    assert_eq!(report.commands, 2);
    assert_eq!(h.on_order(), [Red, Green]);
}

#[test]
fn malformed_entry_truncates_every_pass() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"R,5,G,bad,Y,5T,3").unwrap();

    assert_eq!(report.commands, 3);
    assert_eq!(h.on_order(), [Red, Red, Red]);
    assert_eq!(h.diag(Counter::ParseErrors), 1);
}

#[test]
fn empty_message_is_a_no_op() {
    let h = Harness::new(&test_config());

    assert_eq!(h.coordinator.dispatch(b"").unwrap(), SequenceReport::default());
    assert_eq!(h.coordinator.dispatch(b"hello").unwrap(), SequenceReport::default());
    assert!(h.on_order().is_empty());
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn completion_event_carries_report() {
    let h = Harness::new(&test_config());

    let report = h.coordinator.dispatch(b"G,25").unwrap();

    let events = h.sink.events();
    assert!(matches!(events.first(), Some(EngineEvent::Started { verbose: false })));
    assert!(matches!(
        events.last(),
        Some(EngineEvent::SequenceCompleted(r)) if *r == report
    ));
}

#[test]
fn lamp_events_only_when_verbose() {
    let h = Harness::new(&test_config());

    h.coordinator.dispatch(b"R,10").unwrap();
    assert_eq!(h.sink.count(|e| matches!(e, EngineEvent::LampOn { .. })), 0);

    h.engine.diagnostics().set_verbose(true);
    h.coordinator.dispatch(b"Y,40").unwrap();

    let events = h.sink.events();
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::LampOn {
            channel: Yellow,
            duration_ms: 40
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        EngineEvent::LampOff {
            channel: Yellow,
            elapsed_ms: 40
        }
    )));
}

// ── Stalls ────────────────────────────────────────────────────

#[test]
fn stalled_worker_times_out_and_engine_recovers() {
    let config = SystemConfig {
        completion_margin_ms: 30,
        ..test_config()
    };
    let gate = Gate::default();
    let sink: Arc<dyn EventSink> = RecordingSink::new();
    let diagnostics = Arc::new(Diagnostics::default());
    let engine = Engine::start(
        GatedLamps {
            gate: gate.clone(),
            completed: Vec::new(),
        },
        VirtualClock::new(),
        sink,
        Arc::clone(&diagnostics),
        &config,
    )
    .unwrap();
    let coordinator = engine.coordinator(&config);

    assert_eq!(
        coordinator.dispatch(b"R,0").unwrap_err(),
        Error::CompletionTimeout { outstanding: 1 }
    );
    assert_eq!(diagnostics.get(Counter::CompletionTimeouts), 1);

    gate.open();
    let report = coordinator.dispatch(b"G,0").unwrap();

    assert_eq!(report.commands, 1);
    engine.with_output(|lamps| assert_eq!(lamps.completed, [Red, Green]));
}

#[test]
fn message_after_stall_waits_for_the_stuck_turn() {
    let config = SystemConfig {
        completion_margin_ms: 30,
        ..test_config()
    };
    let gate = Gate::default();
    let sink: Arc<dyn EventSink> = RecordingSink::new();
    let clock = VirtualClock::new();
    let engine = Engine::start(
        GatedLamps {
            gate: gate.clone(),
            completed: Vec::new(),
        },
        clock.clone(),
        sink,
        Arc::new(Diagnostics::default()),
        &config,
    )
    .unwrap();
    let coordinator = engine.coordinator(&config);

    assert_eq!(
        coordinator.dispatch(b"R,200,G,100").unwrap_err(),
        Error::CompletionTimeout { outstanding: 2 }
    );
    // The deadline is real time; the port clock never moved.
    assert_eq!(clock.now_ms(), 0);
    // Green was still queued and is gone; red keeps the turn.
    assert!(engine.board().ledger_snapshot().is_empty());
    assert_eq!(engine.board().queue_len(Green), 0);
    assert_eq!(engine.board().active(), Some(Red));

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };
    let report = coordinator.dispatch(b"Y,5").unwrap();
    opener.join().unwrap();

    assert_eq!(report.commands, 1);
    assert_eq!(report.busy_ms, 5);
    engine.with_output(|lamps| assert_eq!(lamps.completed, [Red, Yellow]));
    assert!(engine.board().is_idle());
}
