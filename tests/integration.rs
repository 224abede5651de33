//! Integration tests for the queue and flush/retry protocol
//!
//! These drive the public API end-to-end against temp-dir store roots and
//! a scripted in-memory transport standing in for the collector.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::rc::Rc;
use std::time::SystemTime;

use siphon::{
    BatchReceipt, Body, Config, Error, Record, RecordStatus, Result, Siphon, TrackingStatus,
    Transport,
};
use tempfile::TempDir;

/// Shared script: queued receipts to play back, submitted batches kept
/// for inspection after the transport moves into the Siphon.
#[derive(Default)]
struct Script {
    responses: RefCell<VecDeque<Result<BatchReceipt>>>,
    batches: RefCell<Vec<Vec<String>>>,
}

impl Script {
    fn push(&self, response: Result<BatchReceipt>) {
        self.responses.borrow_mut().push_back(response);
    }

    fn call_count(&self) -> usize {
        self.batches.borrow().len()
    }

    /// Event names decoded from the records of call `call`
    fn batch_names(&self, call: usize) -> Vec<String> {
        self.batches.borrow()[call]
            .iter()
            .map(|data| {
                let value: serde_json::Value = serde_json::from_str(data).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect()
    }
}

struct ScriptedTransport {
    script: Rc<Script>,
}

impl Transport for ScriptedTransport {
    fn send_batch(&self, _stream: &str, records: &[Record]) -> Result<BatchReceipt> {
        self.script.batches.borrow_mut().push(
            records
                .iter()
                .map(|r| String::from_utf8(r.data.clone()).unwrap())
                .collect(),
        );
        self.script
            .responses
            .borrow_mut()
            .pop_front()
            .expect("unexpected batch call")
    }
}

fn receipt_rejecting(n: usize, rejects: &[usize]) -> BatchReceipt {
    BatchReceipt {
        statuses: (0..n)
            .map(|i| {
                if rejects.contains(&i) {
                    RecordStatus::rejected("ThroughputExceeded")
                } else {
                    RecordStatus::accepted()
                }
            })
            .collect(),
    }
}

fn config(tmp: &TempDir) -> Config {
    let mut config = Config::default();
    config.queue.root = Some(tmp.path().join("store"));
    config.transport.stream = Some("cli-events".to_string());
    config
}

fn scripted(tmp: &TempDir, script: &Rc<Script>) -> Siphon {
    Siphon::with_transport(
        config(tmp),
        Box::new(ScriptedTransport {
            script: Rc::clone(script),
        }),
    )
}

// ============================================
// Durability
// ============================================

#[test]
fn events_survive_process_restart_in_order() {
    let tmp = TempDir::new().unwrap();

    let mut first = Siphon::new(config(&tmp));
    first.track("one", Body::new()).unwrap();
    first.track("two", Body::new()).unwrap();
    first.close().unwrap();
    drop(first);

    let mut second = Siphon::new(config(&tmp));
    second.track("three", Body::new()).unwrap();

    let names: Vec<_> = second
        .events()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["one", "two", "three"]);
}

#[test]
fn user_id_is_stable_across_restart() {
    let tmp = TempDir::new().unwrap();

    let first = Siphon::new(config(&tmp));
    let id = first.user_id().unwrap().to_string();
    drop(first);

    let second = Siphon::new(config(&tmp));
    assert_eq!(second.user_id(), Some(id.as_str()));
}

// ============================================
// Disable / enable
// ============================================

#[test]
fn disable_is_idempotent_and_silences_tracking() {
    let tmp = TempDir::new().unwrap();
    let mut siphon = Siphon::new(config(&tmp));
    let marker = siphon.root().join("disable");

    siphon.disable().unwrap();
    siphon.disable().unwrap();
    assert!(marker.is_file());
    assert_eq!(siphon.status(), TrackingStatus::Disabled);

    siphon.track("dropped", Body::new()).unwrap();
    assert_eq!(siphon.pending_count().unwrap(), 0);

    siphon.enable().unwrap();
    assert!(!marker.exists());
    assert_eq!(siphon.status(), TrackingStatus::Enabled);
}

#[test]
fn restart_respects_persisted_opt_out() {
    let tmp = TempDir::new().unwrap();

    let mut first = Siphon::new(config(&tmp));
    first.disable().unwrap();
    drop(first);

    let mut second = Siphon::new(config(&tmp));
    assert_eq!(second.status(), TrackingStatus::Disabled);
    second.track("dropped", Body::new()).unwrap();
    assert_eq!(second.pending_count().unwrap(), 0);
}

// ============================================
// Flush decision thresholds
// ============================================

#[test]
fn below_count_threshold_closes_without_network() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());

    // Tight count threshold, age threshold far away.
    let mut cfg = config(&tmp);
    cfg.queue.flush_above_size = 5;
    cfg.queue.flush_above_age_secs = 3600;
    let mut siphon = Siphon::with_transport(
        cfg,
        Box::new(ScriptedTransport {
            script: Rc::clone(&script),
        }),
    );

    for i in 0..4 {
        siphon.track(&format!("e{}", i), Body::new()).unwrap();
    }
    siphon.maybe_flush().unwrap();

    assert_eq!(script.call_count(), 0);
    // Events stay on disk for a future run.
    assert_eq!(siphon.pending_count().unwrap(), 4);
    // The write handle is closed: further tracking is a quiet no-op.
    siphon.track("late", Body::new()).unwrap();
    assert_eq!(siphon.pending_count().unwrap(), 4);
}

#[test]
fn count_threshold_triggers_flush() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Ok(BatchReceipt::all_accepted(5)));

    let mut cfg = config(&tmp);
    cfg.queue.flush_above_size = 5;
    cfg.queue.flush_above_age_secs = 3600;
    let mut siphon = Siphon::with_transport(
        cfg,
        Box::new(ScriptedTransport {
            script: Rc::clone(&script),
        }),
    );

    for i in 0..5 {
        siphon.track(&format!("e{}", i), Body::new()).unwrap();
    }
    siphon.maybe_flush().unwrap();

    assert_eq!(script.call_count(), 1);
    assert_eq!(siphon.pending_count().unwrap(), 0);
}

#[test]
fn stale_queue_triggers_age_flush() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Ok(BatchReceipt::all_accepted(2)));

    let mut cfg = config(&tmp);
    cfg.queue.flush_above_size = 100;
    // Any elapsed time qualifies; the count threshold alone would not.
    cfg.queue.flush_above_age_secs = 0;
    let mut siphon = Siphon::with_transport(
        cfg,
        Box::new(ScriptedTransport {
            script: Rc::clone(&script),
        }),
    );

    siphon.track("a", Body::new()).unwrap();
    siphon.track("b", Body::new()).unwrap();
    siphon.maybe_flush().unwrap();

    assert_eq!(script.call_count(), 1);
    assert_eq!(siphon.pending_count().unwrap(), 0);
}

#[test]
fn unknown_flush_age_never_triggers_age_flush() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());

    let mut cfg = config(&tmp);
    cfg.queue.flush_above_size = 100;
    cfg.queue.flush_above_age_secs = 3600;
    let mut siphon = Siphon::with_transport(
        cfg,
        Box::new(ScriptedTransport {
            script: Rc::clone(&script),
        }),
    );
    siphon.track("a", Body::new()).unwrap();

    // No sentinel: the age reads as zero, not as "ancient".
    fs::remove_file(siphon.root().join("last_flush")).unwrap();
    siphon.maybe_flush().unwrap();

    assert_eq!(script.call_count(), 0);
    assert_eq!(siphon.pending_count().unwrap(), 1);
}

// ============================================
// Flush/retry protocol
// ============================================

#[test]
fn partial_rejection_retries_converge() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Ok(receipt_rejecting(10, &[2, 5, 9])));
    script.push(Ok(BatchReceipt::all_accepted(3)));

    let mut siphon = scripted(&tmp, &script);
    for i in 0..10 {
        siphon.track(&format!("e{}", i), Body::new()).unwrap();
    }

    let before = sentinel_mtime(&siphon);
    siphon.flush().unwrap();

    assert_eq!(script.call_count(), 2);
    assert_eq!(script.batch_names(1), ["e2", "e5", "e9"]);

    // Journal cleared, last-flush time advanced.
    assert_eq!(siphon.pending_count().unwrap(), 0);
    assert!(!siphon.root().join("events").exists());
    assert!(sentinel_mtime(&siphon) >= before);

    let stats = siphon.stats();
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.events_delivered, 10);
    assert_eq!(stats.records_retried, 3);
    assert_eq!(stats.send_attempts, 2);
}

#[test]
fn exhausted_retries_keep_the_journal() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Ok(receipt_rejecting(3, &[0, 1])));
    script.push(Ok(receipt_rejecting(2, &[1])));
    script.push(Ok(receipt_rejecting(1, &[0])));

    let mut siphon = scripted(&tmp, &script);
    for name in ["a", "b", "c"] {
        siphon.track(name, Body::new()).unwrap();
    }

    let err = siphon.flush().unwrap_err();
    match err {
        Error::PartialDelivery { rejected, attempts } => {
            assert_eq!(rejected, 1);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected PartialDelivery, got {:?}", other),
    }

    assert_eq!(script.call_count(), 3);

    // All original events are still queued, untouched and in order.
    let names: Vec<_> = siphon
        .events()
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
    assert_eq!(siphon.stats().flush_failures, 1);
}

#[test]
fn hard_transport_error_aborts_and_keeps_the_journal() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Err(Error::Transport("connection refused".to_string())));

    let mut siphon = scripted(&tmp, &script);
    siphon.track("a", Body::new()).unwrap();

    let err = siphon.flush().unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert_eq!(script.call_count(), 1);
    assert_eq!(siphon.pending_count().unwrap(), 1);
}

#[test]
fn empty_flush_makes_no_network_call() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    let mut siphon = scripted(&tmp, &script);

    siphon.flush().unwrap();

    assert_eq!(script.call_count(), 0);
}

#[test]
fn failed_flush_can_be_retried_later_and_succeed() {
    let tmp = TempDir::new().unwrap();
    let script = Rc::new(Script::default());
    script.push(Err(Error::Transport("timeout".to_string())));

    let mut siphon = scripted(&tmp, &script);
    siphon.track("a", Body::new()).unwrap();
    siphon.flush().unwrap_err();
    drop(siphon);

    // Next run: the same events drain successfully.
    script.push(Ok(BatchReceipt::all_accepted(1)));
    let mut siphon = scripted(&tmp, &script);
    siphon.flush().unwrap();

    assert_eq!(script.call_count(), 2);
    assert_eq!(script.batch_names(1), ["a"]);
    assert_eq!(siphon.pending_count().unwrap(), 0);
}

// ============================================
// Global fields
// ============================================

#[test]
fn global_fields_merge_without_overriding() {
    let tmp = TempDir::new().unwrap();
    let mut siphon = Siphon::new(config(&tmp));

    siphon.set_global("env", "prod");
    siphon.track("x", Body::new()).unwrap();
    siphon.track("x", Body::new().set("env", "dev")).unwrap();

    let events = siphon.events().unwrap();
    assert_eq!(events[0].body.get("env").unwrap(), "prod");
    assert_eq!(events[1].body.get("env").unwrap(), "dev");
}

fn sentinel_mtime(siphon: &Siphon) -> SystemTime {
    fs::metadata(siphon.root().join("last_flush"))
        .unwrap()
        .modified()
        .unwrap()
}
