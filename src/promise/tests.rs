use super::*;
use crate::scheduler::{Job, LabScheduler, Scheduler};
use crate::test_utils::init_test_logging;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

fn init_test(test_name: &str) {
    init_test_logging();
    crate::test_phase!(test_name);
}

fn fulfilled<T: Clone + Send + 'static>(promise: &Promise<T>) -> Option<T> {
    promise.outcome().and_then(Result::ok)
}

fn rejected_with<T: Clone + Send + 'static>(promise: &Promise<T>) -> Option<&'static str> {
    match promise.outcome() {
        Some(Err(reason)) => reason.downcast_ref::<&'static str>().copied(),
        _ => None,
    }
}

fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, Arc<Mutex<Vec<&'static str>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    (Arc::clone(&log), log)
}

#[test]
fn first_settlement_wins() {
    init_test("first_settlement_wins");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());

    assert!(p.resolve(5));
    assert!(!p.resolve(6));
    assert!(!p.reject("late"));
    lab.run_until_idle().expect("run");

    crate::assert_with_log!(fulfilled(&p) == Some(5), "value kept", Some(5), fulfilled(&p));
    assert_eq!(p.status(), Status::Fulfilled);

    let r: Promise<i32> = Promise::new(lab.handle());
    assert!(r.reject("first"));
    assert!(!r.resolve(1));
    assert!(!r.reject("second"));
    assert_eq!(rejected_with(&r), Some("first"));
    crate::test_complete!("first_settlement_wins");
}

#[test]
fn each_then_returns_independent_promise() {
    init_test("each_then_returns_independent_promise");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());

    let a = p.map(|v| v + 1);
    let b = p.and_then(|_| Step::<i32>::fault("b failed"));
    assert_ne!(a.id(), b.id());
    assert_ne!(a.id(), p.id());

    p.resolve(1);
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&a), Some(2));
    assert_eq!(rejected_with(&b), Some("b failed"));
    crate::test_complete!("each_then_returns_independent_promise");
}

#[test]
fn handlers_never_run_synchronously() {
    init_test("handlers_never_run_synchronously");
    let lab = LabScheduler::new();
    let (log, seen) = recorder();

    // Settled before registration.
    let p: Promise<i32> = Promise::resolved(lab.handle(), 3);
    let _ = p.map(move |_| log.lock().push("late"));
    assert!(seen.lock().is_empty());

    // Registered before settlement.
    let q: Promise<i32> = Promise::new(lab.handle());
    let log = Arc::clone(&seen);
    let _ = q.map(move |_| log.lock().push("early"));
    q.resolve(4);
    assert!(seen.lock().is_empty());

    lab.run_until_idle().expect("run");
    assert_eq!(*seen.lock(), vec!["late", "early"]);
    crate::test_complete!("handlers_never_run_synchronously");
}

#[test]
fn absent_handlers_pass_outcome_through() {
    init_test("absent_handlers_pass_outcome_through");
    let lab = LabScheduler::new();

    let ok: Promise<i32> = Promise::new(lab.handle());
    let passed = ok.then_with(
        None::<fn(i32) -> Step<i32>>,
        Some(|_reason: Reason| Step::value(-1)),
    );
    let caught = ok.catch(|_| Step::value(0));
    ok.resolve(7);

    let bad: Promise<i32> = Promise::new(lab.handle());
    let forwarded = bad.map(|v| v * 10);
    let both_absent: Promise<i64> =
        bad.then_with(None::<fn(i32) -> Step<i64>>, None::<fn(Reason) -> Step<i64>>);
    bad.reject("original");

    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&passed), Some(7));
    assert_eq!(fulfilled(&caught), Some(7));
    assert_eq!(rejected_with(&forwarded), Some("original"));
    assert_eq!(rejected_with(&both_absent), Some("original"));
    crate::test_complete!("absent_handlers_pass_outcome_through");
}

#[test]
fn absent_fulfillment_handler_converts_with_into() {
    init_test("absent_fulfillment_handler_converts_with_into");
    let lab = LabScheduler::new();
    let p: Promise<u8> = Promise::new(lab.handle());
    let widened: Promise<u64> =
        p.then_with(None::<fn(u8) -> Step<u64>>, None::<fn(Reason) -> Step<u64>>);
    p.resolve(200);
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&widened), Some(200_u64));
    crate::test_complete!("absent_fulfillment_handler_converts_with_into");
}

#[test]
fn faults_are_contained_to_their_reaction() {
    init_test("faults_are_contained_to_their_reaction");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());

    let faulted = p.and_then(|_| Step::<i32>::fault("E"));
    let panicked = p.map(|_| -> i32 { panic!("handler blew up") });
    let sibling = p.map(|v| v + 100);

    p.resolve(1);
    lab.run_until_idle().expect("run");

    assert_eq!(rejected_with(&faulted), Some("E"));
    match panicked.outcome() {
        Some(Err(reason)) => match reason.as_error() {
            Some(Error::HandlerPanicked { message }) => assert_eq!(message, "handler blew up"),
            other => panic!("unexpected reason: {other:?}"),
        },
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(fulfilled(&sibling), Some(101));
    assert_eq!(fulfilled(&p), Some(1));
    crate::test_complete!("faults_are_contained_to_their_reaction");
}

#[test]
fn rejection_handler_fault_rejects_derived() {
    init_test("rejection_handler_fault_rejects_derived");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::rejected(lab.handle(), "first");
    let derived = p.catch(|_| Step::fault("second"));
    lab.run_until_idle().expect("run");
    assert_eq!(rejected_with(&derived), Some("second"));
    crate::test_complete!("rejection_handler_fault_rejects_derived");
}

#[test]
fn handled_rejection_becomes_fulfillment() {
    init_test("handled_rejection_becomes_fulfillment");
    let lab = LabScheduler::new();
    let p: Promise<u8> = Promise::new(lab.handle());
    let derived: Promise<usize> = p.then_with(
        None::<fn(u8) -> Step<usize>>,
        Some(|reason: Reason| {
            Step::value(reason.downcast_ref::<&str>().map_or(0, |s| s.len()))
        }),
    );
    p.reject("boom");
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&derived), Some(4));
    crate::test_complete!("handled_rejection_becomes_fulfillment");
}

#[test]
fn adopts_promise_returned_by_handler() {
    init_test("adopts_promise_returned_by_handler");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let inner: Promise<&'static str> = Promise::new(lab.handle());
    let inner_for_handler = inner.clone();
    let derived = p.and_then(move |_| Step::<&'static str>::adopt(inner_for_handler));

    p.resolve(1);
    lab.run_until_idle().expect("run");
    assert!(derived.is_pending());
    assert!(format!("{derived:?}").contains("following: true"));

    // The derived promise is locked in; producer calls are ignored.
    assert!(!derived.resolve("hijack"));

    inner.resolve("w");
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&derived), Some("w"));
    crate::test_complete!("adopts_promise_returned_by_handler");
}

#[test]
fn adoption_mirrors_rejection() {
    init_test("adoption_mirrors_rejection");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::rejected(lab.handle(), "outer");
    let inner: Promise<i32> = Promise::new(lab.handle());
    let inner_for_handler = inner.clone();
    let derived = p.catch(move |_| Step::<i32>::adopt(inner_for_handler));

    lab.run_until_idle().expect("run");
    inner.reject("inner");
    lab.run_until_idle().expect("run");
    assert_eq!(rejected_with(&derived), Some("inner"));
    crate::test_complete!("adoption_mirrors_rejection");
}

#[test]
fn chains_of_thenables_flatten() {
    init_test("chains_of_thenables_flatten");
    let lab = LabScheduler::new();
    let innermost: Promise<i32> = Promise::new(lab.handle());
    let middle: Promise<i32> = Promise::new(lab.handle());
    middle.adopt(innermost.clone());

    let p: Promise<i32> = Promise::resolved(lab.handle(), 0);
    let derived = p.and_then(move |_| Step::<i32>::adopt(middle));

    lab.run_until_idle().expect("run");
    assert!(derived.is_pending());

    innermost.resolve(42);
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&derived), Some(42));
    crate::test_complete!("chains_of_thenables_flatten");
}

#[test]
fn producer_adopt_locks_in() {
    init_test("producer_adopt_locks_in");
    let lab = LabScheduler::new();
    let source: Promise<i32> = Promise::new(lab.handle());
    let follower: Promise<i32> = Promise::new(lab.handle());

    follower.adopt(source.clone());
    assert_eq!(follower.status(), Status::Pending);
    assert!(!follower.resolve(1));
    assert!(!follower.reject("nope"));

    let other: Promise<i32> = Promise::resolved(lab.handle(), 9);
    follower.adopt(other);

    source.resolve(2);
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&follower), Some(2));
    crate::test_complete!("producer_adopt_locks_in");
}

#[test]
fn self_adoption_rejects() {
    init_test("self_adoption_rejects");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    p.adopt(p.clone());
    match p.outcome() {
        Some(Err(reason)) => {
            assert!(matches!(reason.as_error(), Some(Error::SelfResolution { id }) if *id == p.id()));
        }
        other => panic!("expected self-resolution rejection, got {other:?}"),
    }
    crate::test_complete!("self_adoption_rejects");
}

#[test]
fn handler_returning_its_own_derived_promise_rejects() {
    init_test("handler_returning_its_own_derived_promise_rejects");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let slot: Arc<Mutex<Option<Promise<i32>>>> = Arc::new(Mutex::new(None));
    let slot_for_handler = Arc::clone(&slot);
    let derived = p.and_then(move |_| {
        let me = slot_for_handler.lock().clone().expect("derived stored");
        Step::<i32>::adopt(me)
    });
    *slot.lock() = Some(derived.clone());

    p.resolve(1);
    lab.run_until_idle().expect("run");
    match derived.outcome() {
        Some(Err(reason)) => {
            assert!(matches!(reason.as_error(), Some(Error::SelfResolution { .. })));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    crate::test_complete!("handler_returning_its_own_derived_promise_rejects");
}

struct ImmediateThenable(Result<i32, &'static str>);

impl Thenable<i32> for ImmediateThenable {
    fn subscribe(self: Box<Self>, settle: Settle<i32>) {
        match self.0 {
            Ok(value) => settle.fulfill(value),
            Err(reason) => settle.reject(reason),
        }
    }
}

struct PanickingThenable;

impl Thenable<i32> for PanickingThenable {
    fn subscribe(self: Box<Self>, _settle: Settle<i32>) {
        panic!("subscribe exploded");
    }
}

#[test]
fn foreign_thenables_are_adopted() {
    init_test("foreign_thenables_are_adopted");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::resolved(lab.handle(), 0);
    let ok = p.and_then(|_| Step::<i32>::adopt(ImmediateThenable(Ok(11))));
    let err = p.and_then(|_| Step::<i32>::adopt(ImmediateThenable(Err("foreign"))));
    let exploded = p.and_then(|_| Step::<i32>::adopt(PanickingThenable));

    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&ok), Some(11));
    assert_eq!(rejected_with(&err), Some("foreign"));
    match exploded.outcome() {
        Some(Err(reason)) => assert!(matches!(
            reason.as_error(),
            Some(Error::AdoptionPanicked { message }) if message == "subscribe exploded"
        )),
        other => panic!("expected rejection, got {other:?}"),
    }
    crate::test_complete!("foreign_thenables_are_adopted");
}

#[test]
fn reactions_fire_in_registration_order() {
    init_test("reactions_fire_in_registration_order");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let (log, seen) = recorder();

    for label in ["first", "second", "third"] {
        let log = Arc::clone(&log);
        let _ = p.map(move |_| log.lock().push(label));
    }
    p.resolve(0);
    lab.run_until_idle().expect("run");
    assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    crate::test_complete!("reactions_fire_in_registration_order");
}

#[test]
fn settlement_defers_single_drain_job() {
    init_test("settlement_defers_single_drain_job");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    for _ in 0..5 {
        let _ = p.map(|v| v);
    }
    assert_eq!(lab.pending(), 0);
    p.resolve(1);
    assert_eq!(lab.pending(), 1);
    assert!(lab.step());
    // Each derived promise settled inside the drain but has no reactions.
    assert_eq!(lab.pending(), 0);
    crate::test_complete!("settlement_defers_single_drain_job");
}

#[test]
fn late_registration_queues_behind_pending_drain() {
    init_test("late_registration_queues_behind_pending_drain");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let (log, seen) = recorder();

    let early = Arc::clone(&log);
    let _ = p.map(move |_| early.lock().push("queued"));
    p.resolve(1);
    let late = Arc::clone(&log);
    let _ = p.map(move |_| late.lock().push("registered after settle"));

    lab.run_until_idle().expect("run");
    assert_eq!(*seen.lock(), vec!["queued", "registered after settle"]);
    crate::test_complete!("late_registration_queues_behind_pending_drain");
}

#[test]
fn handler_may_touch_its_source_promise() {
    init_test("handler_may_touch_its_source_promise");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let source = p.clone();
    let derived = p.map(move |v| {
        // Re-entrant registration and redundant settlement must not deadlock.
        let _ = source.map(|x| x);
        source.resolve(v + 1);
        source.status()
    });
    p.resolve(1);
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&derived), Some(Status::Fulfilled));
    assert_eq!(fulfilled(&p), Some(1));
    crate::test_complete!("handler_may_touch_its_source_promise");
}

#[test]
fn result_converts_into_step() {
    init_test("result_converts_into_step");
    let lab = LabScheduler::new();
    let p: Promise<&'static str> = Promise::new(lab.handle());
    let parsed: Promise<i32> = p.and_then(|s| s.parse::<i32>().map_err(|e| e.to_string()).into());
    let failed: Promise<u8> = p.and_then(|s| s.parse::<u8>().map_err(|_| "not a byte").into());
    p.resolve("300");
    lab.run_until_idle().expect("run");
    assert_eq!(fulfilled(&parsed), Some(300));
    assert_eq!(rejected_with(&failed), Some("not a byte"));
    crate::test_complete!("result_converts_into_step");
}

#[test]
fn debug_output_names_id_and_status() {
    init_test("debug_output_names_id_and_status");
    let lab = LabScheduler::new();
    let p: Promise<i32> = Promise::new(lab.handle());
    let _ = p.map(|v| v);
    let debug = format!("{p:?}");
    assert!(debug.contains("Promise"));
    assert!(debug.contains("Pending"));
    assert!(debug.contains("reactions: 1"));
    crate::test_complete!("debug_output_names_id_and_status");
}

#[derive(Clone)]
struct Exploding;

impl From<Exploding> for u64 {
    fn from(_: Exploding) -> Self {
        panic!("conversion blew up")
    }
}

#[test]
fn panicking_pass_through_conversion_is_contained() {
    init_test("panicking_pass_through_conversion_is_contained");
    let lab = LabScheduler::new();
    let p: Promise<Exploding> = Promise::new(lab.handle());
    let converted: Promise<u64> = p.then_with(
        None::<fn(Exploding) -> Step<u64>>,
        None::<fn(Reason) -> Step<u64>>,
    );
    let later = p.map(|_| 7_u8);

    p.resolve(Exploding);
    lab.run_until_idle().expect("run");

    match converted.outcome() {
        Some(Err(reason)) => match reason.as_error() {
            Some(Error::HandlerPanicked { message }) => assert_eq!(message, "conversion blew up"),
            other => panic!("unexpected reason: {other:?}"),
        },
        other => panic!("expected rejection, got {other:?}"),
    }
    let later_value = fulfilled(&later);
    crate::assert_with_log!(
        later_value == Some(7),
        "rest of the batch still drains",
        Some(7_u8),
        later_value
    );
    crate::test_complete!("panicking_pass_through_conversion_is_contained");
}

/// Lab scheduler whose first `defer` call parks until released.
struct GatedScheduler {
    lab: LabScheduler,
    entered: mpsc::Sender<()>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl Scheduler for GatedScheduler {
    fn defer(&self, job: Job) {
        let gate = self.release.lock().take();
        if let Some(release) = gate {
            let _ = self.entered.send(());
            let _ = release.recv();
        }
        self.lab.defer(job);
    }
}

#[test]
fn registration_racing_settlement_keeps_fifo_order() {
    init_test("registration_racing_settlement_keeps_fifo_order");
    let lab = LabScheduler::new();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let scheduler: SchedulerRef = Arc::new(GatedScheduler {
        lab: lab.clone(),
        entered: entered_tx,
        release: Mutex::new(Some(release_rx)),
    });
    let p: Promise<i32> = Promise::new(scheduler);
    let (log, seen) = recorder();

    let first = Arc::clone(&log);
    let _ = p.map(move |_| first.lock().push("registered-first"));

    // The producer parks inside the scheduler while handing off the batch.
    let producer = {
        let p = p.clone();
        thread::spawn(move || p.resolve(1))
    };
    entered_rx.recv().expect("producer reached the scheduler");

    let registrar = {
        let p = p.clone();
        let second = Arc::clone(&log);
        thread::spawn(move || {
            let _ = p.map(move |_| second.lock().push("registered-second"));
        })
    };
    thread::sleep(Duration::from_millis(20));
    release_tx.send(()).expect("release producer");

    assert!(producer.join().expect("producer"));
    registrar.join().expect("registrar");
    lab.run_until_idle().expect("run");

    assert_eq!(*seen.lock(), vec!["registered-first", "registered-second"]);
    crate::test_complete!("registration_racing_settlement_keeps_fifo_order");
}
