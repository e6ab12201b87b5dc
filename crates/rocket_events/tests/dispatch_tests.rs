//! Integration tests for subscription matching and dispatch
//!
//! These tests drive the public `EventManager` surface end-to-end: matching
//! across all four selector kinds, the three execution targets with their
//! completion contract, reentrant registry changes and fault isolation.

use parking_lot::Mutex;
use rocket_events::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout, Duration};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct Gate;

impl Emitter for Gate {}

#[derive(Debug)]
struct Portal;

impl Emitter for Portal {}

#[derive(Debug)]
struct ChatMessage {
    meta: EventMeta,
    text: String,
}

impl ChatMessage {
    fn new(text: &str) -> Self {
        Self {
            meta: EventMeta::new("ChatMessage"),
            text: text.to_string(),
        }
    }
}

impl Event for ChatMessage {
    fn meta(&self) -> &EventMeta {
        &self.meta
    }
}

fn named(name: &str) -> Arc<dyn Emitter> {
    Arc::new(NamedEmitter::new(name))
}

fn generic(name: &str, target: ExecutionTarget) -> Arc<dyn Event> {
    Arc::new(GenericEvent::new(name).with_target(target))
}

/// Subscribes a handler that appends `tag` to `log` when invoked.
fn record(
    events: &EventManager,
    owner: &LifecycleOwner,
    name: &str,
    log: &Arc<Mutex<Vec<usize>>>,
    tag: usize,
) {
    let log = log.clone();
    events
        .subscribe(owner, name, move |_, _| {
            log.lock().push(tag);
            Ok(())
        })
        .expect("subscribe");
}

/// Emits and waits for the completion callback.
async fn emit_and_wait(
    events: &EventManager,
    emitter: Arc<dyn Emitter>,
    event: Arc<dyn Event>,
) -> Arc<dyn Event> {
    timeout(WAIT, events.emit_wait(emitter, event))
        .await
        .expect("completion within timeout")
        .expect("completion fired")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_name_subscription_matches_case_insensitively_for_any_type() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("listener");
    let hits = Arc::new(AtomicUsize::new(0));

    let counter = hits.clone();
    events
        .subscribe(&owner, "chatmessage", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("subscribe");

    events.emit(Arc::new(Gate), Arc::new(ChatMessage::new("hi")));
    events.emit(Arc::new(Gate), generic("CHATMESSAGE", ExecutionTarget::Synchronous));
    events.emit(Arc::new(Gate), generic("ChatMessages", ExecutionTarget::Synchronous));

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_emitter_scoped_subscriptions_ignore_other_emitters() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("listener");
    let hits = Arc::new(AtomicUsize::new(0));

    let by_name = hits.clone();
    events
        .subscribe_emitter(&owner, "Console", "Reload", move |_, _| {
            by_name.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("scoped by name");
    let by_type = hits.clone();
    events
        .subscribe_emitter_typed::<ChatMessage, Gate, _>(&owner, move |_, _| {
            by_type.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .expect("scoped by type");

    // Wrong emitter for both
    events.emit(named("rcon"), generic("Reload", ExecutionTarget::Synchronous));
    events.emit(Arc::new(Portal), Arc::new(ChatMessage::new("hi")));
    // Unnamed emitter never matches a name-scoped subscription
    events.emit(Arc::new(Gate), generic("Reload", ExecutionTarget::Synchronous));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    events.emit(named("console"), generic("reload", ExecutionTarget::Synchronous));
    events.emit(Arc::new(Gate), Arc::new(ChatMessage::new("hi")));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsubscribe_owner_removes_every_subscription() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    let other = LifecycleOwner::new("other");
    let log = Arc::new(Mutex::new(Vec::new()));

    record(&events, &owner, "Tick", &log, 1);
    record(&events, &other, "Tick", &log, 2);
    let typed_log = log.clone();
    events
        .subscribe_typed::<GenericEvent, _>(&owner, move |_, _| {
            typed_log.lock().push(3);
            Ok(())
        })
        .expect("typed");
    events
        .subscribe_emitter(&owner, "clock", "Tick", |_, _| Ok(()))
        .expect("scoped");

    assert_eq!(events.unsubscribe(&owner), 3);
    assert!(events.subscriptions_of(&owner).is_empty());

    events.emit(named("clock"), generic("Tick", ExecutionTarget::Synchronous));
    assert_eq!(*log.lock(), vec![2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsubscribe_absent_selector_is_noop() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    events.subscribe(&owner, "Tick", |_, _| Ok(())).expect("subscribe");

    for _ in 0..2 {
        assert_eq!(events.unsubscribe_event(&owner, "Tock"), 0);
        assert_eq!(events.unsubscribe_typed::<ChatMessage>(&owner), 0);
        assert_eq!(events.unsubscribe_emitter(&owner, "clock", "Tick"), 0);
        assert_eq!(events.unsubscribe_emitter_typed::<ChatMessage, Gate>(&owner), 0);
        assert_eq!(events.unsubscribe(&LifecycleOwner::new("stranger")), 0);
    }
    assert_eq!(events.subscription_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_synchronous_handlers_run_in_registration_order_across_kinds() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    let log = Arc::new(Mutex::new(Vec::new()));

    record(&events, &owner, "Tick", &log, 1);
    let typed = log.clone();
    events
        .subscribe_typed::<GenericEvent, _>(&owner, move |_, _| {
            typed.lock().push(2);
            Ok(())
        })
        .expect("typed");
    let scoped = log.clone();
    events
        .subscribe_emitter(&owner, "clock", "tick", move |_, _| {
            scoped.lock().push(3);
            Ok(())
        })
        .expect("scoped");
    record(&events, &owner, "TICK", &log, 4);

    events.emit(named("Clock"), generic("Tick", ExecutionTarget::Synchronous));

    // Synchronous dispatch has finished when emit returns
    assert_eq!(*log.lock(), vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_asynchronous_handlers_run_in_order_off_the_calling_thread() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    let log = Arc::new(Mutex::new(Vec::new()));
    let threads: Arc<Mutex<Vec<ThreadId>>> = Arc::new(Mutex::new(Vec::new()));
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    let first_log = log.clone();
    let first_threads = threads.clone();
    events
        .subscribe(&owner, "Save", move |_, _| {
            // Blocks until the test observed that emit returned
            let released = release_rx.lock().recv_timeout(WAIT).is_ok();
            first_threads.lock().push(thread::current().id());
            first_log.lock().push(if released { 1 } else { 0 });
            Ok(())
        })
        .expect("first");
    for tag in 2..=5 {
        let log = log.clone();
        let threads = threads.clone();
        events
            .subscribe(&owner, "Save", move |_, _| {
                threads.lock().push(thread::current().id());
                log.lock().push(tag);
                Ok(())
            })
            .expect("subscribe");
    }

    let (done_tx, done_rx) = oneshot::channel();
    let completion_log = log.clone();
    events.emit_with_completion(
        named("world"),
        generic("Save", ExecutionTarget::Asynchronous),
        move |_| {
            let _ = done_tx.send(completion_log.lock().clone());
        },
    );
    release_tx.send(()).expect("handler waiting");

    let seen_at_completion = timeout(WAIT, done_rx).await.expect("completion").expect("sent");
    assert_eq!(seen_at_completion, vec![1, 2, 3, 4, 5]);

    let caller = thread::current().id();
    let threads = threads.lock();
    assert_eq!(threads.len(), 5);
    assert!(threads.iter().all(|id| *id != caller));
    assert!(threads.iter().all(|id| *id == threads[0]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_completion_fires_once_after_all_handlers() {
    const HANDLERS: usize = 32;
    const EMITS: usize = 10;

    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    let finished = Arc::new(AtomicUsize::new(0));

    for i in 0..HANDLERS {
        let finished = finished.clone();
        events
            .subscribe(&owner, "Physics", move |_, _| {
                thread::sleep(std::time::Duration::from_millis((i % 4) as u64 * 5));
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("subscribe");
    }

    let completions = Arc::new(AtomicUsize::new(0));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    for _ in 0..EMITS {
        let completions = completions.clone();
        let observed = observed.clone();
        let finished = finished.clone();
        let tx = tx.clone();
        events.emit_with_completion(
            named("physics"),
            generic("Physics", ExecutionTarget::Parallel),
            move |_| {
                observed.lock().push(finished.load(Ordering::SeqCst));
                completions.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            },
        );
    }

    for _ in 0..EMITS {
        timeout(WAIT, rx.recv()).await.expect("completion").expect("open");
    }
    sleep(Duration::from_millis(50)).await;

    assert_eq!(completions.load(Ordering::SeqCst), EMITS);
    assert_eq!(finished.load(Ordering::SeqCst), HANDLERS * EMITS);

    // Each completion saw at least its own emit's handlers finished
    let observed = observed.lock();
    assert!(observed.iter().all(|count| *count >= HANDLERS));
    assert_eq!(observed.iter().max().copied(), Some(HANDLERS * EMITS));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_parallel_join_waits_for_slow_handler() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");
    let finished = Arc::new(AtomicUsize::new(0));

    for delay in [0u64, 40, 5] {
        let finished = finished.clone();
        events
            .subscribe(&owner, "Batch", move |_, _| {
                thread::sleep(std::time::Duration::from_millis(delay));
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("subscribe");
    }

    let seen = finished.clone();
    let (tx, rx) = oneshot::channel();
    events.emit_with_completion(
        named("batch"),
        generic("Batch", ExecutionTarget::Parallel),
        move |_| {
            let _ = tx.send(seen.load(Ordering::SeqCst));
        },
    );

    assert_eq!(timeout(WAIT, rx).await.expect("completion").expect("sent"), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reentrant_unsubscribe_does_not_skip_or_repeat_siblings() {
    let events = Arc::new(EventManager::new().expect("manager"));
    let first = LifecycleOwner::new("first");
    let second = LifecycleOwner::new("second");
    let log = Arc::new(Mutex::new(Vec::new()));

    let weak: Weak<EventManager> = Arc::downgrade(&events);
    let handler_log = log.clone();
    let (me, sibling) = (first.clone(), second.clone());
    events
        .subscribe(&first, "Kick", move |_, _| {
            handler_log.lock().push(1);
            if let Some(events) = weak.upgrade() {
                events.unsubscribe(&me);
                events.unsubscribe_event(&sibling, "Kick");
            }
            Ok(())
        })
        .expect("first");
    record(&events, &second, "Kick", &log, 2);
    record(&events, &second, "Kick", &log, 3);

    events.emit(named("admin"), generic("Kick", ExecutionTarget::Synchronous));
    assert_eq!(*log.lock(), vec![1, 2, 3]);
    assert_eq!(events.subscription_count(), 0);

    events.emit(named("admin"), generic("Kick", ExecutionTarget::Synchronous));
    assert_eq!(*log.lock(), vec![1, 2, 3]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_handler_subscribing_during_dispatch_is_not_invoked_in_same_pass() {
    let events = Arc::new(EventManager::new().expect("manager"));
    let owner = LifecycleOwner::new("module");
    let hits = Arc::new(AtomicUsize::new(0));

    let weak = Arc::downgrade(&events);
    let late_owner = owner.clone();
    let late_hits = hits.clone();
    events
        .subscribe(&owner, "Spawn", move |_, _| {
            if let Some(events) = weak.upgrade() {
                let hits = late_hits.clone();
                events
                    .subscribe(&late_owner, "Spawn", move |_, _| {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .map(|_| ())?;
            }
            Ok(())
        })
        .expect("subscribe");

    events.emit(named("world"), generic("Spawn", ExecutionTarget::Synchronous));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(events.subscription_count(), 2);

    events.emit(named("world"), generic("Spawn", ExecutionTarget::Synchronous));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_handlers_are_isolated() {
    for target in [
        ExecutionTarget::Synchronous,
        ExecutionTarget::Asynchronous,
        ExecutionTarget::Parallel,
    ] {
        let events = EventManager::new().expect("manager");
        let owner = LifecycleOwner::new("module");
        let log = Arc::new(Mutex::new(Vec::new()));

        record(&events, &owner, "Trade", &log, 1);
        events
            .subscribe(&owner, "Trade", |_, _| {
                Err(EventError::HandlerExecution("inventory full".to_string()))
            })
            .expect("failing");
        events
            .subscribe(&owner, "Trade", |_, _| panic!("trade handler exploded"))
            .expect("panicking");
        record(&events, &owner, "Trade", &log, 4);

        emit_and_wait(&events, named("market"), generic("Trade", target)).await;

        let mut seen = log.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 4], "target {}", target);

        let stats = events.stats();
        assert_eq!(stats.handlers_invoked, 2, "target {}", target);
        assert_eq!(stats.handler_failures, 2, "target {}", target);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_match_set_completes_immediately() {
    let events = EventManager::new().expect("manager");
    let (tx, rx) = oneshot::channel();

    events.emit_with_completion(
        named("nobody"),
        generic("Silence", ExecutionTarget::Parallel),
        move |event| {
            let _ = tx.send(event.name().to_string());
        },
    );

    // Completion ran before emit returned
    let mut rx = rx;
    assert_eq!(rx.try_recv().expect("completed"), "Silence");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_completion_receives_same_mutated_instance() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("module");

    for (key, value) in [("first", 1), ("second", 2)] {
        events
            .subscribe_typed::<GenericEvent, _>(&owner, move |_, event| {
                event.set_argument(key, value);
                Ok(())
            })
            .expect("subscribe");
    }

    for target in [
        ExecutionTarget::Synchronous,
        ExecutionTarget::Asynchronous,
        ExecutionTarget::Parallel,
    ] {
        let event = generic("Query", target);
        let done = emit_and_wait(&events, named("console"), event.clone()).await;

        assert!(Arc::ptr_eq(&event, &done));
        let query = done.downcast_ref::<GenericEvent>().expect("generic event");
        assert_eq!(query.argument("first"), Some(1.into()));
        assert_eq!(query.argument("second"), Some(2.into()));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_disconnect_scenario() {
    let events = EventManager::new().expect("manager");
    let listener = LifecycleOwner::new("L");
    let calls: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));

    let seen = calls.clone();
    events
        .subscribe(&listener, "Connect", move |emitter, event| {
            let emitter = emitter.emitter_name().unwrap_or_default().to_string();
            seen.lock().push((emitter, event.name().to_string()));
            Ok(())
        })
        .expect("subscribe");

    let e1 = named("E1");
    events.emit(e1.clone(), generic("Connect", ExecutionTarget::Synchronous));
    assert_eq!(*calls.lock(), vec![("E1".to_string(), "Connect".to_string())]);

    events.emit(e1, generic("Disconnect", ExecutionTarget::Synchronous));
    assert_eq!(calls.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_emitter_type_scoped_scenario() {
    let events = EventManager::new().expect("manager");
    let l1 = LifecycleOwner::new("L1");
    let l2 = LifecycleOwner::new("L2");
    let log = Arc::new(Mutex::new(Vec::new()));

    for (owner, tag) in [(&l1, 1), (&l2, 2)] {
        let log = log.clone();
        events
            .subscribe_emitter_type(
                owner,
                TypeKey::of::<ChatMessage>(),
                TypeKey::of::<Gate>(),
                move |emitter, event| {
                    assert!(emitter.downcast_ref::<Gate>().is_some());
                    assert!(event.is::<ChatMessage>());
                    log.lock().push(tag);
                    Ok(())
                },
            )
            .expect("subscribe");
    }

    events.emit(Arc::new(Portal), Arc::new(ChatMessage::new("from Y")));
    assert!(log.lock().is_empty());

    events.emit(Arc::new(Gate), Arc::new(ChatMessage::new("from X")));
    assert_eq!(*log.lock(), vec![1, 2]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_typed_handler_receives_payload() {
    let events = EventManager::new().expect("manager");
    let owner = LifecycleOwner::new("chat");
    let texts = Arc::new(Mutex::new(Vec::new()));

    let seen = texts.clone();
    events
        .subscribe_emitter_typed::<ChatMessage, Gate, _>(&owner, move |_gate, message| {
            seen.lock().push(message.text.clone());
            Ok(())
        })
        .expect("subscribe");

    events.emit(Arc::new(Gate), Arc::new(ChatMessage::new("hello")));
    assert_eq!(*texts.lock(), vec!["hello".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_lifecycle_skips_already_matched_handlers() {
    let events = Arc::new(EventManager::new().expect("manager"));
    let killer = LifecycleOwner::new("killer");
    let victim = LifecycleOwner::new("victim");
    let log = Arc::new(Mutex::new(Vec::new()));

    let weak = Arc::downgrade(&events);
    let target = victim.clone();
    events
        .subscribe(&killer, "Shutdown", move |_, _| {
            if let Some(events) = weak.upgrade() {
                events.end_lifecycle(&target);
            }
            Ok(())
        })
        .expect("killer");
    record(&events, &victim, "Shutdown", &log, 1);

    events.emit(named("server"), generic("Shutdown", ExecutionTarget::Synchronous));

    assert!(log.lock().is_empty());
    assert!(!victim.is_alive());
    assert_eq!(events.stats().skipped_dead_owners, 1);
    assert_eq!(events.subscription_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unsubscribe_from_background_threads() {
    let events = Arc::new(EventManager::new().expect("manager"));
    let mut tasks = Vec::new();
    for i in 0..8 {
        let owner = LifecycleOwner::new(format!("owner-{}", i));
        let events = events.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                events.subscribe(&owner, "Tick", |_, _| Ok(())).expect("subscribe");
                events.emit(Arc::new(Gate), generic("Tick", ExecutionTarget::Synchronous));
            }
            events.unsubscribe(&owner)
        }));
    }

    for task in tasks {
        assert_eq!(task.await.expect("task"), 50);
    }
    assert_eq!(events.subscription_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_lifecycle_racing_subscribers_leaves_nothing_behind() {
    let events = Arc::new(EventManager::new().expect("manager"));

    for round in 0..200 {
        let owner = LifecycleOwner::new(format!("plugin-{}", round));
        let subscribers: Vec<_> = (0..4)
            .map(|_| {
                let events = events.clone();
                let owner = owner.clone();
                thread::spawn(move || {
                    while events.subscribe(&owner, "Tick", |_, _| Ok(())).is_ok() {}
                })
            })
            .collect();

        // Let the subscribers get going before the owner ends
        while events.subscriptions_of(&owner).is_empty() {
            thread::yield_now();
        }
        events.end_lifecycle(&owner);

        for subscriber in subscribers {
            subscriber.join().expect("subscriber thread");
        }
        assert!(
            events.subscriptions_of(&owner).is_empty(),
            "round {} left subscriptions for an ended owner",
            round
        );
    }
    assert_eq!(events.subscription_count(), 0);
}
