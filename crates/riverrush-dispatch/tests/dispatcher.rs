//! Integration tests for dispatch ordering, failure handling and
//! reentrancy.

use std::sync::{Arc, Mutex};

use riverrush_dispatch::{DispatchError, EventDispatcher, Handler, HandlerError, HandlerId, handler};
use riverrush_protocol::{AnimalId, Event, EventType};

// =========================================================================
// Helpers
// =========================================================================

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn recording(log: &Log, name: &'static str) -> Handler {
    let log = Arc::clone(log);
    handler(move |_| {
        log.lock().unwrap().push(name);
        Ok(())
    })
}

fn entries(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

// =========================================================================
// Fan-out
// =========================================================================

#[test]
fn test_fan_out_runs_all_handlers_in_attachment_order() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    dispatcher.attach(EventType::GameStarted, recording(&log, "a"));
    dispatcher.attach(EventType::GameStarted, recording(&log, "b"));
    dispatcher.attach(EventType::GameStarted, recording(&log, "c"));

    dispatcher.dispatch(&Event::GameStarted).unwrap();

    assert_eq!(entries(&log), vec!["a", "b", "c"]);
}

#[test]
fn test_detaching_one_handler_leaves_the_rest() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    dispatcher.attach(EventType::GameStarted, recording(&log, "a"));
    let middle = dispatcher.attach(EventType::GameStarted, recording(&log, "b"));
    dispatcher.attach(EventType::GameStarted, recording(&log, "c"));

    dispatcher.dispatch(&Event::GameStarted).unwrap();
    dispatcher.detach(EventType::GameStarted, middle);
    dispatcher.dispatch(&Event::GameStarted).unwrap();

    assert_eq!(entries(&log), vec!["a", "b", "c", "a", "c"]);
}

#[test]
fn test_clones_share_one_registry() {
    let dispatcher = EventDispatcher::new();
    let clone = dispatcher.clone();
    let log = log();
    clone.attach(EventType::GameFinished, recording(&log, "clone"));

    dispatcher.dispatch(&Event::GameFinished).unwrap();

    assert_eq!(entries(&log), vec!["clone"]);
    assert_eq!(dispatcher.handler_count(EventType::GameFinished), 1);
}

#[test]
fn test_separate_dispatchers_are_isolated() {
    let first = EventDispatcher::new();
    let second = EventDispatcher::new();
    let log = log();
    first.attach(EventType::GameFinished, recording(&log, "first"));

    second.dispatch(&Event::GameFinished).unwrap();

    assert!(entries(&log).is_empty());
    assert_eq!(second.total_handlers(), 0);
}

// =========================================================================
// Failure
// =========================================================================

#[test]
fn test_failing_handler_aborts_remaining_handlers() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    dispatcher.attach(EventType::GameStarted, recording(&log, "before"));
    let failing = dispatcher.attach(
        EventType::GameStarted,
        handler(|_| Err(HandlerError::Rejected("boom".into()))),
    );
    dispatcher.attach(EventType::GameStarted, recording(&log, "after"));

    let err = dispatcher.dispatch(&Event::GameStarted).unwrap_err();

    let DispatchError::Handler { event, handler, source } = err;
    assert_eq!(event, EventType::GameStarted);
    assert_eq!(handler, failing);
    assert_eq!(source.to_string(), "boom");
    assert_eq!(entries(&log), vec!["before"]);
}

#[test]
fn test_nested_failure_converts_into_handler_error() {
    let dispatcher = EventDispatcher::new();
    dispatcher.attach(
        EventType::PlayerJumped,
        handler(|_| Err(HandlerError::Rejected("inner".into()))),
    );
    let relay = dispatcher.clone();
    dispatcher.attach(
        EventType::JumpCommand,
        handler(move |event| {
            let animal = event.animal().unwrap_or_default();
            relay.dispatch(&Event::PlayerJumped { animal })?;
            Ok(())
        }),
    );

    let err = dispatcher
        .dispatch(&Event::JumpCommand { animal: AnimalId(1) })
        .unwrap_err();

    let DispatchError::Handler { event, source, .. } = err;
    assert_eq!(event, EventType::JumpCommand);
    assert!(matches!(source, HandlerError::Nested(_)));
    assert!(source.to_string().contains("inner"));
}

// =========================================================================
// Reentrancy
// =========================================================================

#[test]
fn test_handler_may_dispatch_reentrantly() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    dispatcher.attach(EventType::PlayerJumped, recording(&log, "jumped"));

    let relay = dispatcher.clone();
    let relay_log = Arc::clone(&log);
    dispatcher.attach(
        EventType::JumpCommand,
        handler(move |event| {
            relay_log.lock().unwrap().push("command");
            let animal = event.animal().unwrap_or_default();
            relay.dispatch(&Event::PlayerJumped { animal })?;
            Ok(())
        }),
    );

    dispatcher
        .dispatch(&Event::JumpCommand { animal: AnimalId(2) })
        .unwrap();

    assert_eq!(entries(&log), vec!["command", "jumped"]);
}

#[test]
fn test_handler_detached_mid_dispatch_does_not_run() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    let victim_id: Arc<Mutex<Option<HandlerId>>> = Arc::new(Mutex::new(None));

    let remover = dispatcher.clone();
    let slot = Arc::clone(&victim_id);
    dispatcher.attach(
        EventType::GameStopped,
        handler(move |_| {
            if let Some(id) = *slot.lock().unwrap() {
                remover.detach(EventType::GameStopped, id);
            }
            Ok(())
        }),
    );
    let victim = dispatcher.attach(EventType::GameStopped, recording(&log, "victim"));
    *victim_id.lock().unwrap() = Some(victim);

    dispatcher.dispatch(&Event::GameStopped).unwrap();

    assert!(entries(&log).is_empty());
    assert_eq!(dispatcher.handler_count(EventType::GameStopped), 1);
}

#[test]
fn test_handler_attached_mid_dispatch_runs_next_time() {
    let dispatcher = EventDispatcher::new();
    let log = log();

    let adder = dispatcher.clone();
    let late = recording(&log, "late");
    dispatcher.attach(
        EventType::AnimalAdded,
        handler(move |_| {
            adder.attach(EventType::AnimalAdded, Arc::clone(&late));
            Ok(())
        }),
    );

    let event = Event::AnimalAdded {
        animal: AnimalId(1),
        team: Default::default(),
    };
    dispatcher.dispatch(&event).unwrap();
    assert!(entries(&log).is_empty());

    dispatcher.dispatch(&event).unwrap();
    assert_eq!(entries(&log), vec!["late"]);
    // Re-attaching the same `late` handler on the second dispatch was
    // de-duplicated.
    assert_eq!(dispatcher.handler_count(EventType::AnimalAdded), 2);
}

#[test]
fn test_handler_may_detach_itself() {
    let dispatcher = EventDispatcher::new();
    let log = log();
    let own_id: Arc<Mutex<Option<HandlerId>>> = Arc::new(Mutex::new(None));

    let remover = dispatcher.clone();
    let slot = Arc::clone(&own_id);
    let once_log = Arc::clone(&log);
    let id = dispatcher.attach(
        EventType::RenderJoin,
        handler(move |_| {
            once_log.lock().unwrap().push("once");
            if let Some(id) = *slot.lock().unwrap() {
                remover.detach(EventType::RenderJoin, id);
            }
            Ok(())
        }),
    );
    *own_id.lock().unwrap() = Some(id);

    dispatcher.dispatch(&Event::RenderJoin).unwrap();
    dispatcher.dispatch(&Event::RenderJoin).unwrap();

    assert_eq!(entries(&log), vec!["once"]);
    assert_eq!(dispatcher.total_handlers(), 0);
}
