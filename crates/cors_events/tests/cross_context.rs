use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use cors_events::{
    sweep_stale_keys, CallId, CallKey, CallQueue, CallReply, CallSlot, CallState, CorsError,
    CorsEventEmitter, EmitterConfig, EventName, QueueKey, QueueOrder,
};
use futures::{executor::LocalPool, FutureExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use userscript_host::{FixedTabContext, LocalPoolRuntime, MemoryValueStore, TabId, ValueStore};

const TAB: &str = "abcdefghijklmnopqrstuvwxyz012345";

struct Harness {
    pool: LocalPool,
    runtime: LocalPoolRuntime,
    caller_store: MemoryValueStore,
    listener_store: MemoryValueStore,
    caller: CorsEventEmitter,
    listener: CorsEventEmitter,
}

fn emitter(
    store: &MemoryValueStore,
    runtime: &LocalPoolRuntime,
    config: &EmitterConfig,
) -> CorsEventEmitter {
    CorsEventEmitter::new(
        Rc::new(store.clone()),
        Rc::new(FixedTabContext::new(TAB)),
        Rc::new(runtime.clone()),
        config.clone(),
    )
}

fn harness(config: EmitterConfig) -> Harness {
    let pool = LocalPool::new();
    let runtime = LocalPoolRuntime::new(pool.spawner());
    let caller_store = MemoryValueStore::default();
    let listener_store = caller_store.open_context();
    let caller = emitter(&caller_store, &runtime, &config);
    let listener = emitter(&listener_store, &runtime, &config);
    Harness {
        pool,
        runtime,
        caller_store,
        listener_store,
        caller,
        listener,
    }
}

fn queue_key(name: &str) -> String {
    QueueKey::new(TabId::new(TAB), EventName::new(name).expect("event name")).to_string()
}

fn record_key(id: &CallId, slot: CallSlot) -> String {
    CallKey::new(id, slot).to_string()
}

fn record_keys_left(store: &MemoryValueStore, id: &CallId) -> Vec<String> {
    CallSlot::ALL
        .into_iter()
        .map(|slot| record_key(id, slot))
        .filter(|key| store.get_value(key).is_some())
        .collect()
}

#[test]
fn ask_round_trip_delivers_handler_value_once_and_cleans_up() {
    let mut h = harness(EmitterConfig::default());
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&received);
    h.pool
        .run_until(h.listener.on("ask", move |args| {
            sink.borrow_mut().push(args);
            async { json!(true) }
        }))
        .expect("listen");

    let pending = h.caller.emit("ask", vec![json!("confirm?")]);
    let id = pending.call_id().clone();
    let reply = h.pool.run_until(pending).expect("reply");
    h.pool.run_until_stalled();

    assert_eq!(
        reply,
        CallReply {
            value: Some(json!(true)),
            remote: true,
            state: Some(CallState::Confirmed),
        }
    );
    assert_eq!(*received.borrow(), vec![vec![json!("confirm?")]]);
    assert_eq!(record_keys_left(&h.caller_store, &id), Vec::<String>::new());
    assert_eq!(
        h.caller_store.get_value(&queue_key("ask")),
        Some(json!(""))
    );
    assert_eq!(h.runtime.slept_ms(), 100);
    assert_eq!(h.runtime.sleep_count(), 1);
}

#[test]
fn emit_with_invokes_callback_exactly_once_with_remote_flag() {
    let mut h = harness(EmitterConfig::default());
    h.pool
        .run_until(h.listener.on("sum", |args: Vec<Value>| async move {
            json!(args.iter().filter_map(Value::as_i64).sum::<i64>())
        }))
        .expect("listen");

    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    h.caller
        .emit_with("sum", vec![json!(2), json!(3)], move |value, remote| {
            sink.borrow_mut().push((value, remote));
        });
    h.pool.run_until_stalled();

    assert_eq!(*calls.borrow(), vec![(Some(json!(5)), true)]);
    assert_eq!(h.caller_store.list_keys().expect("keys"), vec![queue_key("sum")]);
}

#[test]
fn handler_may_suspend_before_answering() {
    let mut h = harness(EmitterConfig::default());
    let (answer_tx, answer_rx) = futures::channel::oneshot::channel::<Value>();
    let answer_rx = Rc::new(RefCell::new(Some(answer_rx)));
    h.pool
        .run_until(h.listener.on("prompt", move |_args| {
            let answer = answer_rx.borrow_mut().take();
            async move {
                match answer {
                    Some(answer) => answer.await.unwrap_or(Value::Null),
                    None => Value::Null,
                }
            }
        }))
        .expect("listen");

    let mut pending = h.caller.emit("prompt", vec![json!("name?")]);
    h.pool.run_until_stalled();
    assert!((&mut pending).now_or_never().is_none());
    assert_eq!(
        h.caller_store
            .get_value(&record_key(pending.call_id(), CallSlot::State)),
        Some(json!(0))
    );

    answer_tx.send(json!("bob")).expect("answer");
    let reply = h.pool.run_until(pending).expect("reply");
    assert_eq!(reply.value, Some(json!("bob")));
}

#[test]
fn registering_twice_returns_the_same_listener() {
    let mut h = harness(EmitterConfig::default());
    let second_used = Rc::new(Cell::new(false));
    let first = h
        .pool
        .run_until(h.listener.on("ask", |_| async { json!("first") }))
        .expect("first listen");
    let flag = Rc::clone(&second_used);
    let second = h
        .pool
        .run_until(h.listener.on("ask", move |_| {
            flag.set(true);
            async { json!("second") }
        }))
        .expect("second listen");

    assert_eq!(first, second);
    assert_eq!(h.listener_store.listener_count_for(&queue_key("ask")), 1);

    let reply = h
        .pool
        .run_until(h.caller.emit("ask", Vec::new()))
        .expect("reply");
    assert_eq!(reply.value, Some(json!("first")));
    assert!(!second_used.get());
}

/// Writes a pending call record and returns its id, as a caller context would.
fn seed_call(store: &MemoryValueStore, args: Vec<Value>) -> CallId {
    let id = CallId::generate();
    store
        .set_value(&record_key(&id, CallSlot::State), json!(0))
        .expect("state");
    store
        .set_value(&record_key(&id, CallSlot::Arguments), Value::Array(args))
        .expect("arguments");
    id
}

fn serviced_order(order: QueueOrder) -> Vec<Value> {
    let mut h = harness(EmitterConfig {
        queue_order: order,
        ..EmitterConfig::default()
    });
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    h.pool
        .run_until(h.listener.on("model", move |args: Vec<Value>| {
            sink.borrow_mut().extend(args);
            async { Value::Null }
        }))
        .expect("listen");

    let first = seed_call(&h.caller_store, vec![json!("first")]);
    let second = seed_call(&h.caller_store, vec![json!("second")]);
    // Both ids arrive in a single remote write, as when the host coalesces two appends.
    h.caller_store
        .set_value(&queue_key("model"), json!(format!("{first},{second}")))
        .expect("queue");
    h.pool.run_until_stalled();

    for id in [&first, &second] {
        assert_eq!(
            h.caller_store.get_value(&record_key(id, CallSlot::State)),
            Some(json!(1))
        );
    }
    assert_eq!(
        h.caller_store.get_value(&queue_key("model")),
        Some(json!(""))
    );
    let order = seen.borrow().clone();
    order
}

#[test]
fn default_order_services_the_most_recent_call_first() {
    assert_eq!(
        serviced_order(QueueOrder::Lifo),
        vec![json!("second"), json!("first")]
    );
}

#[test]
fn fifo_order_services_the_oldest_call_first() {
    assert_eq!(
        serviced_order(QueueOrder::Fifo),
        vec![json!("first"), json!("second")]
    );
}

#[test]
fn calls_without_listener_stay_pending() {
    let mut h = harness(EmitterConfig::default());
    let mut one = h.caller.emit("ask", vec![json!(1)]);
    let mut two = h.caller.emit("ask", vec![json!(2)]);
    h.pool.run_until_stalled();

    assert!((&mut one).now_or_never().is_none());
    assert!((&mut two).now_or_never().is_none());
    let queue = CallQueue::parse(h.caller_store.get_value(&queue_key("ask")).as_ref());
    assert_eq!(queue.ids().len(), 2);
    assert!(queue.ids().contains(one.call_id()));
    assert!(queue.ids().contains(two.call_id()));
    assert_eq!(
        h.caller_store
            .get_value(&record_key(one.call_id(), CallSlot::Arguments)),
        Some(json!([1]))
    );
}

#[test]
fn writes_from_the_listening_context_itself_are_ignored() {
    let mut h = harness(EmitterConfig::default());
    h.pool
        .run_until(h.listener.on("ask", |_| async { json!(true) }))
        .expect("listen");

    let mut pending = h.listener.emit("ask", Vec::new());
    h.pool.run_until_stalled();

    assert!((&mut pending).now_or_never().is_none());
    assert_eq!(h.runtime.sleep_count(), 0);
}

#[test]
fn off_removes_the_listener_and_later_calls_stay_pending() {
    let mut h = harness(EmitterConfig::default());
    h.pool
        .run_until(h.listener.on("ask", |_| async { json!(true) }))
        .expect("listen");
    assert!(h
        .pool
        .run_until(h.listener.is_listening("ask"))
        .expect("listening"));

    assert!(h.pool.run_until(h.listener.off("ask")).expect("off"));
    assert!(!h.pool.run_until(h.listener.off("ask")).expect("second off"));
    assert_eq!(h.listener_store.listener_count_for(&queue_key("ask")), 0);

    let mut pending = h.caller.emit("ask", Vec::new());
    h.pool.run_until_stalled();
    assert!((&mut pending).now_or_never().is_none());
}

#[test]
fn off_during_a_suspended_handler_stops_servicing_after_that_call() {
    let mut h = harness(EmitterConfig::default());
    let (answer_tx, answer_rx) = futures::channel::oneshot::channel::<Value>();
    let answer_rx = Rc::new(RefCell::new(Some(answer_rx)));
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    h.pool
        .run_until(h.listener.on("ask", move |_args| {
            counter.set(counter.get() + 1);
            let answer = answer_rx.borrow_mut().take();
            async move {
                match answer {
                    Some(answer) => answer.await.unwrap_or(Value::Null),
                    None => json!("removed handler"),
                }
            }
        }))
        .expect("listen");

    let first = h.caller.emit("ask", vec![json!(1)]);
    h.pool.run_until_stalled();
    assert_eq!(calls.get(), 1);

    assert!(h.pool.run_until(h.listener.off("ask")).expect("off"));
    let mut second = h.caller.emit("ask", vec![json!(2)]);
    h.pool.run_until_stalled();

    answer_tx.send(json!("first")).expect("answer");
    let reply = h.pool.run_until(first).expect("first reply");
    h.pool.run_until_stalled();

    assert_eq!(reply.value, Some(json!("first")));
    assert_eq!(calls.get(), 1);
    assert!((&mut second).now_or_never().is_none());
    let queue = CallQueue::parse(h.caller_store.get_value(&queue_key("ask")).as_ref());
    assert_eq!(queue.ids(), &[second.call_id().clone()][..]);
}

#[test]
fn listening_again_after_off_uses_only_the_new_handler() {
    let mut h = harness(EmitterConfig::default());
    h.pool
        .run_until(h.listener.on("ask", |_| async { json!("old") }))
        .expect("first listen");
    assert!(h.pool.run_until(h.listener.off("ask")).expect("off"));
    h.pool
        .run_until(h.listener.on("ask", |_| async { json!("new") }))
        .expect("second listen");
    assert_eq!(h.listener_store.listener_count_for(&queue_key("ask")), 1);

    let reply = h
        .pool
        .run_until(h.caller.emit("ask", Vec::new()))
        .expect("reply");
    assert_eq!(reply.value, Some(json!("new")));
}

#[test]
fn stale_queue_entries_are_dropped_without_calling_the_handler() {
    let mut h = harness(EmitterConfig::default());
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    h.pool
        .run_until(h.listener.on("ask", move |_| {
            counter.set(counter.get() + 1);
            async { Value::Null }
        }))
        .expect("listen");

    let orphan = CallId::generate();
    h.caller_store
        .set_value(&queue_key("ask"), json!(orphan.as_str()))
        .expect("queue");
    h.pool.run_until_stalled();

    assert_eq!(calls.get(), 0);
    assert_eq!(
        h.caller_store.get_value(&queue_key("ask")),
        Some(json!(""))
    );
}

#[test]
fn sweep_during_flight_wakes_the_caller_without_a_state() {
    let mut h = harness(EmitterConfig::default());
    let pending = h.caller.emit("ask", vec![json!("confirm?")]);
    h.pool.run_until_stalled();

    let report = sweep_stale_keys(&h.listener_store);
    assert_eq!(report.removed_queue_keys, vec![queue_key("ask")]);

    let reply = h.pool.run_until(pending).expect("reply");
    assert_eq!(
        reply,
        CallReply {
            value: None,
            remote: true,
            state: None,
        }
    );
    assert_eq!(h.caller_store.list_keys().expect("keys"), Vec::<String>::new());
}

#[test]
fn invalid_event_names_are_rejected() {
    let mut h = harness(EmitterConfig::default());
    let result = h.pool.run_until(h.caller.emit("", Vec::new()));
    assert_eq!(result, Err(CorsError::InvalidEventName(String::new())));

    let result = h
        .pool
        .run_until(h.listener.on("a,b", |_| async { Value::Null }));
    assert_eq!(result, Err(CorsError::InvalidEventName("a,b".to_string())));
    assert_eq!(h.caller_store.list_keys().expect("keys"), Vec::<String>::new());
}
