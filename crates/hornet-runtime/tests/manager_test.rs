//! Manager lifecycle and the end-to-end messaging scenarios.

mod common;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{eventually, host_with};
use hornet_core::{deserialize, serialize, BigInt, JsObject};
use hornet_runtime::testing::ScriptedEngineFactory;
use hornet_runtime::{ScriptError, Value, WorkerError};

fn echo_factory() -> ScriptedEngineFactory {
    let factory = ScriptedEngineFactory::new();
    factory.register("echo", |scope| {
        scope.on_message(|scope, data| scope.post_message(data.as_str().unwrap_or("?")));
        Ok(Value::Undefined)
    });
    factory
}

#[test]
fn worker_lifecycle_queries() {
    let host = host_with(echo_factory());

    assert!(!host.manager.has_worker("w"));
    assert!(!host.manager.is_worker_running("w"));

    host.manager.create_worker("w", "echo").unwrap();
    assert!(host.manager.has_worker("w"));
    assert!(host.manager.is_worker_running("w"));

    assert!(host.manager.terminate_worker("w"));
    assert!(!host.manager.has_worker("w"));
    assert!(!host.manager.terminate_worker("w"));

    // Same id is free again after termination.
    host.manager.create_worker("w", "echo").unwrap();
    assert!(host.manager.is_worker_running("w"));
}

#[test]
fn duplicate_id_is_rejected() {
    let host = host_with(echo_factory());
    host.manager.create_worker("w", "echo").unwrap();
    match host.manager.create_worker("w", "echo") {
        Err(WorkerError::AlreadyExists(id)) => assert_eq!(id, "w"),
        other => panic!("expected AlreadyExists, got {other:?}"),
    }
}

#[test]
fn unregistered_script_fails_load_and_leaves_no_worker() {
    let host = host_with(echo_factory());
    match host.manager.create_worker("w", "no such script") {
        Err(WorkerError::ScriptLoadFailed(id)) => assert_eq!(id, "w"),
        other => panic!("expected ScriptLoadFailed, got {other:?}"),
    }
    let (_, error) = host.expect_error();
    assert!(error.contains("script error"), "error was: {error}");
    assert!(!host.manager.has_worker("w"));
}

#[test]
fn failing_script_program_reports_script_load_failed() {
    let factory = ScriptedEngineFactory::new();
    factory.register("bad", |_| {
        Err(ScriptError::type_error("cannot read properties of undefined"))
    });
    let host = host_with(factory);

    assert!(matches!(
        host.manager.create_worker("w", "bad"),
        Err(WorkerError::ScriptLoadFailed(_))
    ));
    assert!(!host.manager.has_worker("w"));
}

#[test]
fn engine_creation_failure_surfaces_as_runtime_unavailable() {
    let host = host_with(ScriptedEngineFactory::failing());
    assert!(matches!(
        host.manager.create_worker("w", "anything"),
        Err(WorkerError::RuntimeUnavailable)
    ));
    let (_, error) = host.expect_error();
    assert!(error.contains("failed to create engine"), "error was: {error}");
    assert!(!host.manager.has_worker("w"));
}

#[test]
fn posting_to_a_missing_or_dead_worker_returns_false() {
    let host = host_with(echo_factory());
    assert!(!host.manager.post_message("ghost", "hi"));
    assert!(!host.manager.post_message_binary("ghost", &[0x01]));

    host.manager.create_worker("w", "echo").unwrap();
    assert!(host.manager.post_message("w", "hi"));
    host.manager.terminate_worker("w");
    assert!(!host.manager.post_message("w", "hi"));
}

#[test]
fn eval_distinguishes_missing_from_stopped_workers() {
    let factory = ScriptedEngineFactory::new();
    factory.register("quitter", |scope| {
        scope.on_message(|scope, _| scope.close());
        Ok(Value::Undefined)
    });
    let host = host_with(factory);

    assert!(matches!(
        host.manager.eval_script("ghost", "1"),
        Err(WorkerError::WorkerNotFound(_))
    ));

    host.manager.create_worker("w", "quitter").unwrap();
    assert!(host.manager.post_message("w", "bye"));
    assert!(eventually(|| !host.manager.is_worker_running("w")));

    // Self-closed, but never removed: still present, no longer running.
    assert!(host.manager.has_worker("w"));
    assert!(matches!(
        host.manager.eval_script("w", "1"),
        Err(WorkerError::WorkerNotRunning(_))
    ));
}

#[test]
fn terminate_all_stops_everything() {
    let host = host_with(echo_factory());
    host.manager.create_worker("a", "echo").unwrap();
    host.manager.create_worker("b", "echo").unwrap();

    host.manager.terminate_all();
    assert!(!host.manager.has_worker("a"));
    assert!(!host.manager.has_worker("b"));
}

#[test]
fn no_callbacks_fire_after_terminate() {
    let factory = ScriptedEngineFactory::new();
    factory.register("ticker", |scope| {
        scope.set_interval(5.0, |scope| scope.post_message("tick"))?;
        Ok(Value::Undefined)
    });
    let host = host_with(factory);
    host.manager.create_worker("w", "ticker").unwrap();

    // It is alive and ticking.
    host.expect_message();

    assert!(host.manager.terminate_worker("w"));
    // terminate joins the worker thread, so once the channel is drained
    // nothing new can arrive.
    while host.messages.try_recv().is_ok() {}
    assert!(host.messages.recv_timeout(Duration::from_millis(50)).is_err());
}

#[test]
fn replaced_callbacks_only_affect_later_workers() {
    let host = host_with(echo_factory());
    host.manager.create_worker("first", "echo").unwrap();

    let (tx, second_messages) = crossbeam_channel::unbounded();
    host.manager.set_message_callback(move |worker_id, message| {
        let _ = tx.send((worker_id.to_string(), message.to_string()));
    });
    host.manager.create_worker("second", "echo").unwrap();

    assert!(host.manager.post_message("first", "one"));
    assert!(host.manager.post_message("second", "two"));

    // The first worker still reports through the snapshot it captured.
    assert_eq!(host.expect_message(), ("first".to_string(), "one".to_string()));
    assert_eq!(
        second_messages.recv_timeout(Duration::from_secs(1)).unwrap(),
        ("second".to_string(), "two".to_string())
    );
}

// --- End-to-end scenarios ---

#[test]
fn scenario_text_echo_increment() {
    let factory = ScriptedEngineFactory::new();
    factory.register("self.onmessage = e => postMessage(e.data + 1);", |scope| {
        scope.on_message(|scope, data| {
            let n: i64 = data
                .as_str()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| ScriptError::type_error("expected a numeric payload"))?;
            scope.post_message(&(n + 1).to_string())
        });
        Ok(Value::Undefined)
    });
    let host = host_with(factory);

    host.manager
        .create_worker("w1", "self.onmessage = e => postMessage(e.data + 1);")
        .unwrap();
    assert!(host.manager.post_message("w1", "41"));

    assert_eq!(host.expect_message(), ("w1".to_string(), "42".to_string()));
}

#[test]
fn scenario_binary_structured_roundtrip() {
    let factory = ScriptedEngineFactory::new();
    factory.register(
        "self.onmessage = e => postMessage({x: e.data.x * 2});",
        |scope| {
            scope.on_message(|scope, data| {
                let x = data
                    .as_object()
                    .and_then(|o| o.get("x"))
                    .and_then(|v| v.as_number())
                    .ok_or_else(|| ScriptError::type_error("expected {x}"))?;
                let reply = JsObject::new();
                reply.set("x", Value::number(x * 2.0));
                scope.post_structured(Value::Object(reply))
            });
            Ok(Value::Undefined)
        },
    );
    let host = host_with(factory);
    host.manager
        .create_worker("w2", "self.onmessage = e => postMessage({x: e.data.x * 2});")
        .unwrap();

    let payload = JsObject::new();
    payload.set("x", Value::Int32(21));
    let bytes = serialize(&Value::Object(payload)).unwrap();
    assert!(host.manager.post_message_binary("w2", bytes.as_bytes()));

    let (worker_id, reply) = host.expect_binary();
    assert_eq!(worker_id, "w2");
    let reply = deserialize(&reply).unwrap();
    assert_eq!(
        reply.as_object().and_then(|o| o.get("x")).and_then(|v| v.as_number()),
        Some(42.0)
    );
}

#[test]
fn scenario_interval_fires_three_times_then_closes() {
    const SRC: &str = "let n=0; setInterval(()=>postMessage(++n), 10); setTimeout(()=>close(), 35)";
    let factory = ScriptedEngineFactory::new();
    factory.register(SRC, |scope| {
        let counter = Arc::new(AtomicI64::new(0));
        scope.set_interval(10.0, move |scope| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            scope.post_message(&n.to_string())
        })?;
        scope.set_timeout(35.0, |scope| scope.close())?;
        Ok(Value::Undefined)
    });
    let host = host_with(factory);
    host.manager.create_worker("w3", SRC).unwrap();

    assert_eq!(host.expect_message().1, "1");
    assert_eq!(host.expect_message().1, "2");
    assert_eq!(host.expect_message().1, "3");

    assert!(eventually(|| !host.manager.is_worker_running("w3")));
    assert!(host.messages.try_recv().is_err());
}

#[test]
fn scenario_bigint_post_is_a_data_clone_error_and_worker_survives() {
    const SRC: &str = "self.onmessage = () => postMessage({big: 1n});";
    let factory = ScriptedEngineFactory::new();
    factory.register(SRC, |scope| {
        scope.on_message(|scope, data| {
            if data.as_str() == Some("big") {
                let payload = JsObject::new();
                payload.set("big", Value::BigInt(BigInt::from(1)));
                scope.post_structured(Value::Object(payload))
            } else {
                scope.post_message("alive")
            }
        });
        Ok(Value::Undefined)
    });
    let host = host_with(factory);
    host.manager.create_worker("w4", SRC).unwrap();

    assert!(host.manager.post_message("w4", "big"));
    let (_, error) = host.expect_error();
    assert!(error.contains("DataCloneError"), "error was: {error}");

    // The refusal never terminates the worker.
    assert!(host.manager.is_worker_running("w4"));
    assert!(host.manager.post_message("w4", "ping"));
    assert_eq!(host.expect_message().1, "alive");
}

#[test]
fn scenario_eval_script_stringifies_results() {
    let factory = echo_factory();
    factory.register("1+2", |_| Ok(Value::Int32(3)));
    factory.register("({a:1})", |_| {
        let obj = JsObject::new();
        obj.set("a", Value::Int32(1));
        Ok(Value::Object(obj))
    });
    let host = host_with(factory);
    host.manager.create_worker("w1", "echo").unwrap();

    assert_eq!(host.manager.eval_script("w1", "1+2").unwrap(), "3");
    assert_eq!(
        host.manager.eval_script("w1", "({a:1})").unwrap(),
        r#"{"a":1}"#
    );
}

#[test]
fn scenario_cyclic_clone_preserves_identity_inside_the_worker() {
    const SRC: &str = "self.onmessage = e => { self.received = e.data; };";
    const CHECK: &str = "self.received.self === self.received";

    let factory = ScriptedEngineFactory::new();
    factory.register(SRC, |scope| {
        scope.on_message(|scope, data| {
            scope.set_var("received", data);
            Ok(())
        });
        Ok(Value::Undefined)
    });
    factory.register(CHECK, |scope| {
        let received = scope
            .var("received")
            .ok_or_else(|| ScriptError::reference_error("received is not defined"))?;
        let obj = received
            .as_object()
            .ok_or_else(|| ScriptError::type_error("received is not an object"))?;
        let same = obj
            .get("self")
            .and_then(|v| v.as_object().map(|inner| inner.ptr_eq(obj)))
            .unwrap_or(false);
        Ok(Value::Bool(same))
    });

    let host = host_with(factory);
    host.manager.create_worker("w6", SRC).unwrap();

    let cyclic = JsObject::new();
    cyclic.set("self", Value::Object(cyclic.clone()));
    let bytes = serialize(&Value::Object(cyclic)).unwrap();
    assert!(host.manager.post_message_binary("w6", bytes.as_bytes()));

    assert!(eventually(|| host
        .manager
        .eval_script("w6", CHECK)
        .map(|r| r == "true")
        .unwrap_or(false)));
}

#[test]
fn invalid_wire_data_surfaces_on_error_and_worker_continues() {
    let host = host_with(echo_factory());
    host.manager.create_worker("w", "echo").unwrap();

    assert!(host.manager.post_message_binary("w", &[0xEE, 0x00]));
    let (_, error) = host.expect_error();
    assert!(error.contains("DataCloneError"), "error was: {error}");

    assert!(host.manager.is_worker_running("w"));
    assert!(host.manager.post_message("w", "still here"));
    assert_eq!(host.expect_message().1, "still here");
}
