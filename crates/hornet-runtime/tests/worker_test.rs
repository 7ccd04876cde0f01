//! WorkerRuntime behavior without a manager in front of it.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::unbounded;
use hornet_runtime::testing::ScriptedEngineFactory;
use hornet_runtime::{HostCallbacks, RuntimeConfig, Value, WorkerError, WorkerRuntime};

fn echo_worker() -> (WorkerRuntime, crossbeam_channel::Receiver<String>) {
    let factory = ScriptedEngineFactory::new();
    factory.register("echo", |scope| {
        scope.on_message(|scope, data| scope.post_message(data.as_str().unwrap_or("?")));
        Ok(Value::Undefined)
    });

    let (tx, rx) = unbounded();
    let callbacks = HostCallbacks::default().with_message(move |_, message| {
        let _ = tx.send(message.to_string());
    });
    let worker = WorkerRuntime::new(
        "solo",
        callbacks,
        Arc::new(factory),
        RuntimeConfig::default(),
    );
    (worker, rx)
}

#[test]
fn load_script_reports_evaluation_outcome() {
    let (worker, _rx) = echo_worker();
    assert!(worker.is_running());
    assert_eq!(worker.id(), "solo");
    assert!(worker.load_script("echo"));
    worker.terminate();
}

#[test]
fn failed_script_leaves_the_worker_running() {
    let factory = ScriptedEngineFactory::new();
    let (tx, errors) = unbounded();
    let callbacks = HostCallbacks::default().with_error(move |_, message| {
        let _ = tx.send(message.to_string());
    });
    let worker = WorkerRuntime::new(
        "solo",
        callbacks,
        Arc::new(factory),
        RuntimeConfig::default(),
    );

    // Nothing registered: evaluation fails, the worker itself survives.
    assert!(!worker.load_script("missing"));
    assert!(worker.is_running());
    let error = errors.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(error.contains("script error"), "error was: {error}");
    worker.terminate();
}

#[test]
fn messages_flow_after_load() {
    let (worker, rx) = echo_worker();
    assert!(worker.load_script("echo"));
    assert!(worker.post_message("hello"));
    assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "hello");
    worker.terminate();
}

#[test]
fn terminate_is_idempotent_and_final() {
    let (worker, _rx) = echo_worker();
    assert!(worker.load_script("echo"));

    worker.terminate();
    worker.terminate();

    assert!(!worker.is_running());
    assert!(!worker.post_message("late"));
    assert!(!worker.load_script("echo"));
    assert!(matches!(
        worker.eval_script("anything"),
        Err(WorkerError::RuntimeUnavailable)
    ));
}

#[test]
fn drop_terminates_cleanly() {
    let (worker, _rx) = echo_worker();
    assert!(worker.load_script("echo"));
    // Dropping must join the worker thread without hanging.
    drop(worker);
}

#[test]
fn eval_script_runs_against_the_live_engine() {
    let factory = ScriptedEngineFactory::new();
    factory.register("init", |scope| {
        scope.set_var("state", Value::Int32(7));
        Ok(Value::Undefined)
    });
    factory.register("state * 6", |scope| {
        let n = scope
            .var("state")
            .and_then(|v| v.as_number())
            .unwrap_or_default();
        Ok(Value::number(n * 6.0))
    });

    let worker = WorkerRuntime::new(
        "solo",
        HostCallbacks::default(),
        Arc::new(factory),
        RuntimeConfig::default(),
    );
    assert!(worker.load_script("init"));
    assert_eq!(worker.eval_script("state * 6").unwrap(), "42");
    worker.terminate();
}
