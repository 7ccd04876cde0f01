//! Worker runtime: one engine, one thread, one event loop.
//!
//! The constructor spawns the worker thread and blocks until the thread
//! publishes its initialization result. From then on the engine is
//! touched only on the worker thread — with one exception,
//! [`WorkerRuntime::eval_script`], which serializes against task
//! execution through the engine mutex. Everything else the host does
//! goes through the task queue or the pending-script slot.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hornet_core::clone;
use hornet_core::format;
use hornet_core::{JsFunction, ScriptError, Value};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use crate::bootstrap::{BOOTSTRAP_JS, BOOTSTRAP_SOURCE_URL};
use crate::callbacks::{ConsoleLevel, HostCallbacks};
use crate::config::RuntimeConfig;
use crate::engine::{EngineFactory, ScriptEngine};
use crate::error::{WorkerError, WorkerResult};
use crate::task_queue::{Task, TaskFn, TaskQueue, TaskType};

/// Host-enqueued task ids live above the range script-assigned timer
/// ids are drawn from, keeping ids unique within the worker.
const HOST_TASK_ID_BASE: u64 = 1 << 32;

#[derive(Default)]
struct InitState {
    initialized: bool,
}

#[derive(Default)]
struct PendingScript {
    source: Option<String>,
    has_pending: bool,
    succeeded: bool,
}

struct WorkerShared {
    worker_id: String,
    config: RuntimeConfig,
    callbacks: HostCallbacks,
    task_queue: TaskQueue,
    engine: Mutex<Option<Box<dyn ScriptEngine>>>,
    running: AtomicBool,
    close_requested: AtomicBool,
    next_task_id: AtomicU64,
    cancelled_timers: Mutex<FxHashSet<u64>>,
    init: Mutex<InitState>,
    init_cv: Condvar,
    pending: Mutex<PendingScript>,
    pending_cv: Condvar,
}

impl WorkerShared {
    fn request_close(&self) {
        self.close_requested.store(true, Ordering::SeqCst);
        // Queued tasks are dropped; the in-flight task finishes.
        self.task_queue.shutdown();
    }

    fn cancel_timer(&self, timer_id: u64) {
        self.cancelled_timers.lock().insert(timer_id);
        self.task_queue.cancel(timer_id);
    }

    fn timer_is_cancelled(&self, timer_id: u64) -> bool {
        self.cancelled_timers.lock().contains(&timer_id)
    }

    fn report_error(&self, message: &str) {
        (self.callbacks.error)(&self.worker_id, message);
    }
}

/// A single worker: owns its engine, thread, and task queue. Created
/// and destroyed by the manager; all public operations are callable
/// from any host thread.
pub struct WorkerRuntime {
    shared: Arc<WorkerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerRuntime {
    /// Spawn the worker thread and block until it has either come up
    /// (`is_running`) or failed to initialize.
    pub fn new(
        worker_id: impl Into<String>,
        callbacks: HostCallbacks,
        factory: Arc<dyn EngineFactory>,
        config: RuntimeConfig,
    ) -> Self {
        let worker_id = worker_id.into();
        let shared = Arc::new(WorkerShared {
            worker_id: worker_id.clone(),
            config,
            callbacks,
            task_queue: TaskQueue::new(),
            engine: Mutex::new(None),
            running: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            next_task_id: AtomicU64::new(HOST_TASK_ID_BASE),
            cancelled_timers: Mutex::new(FxHashSet::default()),
            init: Mutex::new(InitState::default()),
            init_cv: Condvar::new(),
            pending: Mutex::new(PendingScript::default()),
            pending_cv: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let thread = match std::thread::Builder::new()
            .name(format!("hornet-worker-{worker_id}"))
            .spawn(move || worker_thread_main(thread_shared, factory))
        {
            Ok(handle) => Some(handle),
            Err(err) => {
                shared.report_error(&format!("failed to spawn worker thread: {err}"));
                publish_init(&shared);
                None
            }
        };

        {
            let mut init = shared.init.lock();
            while !init.initialized {
                shared.init_cv.wait(&mut init);
            }
        }

        Self {
            shared,
            thread: Mutex::new(thread),
        }
    }

    pub fn id(&self) -> &str {
        &self.shared.worker_id
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Hand the worker its script and block until the worker thread has
    /// evaluated it. Returns whether evaluation succeeded.
    ///
    /// Meant to be called once, right after construction; a repeat call
    /// blocks until the worker terminates.
    pub fn load_script(&self, source: &str) -> bool {
        if !self.is_running() {
            return false;
        }

        {
            let mut pending = self.shared.pending.lock();
            pending.source = Some(source.to_string());
            pending.has_pending = true;
            pending.succeeded = false;
        }
        self.shared.pending_cv.notify_all();

        let mut pending = self.shared.pending.lock();
        while pending.has_pending && self.is_running() {
            self.shared.pending_cv.wait(&mut pending);
        }
        pending.succeeded
    }

    /// Queue a text message for `__handleMessage`. Returns false when
    /// the worker is not running.
    pub fn post_message(&self, message: &str) -> bool {
        if !self.is_running() {
            return false;
        }
        let payload = message.to_string();
        self.enqueue_message_task(Box::new(move |engine| {
            engine
                .call_global("__handleMessage", &[Value::string(payload)])
                .map(|_| ())
        }));
        true
    }

    /// Queue a structured-clone message: the task deserializes on the
    /// worker thread and hands the reconstructed value to
    /// `__handleMessage`. Invalid wire data surfaces through the error
    /// callback and leaves the worker running.
    pub fn post_message_binary(&self, bytes: &[u8]) -> bool {
        if !self.is_running() {
            return false;
        }
        let data = bytes.to_vec();
        self.enqueue_message_task(Box::new(move |engine| {
            let value = clone::deserialize(&data).map_err(ScriptError::from)?;
            engine.call_global("__handleMessage", &[value]).map(|_| ())
        }));
        true
    }

    /// Synchronous evaluation from the host thread. Serialized against
    /// task execution by the engine mutex; blocks until the currently
    /// running task, if any, yields.
    pub fn eval_script(&self, source: &str) -> WorkerResult<String> {
        if !self.is_running() {
            return Err(WorkerError::RuntimeUnavailable);
        }
        let mut engine_slot = self.shared.engine.lock();
        let engine = engine_slot
            .as_deref_mut()
            .ok_or(WorkerError::RuntimeUnavailable)?;

        let value = engine
            .eval(source, "<eval>")
            .map_err(WorkerError::ScriptEvaluation)?;
        engine
            .drain_microtasks()
            .map_err(WorkerError::ScriptEvaluation)?;
        Ok(format::display_string(&value))
    }

    /// Stop the worker: flip `running`, shut the queue down, join the
    /// thread, then release the engine. Idempotent and safe from any
    /// host thread, including through `Drop`.
    pub fn terminate(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared.close_requested.store(true, Ordering::SeqCst);
        self.shared.task_queue.shutdown();
        self.shared.pending_cv.notify_all();

        let handle = self.thread.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(worker = %self.shared.worker_id, "worker thread panicked");
            }
        }

        // Strictly after the join: nothing can touch the engine now.
        *self.shared.engine.lock() = None;
        debug!(worker = %self.shared.worker_id, "worker terminated");
    }

    fn enqueue_message_task(&self, body: TaskFn) {
        let id = self.shared.next_task_id.fetch_add(1, Ordering::SeqCst);
        self.shared
            .task_queue
            .enqueue(Task::new(TaskType::Message, id, body));
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn publish_init(shared: &Arc<WorkerShared>) {
    shared.init.lock().initialized = true;
    shared.init_cv.notify_all();
}

fn worker_thread_main(shared: Arc<WorkerShared>, factory: Arc<dyn EngineFactory>) {
    debug!(worker = %shared.worker_id, "worker thread starting");

    let mut engine = match factory.create_engine() {
        Ok(engine) => engine,
        Err(err) => {
            shared.report_error(&format!("failed to create engine: {err}"));
            publish_init(&shared);
            return;
        }
    };

    let bootstrapped = install_native_functions(&shared, engine.as_mut())
        .and_then(|()| engine.eval(BOOTSTRAP_JS, BOOTSTRAP_SOURCE_URL).map(|_| ()));
    if let Err(err) = bootstrapped {
        shared.report_error(&format!("failed to bootstrap worker: {err}"));
        publish_init(&shared);
        return;
    }

    *shared.engine.lock() = Some(engine);
    shared.running.store(true, Ordering::SeqCst);
    publish_init(&shared);

    run_pending_script(&shared);
    event_loop(&shared);

    // A self-close ends the loop without a host-side terminate; report
    // not-running from here on and unblock any waiting load_script.
    shared.running.store(false, Ordering::SeqCst);
    shared.pending_cv.notify_all();
    debug!(worker = %shared.worker_id, "worker thread stopped");
}

/// Wait for the script slot to fill, evaluate it, publish the result.
fn run_pending_script(shared: &Arc<WorkerShared>) {
    let source = {
        let mut pending = shared.pending.lock();
        while !pending.has_pending && shared.running.load(Ordering::SeqCst) {
            shared.pending_cv.wait(&mut pending);
        }
        if !shared.running.load(Ordering::SeqCst) {
            return;
        }
        pending.source.take()
    };

    let succeeded = match source {
        Some(source) => {
            let mut engine_slot = shared.engine.lock();
            match engine_slot.as_deref_mut() {
                Some(engine) => {
                    let result = engine
                        .eval(&source, "<worker-script>")
                        .and_then(|_| engine.drain_microtasks());
                    match result {
                        Ok(()) => true,
                        Err(err) => {
                            shared.report_error(&format!("script error: {err}"));
                            false
                        }
                    }
                }
                None => false,
            }
        }
        None => false,
    };

    {
        let mut pending = shared.pending.lock();
        pending.has_pending = false;
        pending.succeeded = succeeded;
    }
    shared.pending_cv.notify_all();
}

fn event_loop(shared: &Arc<WorkerShared>) {
    while shared.running.load(Ordering::SeqCst) && !shared.close_requested.load(Ordering::SeqCst) {
        let wait = shared
            .task_queue
            .time_until_next()
            .min(shared.config.event_loop_wait_cap);

        let Some(task) = shared.task_queue.dequeue(wait) else {
            continue;
        };
        if task.cancelled {
            continue;
        }
        if task.task_type == TaskType::Timer && shared.timer_is_cancelled(task.id) {
            continue;
        }
        if task.task_type == TaskType::Close {
            shared.close_requested.store(true, Ordering::SeqCst);
            continue;
        }

        process_task(shared, task);
    }
}

/// Run one macrotask under the engine mutex, then drain microtasks.
/// Script errors surface through the error callback and never escape
/// the loop.
fn process_task(shared: &Arc<WorkerShared>, task: Task) {
    let mut engine_slot = shared.engine.lock();
    let Some(engine) = engine_slot.as_deref_mut() else {
        return;
    };
    if !shared.running.load(Ordering::SeqCst) {
        return;
    }

    let result = task
        .run(&mut *engine)
        .and_then(|()| engine.drain_microtasks());
    if let Err(err) = result {
        shared.report_error(&format!("uncaught error in task: {err}"));
    }
}

fn install_native_functions(
    shared: &Arc<WorkerShared>,
    engine: &mut dyn ScriptEngine,
) -> Result<(), ScriptError> {
    let weak = Arc::downgrade(shared);

    let w = weak.clone();
    engine.register_host_function(
        "__native_post_message_to_host",
        Arc::new(move |args| {
            if let Some(shared) = w.upgrade() {
                if let Some(text) = args.first().and_then(|v| v.as_str()) {
                    (shared.callbacks.message)(&shared.worker_id, text);
                }
            }
            Ok(Value::Undefined)
        }),
    )?;

    let w = weak.clone();
    engine.register_host_function(
        "__native_post_message_structured",
        Arc::new(move |args| {
            let Some(shared) = w.upgrade() else {
                return Ok(Value::Undefined);
            };
            let Some(value) = args.first() else {
                return Ok(Value::Undefined);
            };
            // A clone refusal re-enters the calling frame as a
            // DataCloneError script exception.
            let data = clone::serialize_with_limits(value, shared.config.clone_limits)
                .map_err(ScriptError::from)?;
            (shared.callbacks.binary_message)(&shared.worker_id, data.as_bytes());
            Ok(Value::Undefined)
        }),
    )?;

    let w = weak.clone();
    engine.register_host_function(
        "__native_console_log",
        Arc::new(move |args| {
            if let Some(shared) = w.upgrade() {
                let level = args
                    .first()
                    .and_then(|v| v.as_str())
                    .and_then(|s| s.parse::<ConsoleLevel>().ok())
                    .unwrap_or(ConsoleLevel::Log);
                let message = args.get(1).and_then(|v| v.as_str()).unwrap_or_default();
                (shared.callbacks.console)(&shared.worker_id, level, message);
            }
            Ok(Value::Undefined)
        }),
    )?;

    let w = weak.clone();
    engine.register_host_function(
        "__native_request_close",
        Arc::new(move |_args| {
            if let Some(shared) = w.upgrade() {
                shared.request_close();
            }
            Ok(Value::Undefined)
        }),
    )?;

    let w = weak.clone();
    engine.register_host_function(
        "__native_schedule_timer",
        Arc::new(move |args| {
            let Some(shared) = w.upgrade() else {
                return Ok(Value::Undefined);
            };
            let Some(timer_id) = args.first().and_then(|v| v.as_number()) else {
                return Err(ScriptError::type_error("timer id must be a number"));
            };
            let delay_ms = args.get(1).and_then(|v| v.as_number()).unwrap_or(0.0);
            let repeating = matches!(args.get(2), Some(Value::Bool(true)));
            let Some(Value::Function(callback)) = args.get(3) else {
                return Err(ScriptError::type_error("timer callback must be a function"));
            };

            // Negative and non-finite delays clamp to zero.
            let delay = if delay_ms.is_finite() && delay_ms > 0.0 {
                Duration::from_millis(delay_ms as u64)
            } else {
                Duration::ZERO
            };
            schedule_timer_fire(
                &shared,
                timer_id as u64,
                delay,
                repeating,
                callback.clone(),
                Instant::now() + delay,
            );
            Ok(Value::Undefined)
        }),
    )?;

    engine.register_host_function(
        "__native_cancel_timer",
        Arc::new(move |args| {
            if let Some(shared) = weak.upgrade() {
                if let Some(timer_id) = args.first().and_then(|v| v.as_number()) {
                    shared.cancel_timer(timer_id as u64);
                }
            }
            Ok(Value::Undefined)
        }),
    )?;

    Ok(())
}

/// Enqueue one firing of a timer. A repeating timer re-enqueues itself
/// from its own thunk, gated on the cancelled set so a cancel observed
/// between firings stops the chain; the next firing is scheduled
/// relative to this firing's scheduled time, not its completion, so
/// intervals do not drift.
fn schedule_timer_fire(
    shared: &Arc<WorkerShared>,
    timer_id: u64,
    interval: Duration,
    repeating: bool,
    callback: JsFunction,
    fire_at: Instant,
) {
    let weak: Weak<WorkerShared> = Arc::downgrade(shared);
    let task = Task::new(
        TaskType::Timer,
        timer_id,
        Box::new(move |_engine| {
            let Some(shared) = weak.upgrade() else {
                return Ok(());
            };
            if shared.timer_is_cancelled(timer_id) {
                return Ok(());
            }

            let result = callback.call(&[]).map(|_| ());

            if repeating && !shared.timer_is_cancelled(timer_id) {
                schedule_timer_fire(
                    &shared,
                    timer_id,
                    interval,
                    true,
                    callback.clone(),
                    fire_at + interval,
                );
            }
            result
        }),
    );

    // Zero-delay timers take the immediate queue, like messages. A
    // nonzero interval stays on the delayed heap even when overdue so
    // it keeps run-at ordering with other delayed tasks.
    if interval.is_zero() {
        shared.task_queue.enqueue(task);
    } else {
        let delay = fire_at.saturating_duration_since(Instant::now());
        shared.task_queue.enqueue_delayed(task, delay);
    }
}
