//! Worker manager: lifecycle, identity, and routing for named workers.
//!
//! One mutex guards the id -> worker map; it is held only to look up or
//! mutate the map, never while an engine evaluates or a thread joins.
//! Host callbacks are snapshotted into each worker at construction, so
//! replacing a callback affects only workers created afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::callbacks::{ConsoleLevel, HostCallbacks};
use crate::config::RuntimeConfig;
use crate::engine::EngineFactory;
use crate::error::{WorkerError, WorkerResult};
use crate::worker::WorkerRuntime;

pub struct WorkerManager {
    factory: Arc<dyn EngineFactory>,
    config: RuntimeConfig,
    workers: Mutex<HashMap<String, Arc<WorkerRuntime>>>,
    callbacks: Mutex<HostCallbacks>,
}

impl WorkerManager {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self::with_config(factory, RuntimeConfig::default())
    }

    pub fn with_config(factory: Arc<dyn EngineFactory>, config: RuntimeConfig) -> Self {
        Self {
            factory,
            config,
            workers: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(HostCallbacks::default()),
        }
    }

    /// Create a worker, wait for it to initialize, and load its script.
    /// The worker is constructed outside the map lock; a racing create
    /// of the same id loses and gets `AlreadyExists`.
    pub fn create_worker(&self, worker_id: &str, script: &str) -> WorkerResult<String> {
        if self.workers.lock().contains_key(worker_id) {
            return Err(WorkerError::AlreadyExists(worker_id.to_string()));
        }

        let callbacks = self.callbacks.lock().clone();
        let worker = Arc::new(WorkerRuntime::new(
            worker_id,
            callbacks,
            self.factory.clone(),
            self.config,
        ));
        if !worker.is_running() {
            return Err(WorkerError::RuntimeUnavailable);
        }
        if !worker.load_script(script) {
            worker.terminate();
            return Err(WorkerError::ScriptLoadFailed(worker_id.to_string()));
        }

        {
            let mut workers = self.workers.lock();
            if workers.contains_key(worker_id) {
                drop(workers);
                worker.terminate();
                return Err(WorkerError::AlreadyExists(worker_id.to_string()));
            }
            workers.insert(worker_id.to_string(), worker);
        }

        debug!(worker = %worker_id, "worker created");
        Ok(worker_id.to_string())
    }

    /// Remove and terminate a worker. Returns whether it was present.
    pub fn terminate_worker(&self, worker_id: &str) -> bool {
        let worker = self.workers.lock().remove(worker_id);
        match worker {
            Some(worker) => {
                worker.terminate();
                debug!(worker = %worker_id, "worker removed");
                true
            }
            None => false,
        }
    }

    pub fn terminate_all(&self) {
        let workers: Vec<Arc<WorkerRuntime>> =
            self.workers.lock().drain().map(|(_, worker)| worker).collect();
        for worker in workers {
            worker.terminate();
        }
    }

    /// Text-path message. False when the worker is absent or stopped.
    pub fn post_message(&self, worker_id: &str, message: &str) -> bool {
        match self.worker(worker_id) {
            Some(worker) => worker.post_message(message),
            None => false,
        }
    }

    /// Structured-clone-path message. False when the worker is absent
    /// or stopped; invalid payloads surface later via `on_error`.
    pub fn post_message_binary(&self, worker_id: &str, bytes: &[u8]) -> bool {
        match self.worker(worker_id) {
            Some(worker) => worker.post_message_binary(bytes),
            None => false,
        }
    }

    /// Synchronous evaluation on a running worker.
    pub fn eval_script(&self, worker_id: &str, source: &str) -> WorkerResult<String> {
        let worker = self
            .worker(worker_id)
            .ok_or_else(|| WorkerError::WorkerNotFound(worker_id.to_string()))?;
        if !worker.is_running() {
            return Err(WorkerError::WorkerNotRunning(worker_id.to_string()));
        }
        worker.eval_script(source)
    }

    pub fn has_worker(&self, worker_id: &str) -> bool {
        self.workers.lock().contains_key(worker_id)
    }

    pub fn is_worker_running(&self, worker_id: &str) -> bool {
        self.worker(worker_id).is_some_and(|w| w.is_running())
    }

    /// Replace the text-message callback for workers created from now
    /// on; existing workers keep the set they captured.
    pub fn set_message_callback(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.callbacks.lock().message = Arc::new(callback);
    }

    pub fn set_binary_message_callback(
        &self,
        callback: impl Fn(&str, &[u8]) + Send + Sync + 'static,
    ) {
        self.callbacks.lock().binary_message = Arc::new(callback);
    }

    pub fn set_console_callback(
        &self,
        callback: impl Fn(&str, ConsoleLevel, &str) + Send + Sync + 'static,
    ) {
        self.callbacks.lock().console = Arc::new(callback);
    }

    pub fn set_error_callback(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.callbacks.lock().error = Arc::new(callback);
    }

    fn worker(&self, worker_id: &str) -> Option<Arc<WorkerRuntime>> {
        self.workers.lock().get(worker_id).cloned()
    }
}

impl Drop for WorkerManager {
    fn drop(&mut self) {
        self.terminate_all();
    }
}
