//! Engine test doubles.
//!
//! [`ScriptedEngine`] implements [`ScriptEngine`] without executing any
//! JavaScript: a "script" is a Rust program registered on the factory
//! against its exact source text, and the [`ScriptedScope`] handed to a
//! program drives the same native functions the real bootstrap globals
//! would (`__native_post_message_to_host`, `__native_schedule_timer`,
//! and friends). The runtime's own test-suite runs on it; embedders can
//! use it to exercise host integration without a real engine.

use std::collections::VecDeque;
use std::sync::Arc;

use hornet_core::{JsFunction, ScriptError, Value};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::bootstrap::BOOTSTRAP_SOURCE_URL;
use crate::engine::{EngineFactory, HostFunction, ScriptEngine};

/// A registered stand-in for a script: runs when its source text is
/// evaluated, returns the completion value.
pub type Program = Arc<dyn Fn(&ScriptedScope) -> Result<Value, ScriptError> + Send + Sync>;

type MessageHandler =
    Arc<Mutex<Box<dyn FnMut(&ScriptedScope, Value) -> Result<(), ScriptError> + Send>>>;

type Microtask = Box<dyn FnOnce(&ScriptedScope) -> Result<(), ScriptError> + Send>;

struct EngineState {
    host_fns: FxHashMap<String, HostFunction>,
    message_handler: Option<MessageHandler>,
    microtasks: VecDeque<Microtask>,
    next_timer_id: u64,
    vars: FxHashMap<String, Value>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            host_fns: FxHashMap::default(),
            message_handler: None,
            microtasks: VecDeque::new(),
            next_timer_id: 1,
            vars: FxHashMap::default(),
        }
    }
}

/// What a scripted program sees of its worker global scope.
#[derive(Clone)]
pub struct ScriptedScope {
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedScope {
    fn call_host(&self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        let func = self.state.lock().host_fns.get(name).cloned();
        match func {
            Some(func) => func(args),
            None => Err(ScriptError::reference_error(format!(
                "{name} is not defined"
            ))),
        }
    }

    /// `postMessage`, text path.
    pub fn post_message(&self, text: &str) -> Result<(), ScriptError> {
        self.call_host("__native_post_message_to_host", &[Value::string(text)])
            .map(|_| ())
    }

    /// `postMessage`, structured path.
    pub fn post_structured(&self, value: Value) -> Result<(), ScriptError> {
        self.call_host("__native_post_message_structured", &[value])
            .map(|_| ())
    }

    /// `console.<level>(message)`.
    pub fn console(&self, level: &str, message: &str) -> Result<(), ScriptError> {
        self.call_host(
            "__native_console_log",
            &[Value::string(level), Value::string(message)],
        )
        .map(|_| ())
    }

    /// `close()`.
    pub fn close(&self) -> Result<(), ScriptError> {
        self.call_host("__native_request_close", &[]).map(|_| ())
    }

    /// `self.onmessage = handler`.
    pub fn on_message(
        &self,
        handler: impl FnMut(&ScriptedScope, Value) -> Result<(), ScriptError> + Send + 'static,
    ) {
        self.state.lock().message_handler = Some(Arc::new(Mutex::new(Box::new(handler))));
    }

    /// `setTimeout(f, delay_ms)`; returns the script-assigned timer id.
    pub fn set_timeout(
        &self,
        delay_ms: f64,
        f: impl Fn(&ScriptedScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) -> Result<u64, ScriptError> {
        self.schedule(delay_ms, false, f)
    }

    /// `setInterval(f, delay_ms)`.
    pub fn set_interval(
        &self,
        delay_ms: f64,
        f: impl Fn(&ScriptedScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) -> Result<u64, ScriptError> {
        self.schedule(delay_ms, true, f)
    }

    /// `clearTimeout` / `clearInterval`.
    pub fn clear_timer(&self, timer_id: u64) -> Result<(), ScriptError> {
        self.call_host("__native_cancel_timer", &[Value::number(timer_id as f64)])
            .map(|_| ())
    }

    /// `queueMicrotask(f)`.
    pub fn queue_microtask(
        &self,
        f: impl FnOnce(&ScriptedScope) -> Result<(), ScriptError> + Send + 'static,
    ) {
        self.state.lock().microtasks.push_back(Box::new(f));
    }

    /// A global variable slot, for programs that carry state between
    /// handlers and evaluations.
    pub fn set_var(&self, name: &str, value: Value) {
        self.state.lock().vars.insert(name.to_string(), value);
    }

    pub fn var(&self, name: &str) -> Option<Value> {
        self.state.lock().vars.get(name).cloned()
    }

    fn schedule(
        &self,
        delay_ms: f64,
        repeating: bool,
        f: impl Fn(&ScriptedScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) -> Result<u64, ScriptError> {
        let timer_id = {
            let mut state = self.state.lock();
            let id = state.next_timer_id;
            state.next_timer_id += 1;
            id
        };
        let scope = self.clone();
        let callback = JsFunction::new(move |_args| f(&scope).map(|()| Value::Undefined));
        self.call_host(
            "__native_schedule_timer",
            &[
                Value::number(timer_id as f64),
                Value::number(delay_ms),
                Value::Bool(repeating),
                Value::Function(callback),
            ],
        )?;
        Ok(timer_id)
    }
}

/// An engine whose scripts are registered Rust programs.
pub struct ScriptedEngine {
    programs: Arc<Mutex<FxHashMap<String, Program>>>,
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    fn scope(&self) -> ScriptedScope {
        ScriptedScope {
            state: self.state.clone(),
        }
    }
}

impl ScriptEngine for ScriptedEngine {
    fn eval(&mut self, source: &str, source_url: &str) -> Result<Value, ScriptError> {
        // The bootstrap is real JavaScript this double cannot run; its
        // globals are modeled by the scope API instead.
        if source_url == BOOTSTRAP_SOURCE_URL {
            return Ok(Value::Undefined);
        }
        let program = self.programs.lock().get(source).cloned();
        match program {
            Some(program) => program(&self.scope()),
            None => Err(ScriptError::syntax_error(format!(
                "no scripted program registered for source: {source}"
            ))),
        }
    }

    fn call_global(&mut self, name: &str, args: &[Value]) -> Result<Value, ScriptError> {
        match name {
            "__handleMessage" => {
                let handler = self.state.lock().message_handler.clone();
                if let Some(handler) = handler {
                    let data = args.first().cloned().unwrap_or(Value::Undefined);
                    let scope = self.scope();
                    (*handler.lock())(&scope, data)?;
                }
                Ok(Value::Undefined)
            }
            _ => Err(ScriptError::reference_error(format!(
                "{name} is not a function"
            ))),
        }
    }

    fn register_host_function(
        &mut self,
        name: &str,
        func: HostFunction,
    ) -> Result<(), ScriptError> {
        self.state.lock().host_fns.insert(name.to_string(), func);
        Ok(())
    }

    fn drain_microtasks(&mut self) -> Result<(), ScriptError> {
        // Microtasks may queue further microtasks; drain to empty.
        loop {
            let task = self.state.lock().microtasks.pop_front();
            match task {
                Some(task) => task(&self.scope())?,
                None => return Ok(()),
            }
        }
    }
}

/// Factory for [`ScriptedEngine`]s. All engines share the program
/// registry; each gets fresh state.
#[derive(Default)]
pub struct ScriptedEngineFactory {
    programs: Arc<Mutex<FxHashMap<String, Program>>>,
    fail_creation: bool,
}

impl ScriptedEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory whose `create_engine` always fails, for exercising
    /// initialization-error paths.
    pub fn failing() -> Self {
        Self {
            programs: Arc::new(Mutex::new(FxHashMap::default())),
            fail_creation: true,
        }
    }

    /// Register the program that stands in for `source`.
    pub fn register(
        &self,
        source: &str,
        program: impl Fn(&ScriptedScope) -> Result<Value, ScriptError> + Send + Sync + 'static,
    ) {
        self.programs
            .lock()
            .insert(source.to_string(), Arc::new(program));
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn create_engine(&self) -> Result<Box<dyn ScriptEngine>, ScriptError> {
        if self.fail_creation {
            return Err(ScriptError::new(
                "EngineError",
                "engine creation disabled by test factory",
            ));
        }
        Ok(Box::new(ScriptedEngine {
            programs: self.programs.clone(),
            state: Arc::new(Mutex::new(EngineState::default())),
        }))
    }
}
