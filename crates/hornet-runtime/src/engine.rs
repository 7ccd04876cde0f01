//! The seam between the runtime and an embedded script engine.
//!
//! The runtime never links an engine; it drives one through
//! [`ScriptEngine`]. An engine instance is created on its worker's
//! thread and from then on touched only under that worker's engine
//! mutex — either by the event loop or by the synchronous evaluation
//! path.
//!
//! Bindings convert engine values to [`Value`] at this seam,
//! classifying objects by their internal brand (the
//! `Object.prototype.toString` tag): known brands map to the matching
//! arm, refused brands (Function, Symbol, WeakMap, WeakSet, Promise,
//! Proxy) to the refusal arms, and unknown brands become a plain object
//! carrying their own enumerable properties. Within one conversion pass
//! a binding must reuse handles for identical engine objects, or shared
//! references and cycles will not survive cloning.

use std::sync::Arc;

use hornet_core::{ScriptError, Value};

/// A native function installed into the engine's global scope. Invoked
/// on the worker thread; an `Err` becomes a script-visible exception in
/// the calling frame.
pub type HostFunction = Arc<dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync>;

/// A single-threaded embedded script engine.
pub trait ScriptEngine: Send {
    /// Evaluate `source`, returning the completion value. `source_url`
    /// names the script in stack traces and diagnostics.
    fn eval(&mut self, source: &str, source_url: &str) -> Result<Value, ScriptError>;

    /// Call a global function by name. A missing-but-optional
    /// entrypoint (an unset message handler) resolves to `Undefined`;
    /// calling a non-function is a `ReferenceError`.
    fn call_global(&mut self, name: &str, args: &[Value]) -> Result<Value, ScriptError>;

    /// Install a native function on the global object.
    fn register_host_function(
        &mut self,
        name: &str,
        func: HostFunction,
    ) -> Result<(), ScriptError>;

    /// Run queued microtasks (promise continuations, `queueMicrotask`)
    /// to completion. Called after every macrotask.
    fn drain_microtasks(&mut self) -> Result<(), ScriptError>;
}

/// Creates one engine per worker, on the worker's own thread.
pub trait EngineFactory: Send + Sync {
    fn create_engine(&self) -> Result<Box<dyn ScriptEngine>, ScriptError>;
}
