//! hornet-runtime — a multi-worker scripting runtime host.
//!
//! Embeds any single-threaded script engine behind the [`ScriptEngine`]
//! trait and gives each worker its own OS thread, engine instance, and
//! HTML-style event loop. The host talks to workers through the
//! [`WorkerManager`]; workers talk back through host callbacks.
//!
//! ```text
//! host ──> WorkerManager ──> worker (by id) ──> TaskQueue ──> event loop ──> engine
//!                                 │
//!   on_message / on_console / on_error  <── engine natives <──┘
//! ```
//!
//! Structured values cross the boundary through the clone codec in
//! `hornet-core`; plain text messages take a JSON side channel, matching
//! the web-worker `postMessage` contract the bootstrap script installs.

pub mod bootstrap;
pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod manager;
pub mod task_queue;
pub mod testing;
pub mod worker;

pub use callbacks::{
    BinaryMessageCallback, ConsoleCallback, ConsoleLevel, ErrorCallback, HostCallbacks,
    MessageCallback,
};
pub use config::RuntimeConfig;
pub use engine::{EngineFactory, HostFunction, ScriptEngine};
pub use error::{WorkerError, WorkerResult};
pub use manager::WorkerManager;
pub use task_queue::{Task, TaskFn, TaskQueue, TaskType};
pub use worker::WorkerRuntime;

pub use hornet_core::{CloneError, CloneLimits, ScriptError, SerializedData, Value};
