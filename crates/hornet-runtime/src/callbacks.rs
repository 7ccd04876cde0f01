//! Host callback surface.
//!
//! Workers invoke these from their own threads; implementations must be
//! thread-safe. The defaults route into the `tracing` crate so an
//! embedder without callbacks still sees worker output in its logs.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

/// Console level, matching the four methods the bootstrap installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Log,
    Warn,
    Info,
    Error,
}

impl ConsoleLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Error => "error",
        }
    }
}

impl fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsoleLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(ConsoleLevel::Log),
            "warn" => Ok(ConsoleLevel::Warn),
            "info" => Ok(ConsoleLevel::Info),
            "error" => Ok(ConsoleLevel::Error),
            _ => Err(()),
        }
    }
}

/// Text message from a worker: `(worker_id, message)`.
pub type MessageCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Structured-clone message from a worker: `(worker_id, bytes)`.
pub type BinaryMessageCallback = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Console output from a worker: `(worker_id, level, message)`.
pub type ConsoleCallback = Arc<dyn Fn(&str, ConsoleLevel, &str) + Send + Sync>;

/// A surfaced worker error: `(worker_id, message)`. Never fatal to the
/// host.
pub type ErrorCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// The callback set a worker captures at construction.
#[derive(Clone)]
pub struct HostCallbacks {
    pub(crate) message: MessageCallback,
    pub(crate) binary_message: BinaryMessageCallback,
    pub(crate) console: ConsoleCallback,
    pub(crate) error: ErrorCallback,
}

impl HostCallbacks {
    pub fn with_message(mut self, callback: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.message = Arc::new(callback);
        self
    }

    pub fn with_binary_message(
        mut self,
        callback: impl Fn(&str, &[u8]) + Send + Sync + 'static,
    ) -> Self {
        self.binary_message = Arc::new(callback);
        self
    }

    pub fn with_console(
        mut self,
        callback: impl Fn(&str, ConsoleLevel, &str) + Send + Sync + 'static,
    ) -> Self {
        self.console = Arc::new(callback);
        self
    }

    pub fn with_error(mut self, callback: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.error = Arc::new(callback);
        self
    }
}

impl Default for HostCallbacks {
    fn default() -> Self {
        Self {
            message: Arc::new(|worker_id, message| {
                debug!(worker = %worker_id, "message: {}", message);
            }),
            binary_message: Arc::new(|worker_id, bytes| {
                debug!(worker = %worker_id, "binary message ({} bytes)", bytes.len());
            }),
            console: Arc::new(|worker_id, level, message| match level {
                ConsoleLevel::Log | ConsoleLevel::Info => {
                    info!(worker = %worker_id, "{}", message)
                }
                ConsoleLevel::Warn => warn!(worker = %worker_id, "{}", message),
                ConsoleLevel::Error => error!(worker = %worker_id, "{}", message),
            }),
            error: Arc::new(|worker_id, message| {
                error!(worker = %worker_id, "{}", message);
            }),
        }
    }
}
