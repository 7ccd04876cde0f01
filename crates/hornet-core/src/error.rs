//! Error types shared by the value model and the clone codec.

use thiserror::Error;

/// A script-visible exception: the constructor name and the message, the
/// two pieces every embedded engine can produce and consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub name: String,
    pub message: String,
}

impl ScriptError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new("ReferenceError", message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message)
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for ScriptError {}

/// Clone refusals re-enter the calling script frame as a
/// `DataCloneError`, the name the HTML structured-clone algorithm uses.
impl From<CloneError> for ScriptError {
    fn from(err: CloneError) -> Self {
        Self::new("DataCloneError", err.to_string())
    }
}

/// The closed set of structured-clone failures.
///
/// Writer refusals carry the offending brand in `CannotCloneType`; limit
/// violations and reader failures have dedicated variants so callers can
/// match on the exact subcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CloneError {
    #[error("{0} cannot be cloned")]
    CannotCloneType(&'static str),

    #[error("maximum recursion depth exceeded")]
    MaxDepthExceeded,

    #[error("maximum serialization size exceeded")]
    MaxSizeExceeded,

    #[error("cannot clone detached ArrayBuffer")]
    DetachedArrayBuffer,

    #[error("invalid serialized data")]
    InvalidData,
}
