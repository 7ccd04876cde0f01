//! Worker global-scope bootstrap.
//!
//! Evaluated once per worker, before the user script. It builds the
//! web-worker surface — `self`, `postMessage`, message listeners,
//! `console`, `queueMicrotask`, `close`, and the timer family — on top
//! of the native functions the worker registers (see
//! [`crate::engine`]). Timer ids are assigned script-side and handed to
//! the native scheduler, so `clearTimeout`/`clearInterval` can cancel
//! by the id the script already holds.

pub(crate) const BOOTSTRAP_JS: &str = include_str!("bootstrap.js");

/// Source URL the bootstrap is evaluated under. Engine test doubles
/// that cannot execute JavaScript key on it to accept the bootstrap as
/// a no-op.
pub const BOOTSTRAP_SOURCE_URL: &str = "<hornet-bootstrap>";
