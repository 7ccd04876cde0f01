//! hornet-core — script value model and structured-clone codec.
//!
//! The hornet runtime embeds script engines it does not own, so values
//! crossing the host/worker boundary are modeled here as a tagged
//! variant ([`Value`]) with one arm per wire tag. The [`clone`] module
//! turns a value graph into a self-describing byte sequence and back,
//! preserving shared references and cycles; [`format`] renders values
//! for the synchronous evaluation API.
//!
//! This crate knows nothing about threads, workers, or engines.

pub mod clone;
pub mod error;
pub mod format;
pub mod value;

pub use clone::{deserialize, serialize, serialize_with_limits, CloneLimits, CloneType, SerializedData};
pub use num_bigint::BigInt;
pub use error::{CloneError, ScriptError};
pub use value::{
    ErrorKind, JsArray, JsArrayBuffer, JsDataView, JsDate, JsError, JsFunction, JsMap, JsObject,
    JsRegExp, JsSet, JsSymbol, JsTypedArray, TypedArrayKind, Value,
};
