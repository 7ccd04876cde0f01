//! Script values exchanged between the host and workers.
//!
//! The runtime does not own a script engine, so a value crossing the
//! boundary is a tagged variant with one arm per clone tag, plus arms
//! for the brands the clone writer refuses (functions, symbols, weak
//! collections, promises, proxies). Heap-backed arms are shared
//! handles: cloning a [`Value`] clones the handle, not the data, and
//! two clones of one handle are the same object as far as the codec's
//! memory map is concerned.
//!
//! Engine bindings classify engine objects by their internal brand
//! (`Object.prototype.toString` style) and map known brands onto the
//! matching arm; objects with an unknown brand become a plain
//! [`JsObject`] holding their own enumerable properties.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigInt;
use parking_lot::Mutex;

use crate::error::ScriptError;

/// A plain object: insertion-ordered string-keyed properties.
#[derive(Clone, Default)]
pub struct JsObject(Arc<Mutex<Vec<(String, Value)>>>);

impl JsObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a property, replacing an existing one in place so property
    /// order matches first assignment.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key = key.into();
        let mut props = self.0.lock();
        match props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => props.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0
            .lock()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.lock().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Snapshot of the properties in insertion order. Callers recurse
    /// over the snapshot, never while holding the lock.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Not derived: a cyclic graph would recurse forever.
        write!(f, "JsObject({} properties)", self.len())
    }
}

/// A dense array. Holes read back as `undefined`.
#[derive(Clone, Default)]
pub struct JsArray(Arc<Mutex<Vec<Value>>>);

impl JsArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        Self(Arc::new(Mutex::new(values.into_iter().collect())))
    }

    pub fn push(&self, value: Value) {
        self.0.lock().push(value);
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.lock().get(index).cloned()
    }

    /// Set an element, growing the array with `undefined` holes.
    pub fn set(&self, index: usize, value: Value) {
        let mut values = self.0.lock();
        if index >= values.len() {
            values.resize(index + 1, Value::Undefined);
        }
        values[index] = value;
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn ptr_eq(&self, other: &JsArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsArray({} elements)", self.len())
    }
}

/// Insertion-ordered map with SameValueZero key equality.
#[derive(Clone, Default)]
pub struct JsMap(Arc<Mutex<Vec<(Value, Value)>>>);

impl JsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: Value, value: Value) {
        let mut entries = self.0.lock();
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(slot) => slot.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0
            .lock()
            .iter()
            .find(|(k, _)| k.same_value_zero(key))
            .map(|(_, v)| v.clone())
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn ptr_eq(&self, other: &JsMap) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsMap({} entries)", self.len())
    }
}

/// Insertion-ordered set with SameValueZero membership.
#[derive(Clone, Default)]
pub struct JsSet(Arc<Mutex<Vec<Value>>>);

impl JsSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, value: Value) {
        let mut values = self.0.lock();
        if !values.iter().any(|v| v.same_value_zero(&value)) {
            values.push(value);
        }
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.lock().iter().any(|v| v.same_value_zero(value))
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn ptr_eq(&self, other: &JsSet) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl fmt::Debug for JsSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsSet({} values)", self.len())
    }
}

/// A date: milliseconds since the Unix epoch, NaN for invalid dates.
#[derive(Clone, Debug)]
pub struct JsDate(Arc<Mutex<f64>>);

impl JsDate {
    pub fn new(timestamp_ms: f64) -> Self {
        Self(Arc::new(Mutex::new(timestamp_ms)))
    }

    pub fn timestamp_ms(&self) -> f64 {
        *self.0.lock()
    }

    pub fn ptr_eq(&self, other: &JsDate) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[derive(Debug)]
struct RegExpInner {
    source: String,
    flags: String,
}

/// A regular expression, carried as pattern source plus flags. The host
/// never compiles it; only the engines on either end do.
#[derive(Clone, Debug)]
pub struct JsRegExp(Arc<RegExpInner>);

impl JsRegExp {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self(Arc::new(RegExpInner {
            source: source.into(),
            flags: flags.into(),
        }))
    }

    pub fn source(&self) -> &str {
        &self.0.source
    }

    pub fn flags(&self) -> &str {
        &self.0.flags
    }

    pub fn ptr_eq(&self, other: &JsRegExp) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

/// The error constructors with a dedicated wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    Eval,
    Range,
    Reference,
    Syntax,
    Type,
    Uri,
}

impl ErrorKind {
    pub fn canonical_name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Eval => "EvalError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Uri => "URIError",
        }
    }
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    name: String,
    message: String,
}

/// An error object: subclass kind, `name`, and `message`.
#[derive(Clone, Debug)]
pub struct JsError(Arc<ErrorInner>);

impl JsError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self(Arc::new(ErrorInner {
            kind,
            name: kind.canonical_name().to_string(),
            message: message.into(),
        }))
    }

    /// A generic `Error` with a custom `name` property.
    pub fn with_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self(Arc::new(ErrorInner {
            kind: ErrorKind::Error,
            name: name.into(),
            message: message.into(),
        }))
    }

    pub fn kind(&self) -> ErrorKind {
        self.0.kind
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn message(&self) -> &str {
        &self.0.message
    }

    pub fn ptr_eq(&self, other: &JsError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[derive(Debug, Default)]
struct BufferInner {
    bytes: Vec<u8>,
    detached: bool,
}

/// A raw binary buffer. Detaching empties it; a detached buffer refuses
/// to clone.
#[derive(Clone, Debug, Default)]
pub struct JsArrayBuffer(Arc<Mutex<BufferInner>>);

impl JsArrayBuffer {
    pub fn new(byte_length: usize) -> Self {
        Self::from_bytes(vec![0; byte_length])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(Arc::new(Mutex::new(BufferInner {
            bytes,
            detached: false,
        })))
    }

    pub fn byte_length(&self) -> usize {
        self.0.lock().bytes.len()
    }

    pub fn is_detached(&self) -> bool {
        self.0.lock().detached
    }

    /// Detach the buffer, taking its contents.
    pub fn detach(&self) -> Vec<u8> {
        let mut inner = self.0.lock();
        inner.detached = true;
        std::mem::take(&mut inner.bytes)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.lock().bytes.clone()
    }

    pub fn write_at(&self, offset: usize, data: &[u8]) -> bool {
        let mut inner = self.0.lock();
        match inner.bytes.get_mut(offset..offset + data.len()) {
            Some(slot) => {
                slot.copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    pub fn ptr_eq(&self, other: &JsArrayBuffer) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

/// Element kinds for typed-array views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl TypedArrayKind {
    pub fn bytes_per_element(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 | TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
            TypedArrayKind::BigInt64 => "BigInt64Array",
            TypedArrayKind::BigUint64 => "BigUint64Array",
        }
    }
}

#[derive(Debug)]
struct TypedArrayInner {
    buffer: JsArrayBuffer,
    kind: TypedArrayKind,
    byte_offset: usize,
    length: usize,
}

/// A typed view over a [`JsArrayBuffer`]. `length` counts elements.
#[derive(Clone, Debug)]
pub struct JsTypedArray(Arc<TypedArrayInner>);

impl JsTypedArray {
    pub fn new(
        buffer: JsArrayBuffer,
        kind: TypedArrayKind,
        byte_offset: usize,
        length: usize,
    ) -> Result<Self, ScriptError> {
        let byte_end = byte_offset
            .checked_add(length.checked_mul(kind.bytes_per_element()).ok_or_else(|| {
                ScriptError::new("RangeError", "typed array length out of range")
            })?)
            .ok_or_else(|| ScriptError::new("RangeError", "typed array length out of range"))?;
        if byte_end > buffer.byte_length() {
            return Err(ScriptError::new(
                "RangeError",
                "typed array does not fit in its buffer",
            ));
        }
        Ok(Self(Arc::new(TypedArrayInner {
            buffer,
            kind,
            byte_offset,
            length,
        })))
    }

    pub fn buffer(&self) -> &JsArrayBuffer {
        &self.0.buffer
    }

    pub fn kind(&self) -> TypedArrayKind {
        self.0.kind
    }

    pub fn byte_offset(&self) -> usize {
        self.0.byte_offset
    }

    pub fn length(&self) -> usize {
        self.0.length
    }

    pub fn byte_length(&self) -> usize {
        self.0.length * self.0.kind.bytes_per_element()
    }

    pub fn ptr_eq(&self, other: &JsTypedArray) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

#[derive(Debug)]
struct DataViewInner {
    buffer: JsArrayBuffer,
    byte_offset: usize,
    byte_length: usize,
}

/// An untyped byte view over a [`JsArrayBuffer`].
#[derive(Clone, Debug)]
pub struct JsDataView(Arc<DataViewInner>);

impl JsDataView {
    pub fn new(
        buffer: JsArrayBuffer,
        byte_offset: usize,
        byte_length: usize,
    ) -> Result<Self, ScriptError> {
        let byte_end = byte_offset.checked_add(byte_length).ok_or_else(|| {
            ScriptError::new("RangeError", "data view length out of range")
        })?;
        if byte_end > buffer.byte_length() {
            return Err(ScriptError::new(
                "RangeError",
                "data view does not fit in its buffer",
            ));
        }
        Ok(Self(Arc::new(DataViewInner {
            buffer,
            byte_offset,
            byte_length,
        })))
    }

    pub fn buffer(&self) -> &JsArrayBuffer {
        &self.0.buffer
    }

    pub fn byte_offset(&self) -> usize {
        self.0.byte_offset
    }

    pub fn byte_length(&self) -> usize {
        self.0.byte_length
    }

    pub fn ptr_eq(&self, other: &JsDataView) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn ptr_id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

type FunctionImpl = dyn Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync;

/// An opaque callable handed across the engine seam (timer callbacks,
/// listeners). Never cloneable; only ever invoked on the thread that
/// owns the engine it came from.
#[derive(Clone)]
pub struct JsFunction(Arc<FunctionImpl>);

impl JsFunction {
    pub fn new(f: impl Fn(&[Value]) -> Result<Value, ScriptError> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, ScriptError> {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &JsFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsFunction")
    }
}

/// A symbol, kept only so the writer can refuse it by brand.
#[derive(Clone, Debug)]
pub struct JsSymbol(Arc<Option<String>>);

impl JsSymbol {
    pub fn new(description: Option<String>) -> Self {
        Self(Arc::new(description))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn ptr_eq(&self, other: &JsSymbol) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A script value: one arm per clone tag plus the refused brands.
#[derive(Clone, Debug)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Int32(i32),
    Double(f64),
    BigInt(BigInt),
    String(Arc<str>),
    Object(JsObject),
    Array(JsArray),
    Date(JsDate),
    RegExp(JsRegExp),
    Map(JsMap),
    Set(JsSet),
    Error(JsError),
    ArrayBuffer(JsArrayBuffer),
    TypedArray(JsTypedArray),
    DataView(JsDataView),
    Function(JsFunction),
    Symbol(JsSymbol),
    Promise,
    WeakMap,
    WeakSet,
    Proxy,
}

impl Value {
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::String(s.into())
    }

    /// A number value, folded to `Int32` when exactly representable.
    pub fn number(n: f64) -> Self {
        if is_int32(n) {
            Value::Int32(n as i32)
        } else {
            Value::Double(n)
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int32(i) => Some(f64::from(*i)),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsArray> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The value's brand, as error messages name it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "Boolean",
            Value::Int32(_) | Value::Double(_) => "Number",
            Value::BigInt(_) => "BigInt",
            Value::String(_) => "String",
            Value::Object(_) => "Object",
            Value::Array(_) => "Array",
            Value::Date(_) => "Date",
            Value::RegExp(_) => "RegExp",
            Value::Map(_) => "Map",
            Value::Set(_) => "Set",
            Value::Error(_) => "Error",
            Value::ArrayBuffer(_) => "ArrayBuffer",
            Value::TypedArray(ta) => ta.kind().name(),
            Value::DataView(_) => "DataView",
            Value::Function(_) => "Function",
            Value::Symbol(_) => "Symbol",
            Value::Promise => "Promise",
            Value::WeakMap => "WeakMap",
            Value::WeakSet => "WeakSet",
            Value::Proxy => "Proxy",
        }
    }

    /// SameValueZero: numeric equality with NaN equal to itself, heap
    /// values by identity.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b || (a.is_nan() && b.is_nan());
        }
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Date(a), Value::Date(b)) => a.ptr_eq(b),
            (Value::RegExp(a), Value::RegExp(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Error(a), Value::Error(b)) => a.ptr_eq(b),
            (Value::ArrayBuffer(a), Value::ArrayBuffer(b)) => a.ptr_eq(b),
            (Value::TypedArray(a), Value::TypedArray(b)) => a.ptr_eq(b),
            (Value::DataView(a), Value::DataView(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Symbol(a), Value::Symbol(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

pub(crate) fn is_int32(n: f64) -> bool {
    n.is_finite() && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) && n == (n as i32) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_preserves_insertion_order_and_replaces_in_place() {
        let obj = JsObject::new();
        obj.set("b", Value::Int32(1));
        obj.set("a", Value::Int32(2));
        obj.set("b", Value::Int32(3));

        assert_eq!(obj.keys(), vec!["b".to_string(), "a".to_string()]);
        assert!(matches!(obj.get("b"), Some(Value::Int32(3))));
        assert!(obj.get("missing").is_none());
    }

    #[test]
    fn array_set_grows_with_undefined_holes() {
        let arr = JsArray::new();
        arr.set(2, Value::Int32(7));
        assert_eq!(arr.len(), 3);
        assert!(matches!(arr.get(0), Some(Value::Undefined)));
        assert!(matches!(arr.get(2), Some(Value::Int32(7))));
    }

    #[test]
    fn map_keys_use_same_value_zero() {
        let map = JsMap::new();
        map.insert(Value::Double(1.0), Value::string("a"));
        map.insert(Value::Int32(1), Value::string("b"));
        map.insert(Value::Double(f64::NAN), Value::string("nan"));
        map.insert(Value::Double(f64::NAN), Value::string("nan2"));

        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&Value::Int32(1)).and_then(|v| v.as_str().map(String::from)),
            Some("b".to_string())
        );
    }

    #[test]
    fn set_dedupes_by_identity_for_objects() {
        let set = JsSet::new();
        let obj = JsObject::new();
        set.add(Value::Object(obj.clone()));
        set.add(Value::Object(obj.clone()));
        set.add(Value::Object(JsObject::new()));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn detached_buffer_is_empty() {
        let buf = JsArrayBuffer::from_bytes(vec![1, 2, 3]);
        assert_eq!(buf.byte_length(), 3);
        let taken = buf.detach();
        assert_eq!(taken, vec![1, 2, 3]);
        assert!(buf.is_detached());
        assert_eq!(buf.byte_length(), 0);
    }

    #[test]
    fn typed_array_rejects_views_past_the_buffer() {
        let buf = JsArrayBuffer::new(8);
        assert!(JsTypedArray::new(buf.clone(), TypedArrayKind::Int16, 2, 3).is_ok());
        assert!(JsTypedArray::new(buf.clone(), TypedArrayKind::Int16, 2, 4).is_err());
        assert!(JsDataView::new(buf.clone(), 4, 4).is_ok());
        assert!(JsDataView::new(buf, 4, 5).is_err());
    }

    #[test]
    fn same_value_zero_distinguishes_identity_from_structure() {
        let a = JsObject::new();
        let b = JsObject::new();
        assert!(Value::Object(a.clone()).same_value_zero(&Value::Object(a.clone())));
        assert!(!Value::Object(a).same_value_zero(&Value::Object(b)));
        assert!(Value::Int32(0).same_value_zero(&Value::Double(-0.0)));
    }

    #[test]
    fn number_folds_exact_int32() {
        assert!(matches!(Value::number(42.0), Value::Int32(42)));
        assert!(matches!(Value::number(1.5), Value::Double(_)));
        assert!(matches!(Value::number(f64::from(i32::MAX) + 1.0), Value::Double(_)));
    }
}
