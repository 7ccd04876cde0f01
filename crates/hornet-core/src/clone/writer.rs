//! Serialization half of the structured-clone codec.
//!
//! Values are classified by brand. The first encounter of an
//! identity-bearing value registers it in the memory map before its
//! payload is written, so a later encounter (shared reference or cycle)
//! emits an `ObjectRef` back-reference instead of recursing forever.

use rustc_hash::FxHashMap;

use crate::error::CloneError;
use crate::value::{JsError, JsObject, Value};

use super::{
    error_tag, view_tag, CloneLimits, CloneType, SerializedData, WriteBuffer,
};

/// Serialize with the default limits.
pub fn serialize(value: &Value) -> Result<SerializedData, CloneError> {
    serialize_with_limits(value, CloneLimits::default())
}

pub fn serialize_with_limits(
    value: &Value,
    limits: CloneLimits,
) -> Result<SerializedData, CloneError> {
    let mut writer = CloneWriter::new(limits);
    writer.write_value(value)?;
    Ok(SerializedData::from_vec(writer.buffer.take()))
}

struct CloneWriter {
    buffer: WriteBuffer,
    /// Handle address -> assigned ref id, first-encounter order.
    memory: FxHashMap<usize, u32>,
    next_ref_id: u32,
    depth: usize,
    limits: CloneLimits,
}

impl CloneWriter {
    fn new(limits: CloneLimits) -> Self {
        Self {
            buffer: WriteBuffer::default(),
            memory: FxHashMap::default(),
            next_ref_id: 0,
            depth: 0,
            limits,
        }
    }

    fn write_value(&mut self, value: &Value) -> Result<(), CloneError> {
        self.check_depth()?;
        self.check_size()?;

        match value {
            Value::Undefined => {
                self.write_tag(CloneType::Undefined);
                Ok(())
            }
            Value::Null => {
                self.write_tag(CloneType::Null);
                Ok(())
            }
            Value::Bool(true) => {
                self.write_tag(CloneType::BoolTrue);
                Ok(())
            }
            Value::Bool(false) => {
                self.write_tag(CloneType::BoolFalse);
                Ok(())
            }
            Value::Int32(i) => {
                self.write_tag(CloneType::Int32);
                self.buffer.write_i32(*i);
                Ok(())
            }
            Value::Double(d) => {
                self.write_number(*d);
                Ok(())
            }
            Value::String(s) => {
                self.write_tag(CloneType::String);
                self.buffer.write_string(s);
                Ok(())
            }

            // The BigInt tag is reserved on the wire but the writer does
            // not emit it; posting a BigInt is a clone refusal.
            Value::BigInt(_) => Err(CloneError::CannotCloneType("BigInt")),
            Value::Function(_) => Err(CloneError::CannotCloneType("Function")),
            Value::Symbol(_) => Err(CloneError::CannotCloneType("Symbol")),
            Value::Promise => Err(CloneError::CannotCloneType("Promise")),
            Value::WeakMap => Err(CloneError::CannotCloneType("WeakMap")),
            Value::WeakSet => Err(CloneError::CannotCloneType("WeakSet")),
            Value::Proxy => Err(CloneError::CannotCloneType("Proxy")),

            Value::Object(obj) => {
                if self.try_write_ref(obj.ptr_id()) {
                    return Ok(());
                }
                self.register(obj.ptr_id());
                self.write_object(obj)
            }
            Value::Array(arr) => {
                if self.try_write_ref(arr.ptr_id()) {
                    return Ok(());
                }
                self.register(arr.ptr_id());
                let values = arr.values();
                self.write_tag(CloneType::Array);
                self.buffer.write_u32(values.len() as u32);
                self.depth += 1;
                for element in &values {
                    self.write_value(element)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Value::Date(date) => {
                if self.try_write_ref(date.ptr_id()) {
                    return Ok(());
                }
                self.register(date.ptr_id());
                self.write_tag(CloneType::Date);
                self.buffer.write_f64(date.timestamp_ms());
                Ok(())
            }
            Value::RegExp(regexp) => {
                if self.try_write_ref(regexp.ptr_id()) {
                    return Ok(());
                }
                self.register(regexp.ptr_id());
                self.write_tag(CloneType::RegExp);
                self.buffer.write_string(regexp.source());
                self.buffer.write_string(regexp.flags());
                Ok(())
            }
            Value::Map(map) => {
                if self.try_write_ref(map.ptr_id()) {
                    return Ok(());
                }
                self.register(map.ptr_id());
                let entries = map.entries();
                self.write_tag(CloneType::Map);
                self.buffer.write_u32(entries.len() as u32);
                self.depth += 1;
                for (key, val) in &entries {
                    self.write_value(key)?;
                    self.write_value(val)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Value::Set(set) => {
                if self.try_write_ref(set.ptr_id()) {
                    return Ok(());
                }
                self.register(set.ptr_id());
                let values = set.values();
                self.write_tag(CloneType::Set);
                self.buffer.write_u32(values.len() as u32);
                self.depth += 1;
                for element in &values {
                    self.write_value(element)?;
                }
                self.depth -= 1;
                Ok(())
            }
            Value::Error(err) => {
                if self.try_write_ref(err.ptr_id()) {
                    return Ok(());
                }
                self.register(err.ptr_id());
                self.write_error(err);
                Ok(())
            }
            Value::ArrayBuffer(buf) => {
                if self.try_write_ref(buf.ptr_id()) {
                    return Ok(());
                }
                if buf.is_detached() {
                    return Err(CloneError::DetachedArrayBuffer);
                }
                self.register(buf.ptr_id());
                let bytes = buf.to_vec();
                self.write_tag(CloneType::ArrayBuffer);
                self.buffer.write_u32(bytes.len() as u32);
                self.buffer.write_bytes(&bytes);
                Ok(())
            }
            Value::TypedArray(view) => {
                if self.try_write_ref(view.ptr_id()) {
                    return Ok(());
                }
                if view.buffer().is_detached() {
                    return Err(CloneError::DetachedArrayBuffer);
                }
                self.register(view.ptr_id());
                let bytes = view.buffer().to_vec();
                self.write_tag(view_tag(view.kind()));
                self.buffer.write_u32(bytes.len() as u32);
                self.buffer.write_bytes(&bytes);
                self.buffer.write_u32(view.byte_offset() as u32);
                self.buffer.write_u32(view.length() as u32);
                Ok(())
            }
            Value::DataView(view) => {
                if self.try_write_ref(view.ptr_id()) {
                    return Ok(());
                }
                if view.buffer().is_detached() {
                    return Err(CloneError::DetachedArrayBuffer);
                }
                self.register(view.ptr_id());
                let bytes = view.buffer().to_vec();
                self.write_tag(CloneType::DataView);
                self.buffer.write_u32(bytes.len() as u32);
                self.buffer.write_bytes(&bytes);
                self.buffer.write_u32(view.byte_offset() as u32);
                self.buffer.write_u32(view.byte_length() as u32);
                Ok(())
            }
        }
    }

    fn write_object(&mut self, obj: &JsObject) -> Result<(), CloneError> {
        let entries = obj.entries();
        self.write_tag(CloneType::Object);
        self.buffer.write_u32(entries.len() as u32);
        self.depth += 1;
        for (key, val) in &entries {
            self.buffer.write_string(key);
            self.write_value(val)?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn write_error(&mut self, err: &JsError) {
        self.write_tag(error_tag(err.kind()));
        // A generic Error keeps its own name property; subclasses write
        // their canonical constructor name.
        self.buffer.write_string(err.name());
        self.buffer.write_string(err.message());
    }

    /// Int32 when the double is finite and exactly representable,
    /// Double otherwise.
    fn write_number(&mut self, n: f64) {
        if crate::value::is_int32(n) {
            self.write_tag(CloneType::Int32);
            self.buffer.write_i32(n as i32);
        } else {
            self.write_tag(CloneType::Double);
            self.buffer.write_f64(n);
        }
    }

    fn write_tag(&mut self, tag: CloneType) {
        self.buffer.write_u8(tag as u8);
    }

    fn try_write_ref(&mut self, ptr_id: usize) -> bool {
        if let Some(ref_id) = self.memory.get(&ptr_id) {
            self.buffer.write_u8(CloneType::ObjectRef as u8);
            self.buffer.write_u32(*ref_id);
            return true;
        }
        false
    }

    fn register(&mut self, ptr_id: usize) {
        self.memory.insert(ptr_id, self.next_ref_id);
        self.next_ref_id += 1;
    }

    fn check_depth(&self) -> Result<(), CloneError> {
        if self.depth >= self.limits.max_depth {
            return Err(CloneError::MaxDepthExceeded);
        }
        Ok(())
    }

    fn check_size(&self) -> Result<(), CloneError> {
        if self.buffer.len() >= self.limits.max_size {
            return Err(CloneError::MaxSizeExceeded);
        }
        Ok(())
    }
}
