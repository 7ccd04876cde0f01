//! Deserialization half of the structured-clone codec.
//!
//! Ref ids are implicit: every identity-bearing value is registered in
//! encounter order, and the id is the table size at the moment of
//! registration — the same order the writer assigned. Containers
//! register before their children are read, so an `ObjectRef` inside a
//! child resolves to the container still under construction.

use num_bigint::{BigInt, Sign};

use crate::error::CloneError;
use crate::value::{
    JsArray, JsArrayBuffer, JsDataView, JsDate, JsError, JsMap, JsObject, JsRegExp, JsSet,
    JsTypedArray, Value,
};

use super::{error_kind, view_kind, CloneType, ReadBuffer};

/// Reconstruct the value graph encoded in `data`. Trailing bytes after
/// the root value are ignored.
pub fn deserialize(data: &[u8]) -> Result<Value, CloneError> {
    let mut reader = CloneReader {
        buffer: ReadBuffer::new(data),
        refs: Vec::new(),
    };
    reader.read_value()
}

struct CloneReader<'a> {
    buffer: ReadBuffer<'a>,
    /// Ref id -> reconstructed value; the id is the index.
    refs: Vec<Value>,
}

impl CloneReader<'_> {
    fn read_value(&mut self) -> Result<Value, CloneError> {
        let tag = CloneType::from_u8(self.buffer.read_u8()?).ok_or(CloneError::InvalidData)?;

        match tag {
            CloneType::Undefined => Ok(Value::Undefined),
            CloneType::Null => Ok(Value::Null),
            CloneType::BoolTrue => Ok(Value::Bool(true)),
            CloneType::BoolFalse => Ok(Value::Bool(false)),
            CloneType::Int32 => Ok(Value::Int32(self.buffer.read_i32()?)),
            CloneType::Double => Ok(Value::Double(self.buffer.read_f64()?)),
            CloneType::BigInt => self.read_bigint(),
            CloneType::String => Ok(Value::string(self.buffer.read_string()?)),

            CloneType::Object => self.read_object(),
            CloneType::Array => self.read_array(),
            CloneType::Date => {
                let timestamp = self.buffer.read_f64()?;
                let value = Value::Date(JsDate::new(timestamp));
                self.register(&value);
                Ok(value)
            }
            CloneType::RegExp => {
                let source = self.buffer.read_string()?;
                let flags = self.buffer.read_string()?;
                let value = Value::RegExp(JsRegExp::new(source, flags));
                self.register(&value);
                Ok(value)
            }
            CloneType::Map => self.read_map(),
            CloneType::Set => self.read_set(),

            CloneType::Error
            | CloneType::EvalError
            | CloneType::RangeError
            | CloneType::ReferenceError
            | CloneType::SyntaxError
            | CloneType::TypeError
            | CloneType::UriError => self.read_error(tag),

            CloneType::ArrayBuffer => {
                let byte_length = self.buffer.read_u32()? as usize;
                let bytes = self.buffer.read_bytes(byte_length)?.to_vec();
                let value = Value::ArrayBuffer(JsArrayBuffer::from_bytes(bytes));
                self.register(&value);
                Ok(value)
            }
            CloneType::DataView => self.read_data_view(),

            CloneType::Int8Array
            | CloneType::Uint8Array
            | CloneType::Uint8ClampedArray
            | CloneType::Int16Array
            | CloneType::Uint16Array
            | CloneType::Int32Array
            | CloneType::Uint32Array
            | CloneType::Float32Array
            | CloneType::Float64Array
            | CloneType::BigInt64Array
            | CloneType::BigUint64Array => self.read_typed_array(tag),

            CloneType::ObjectRef => {
                let ref_id = self.buffer.read_u32()? as usize;
                self.refs.get(ref_id).cloned().ok_or(CloneError::InvalidData)
            }
        }
    }

    fn read_object(&mut self) -> Result<Value, CloneError> {
        let prop_count = self.buffer.read_u32()?;
        let obj = JsObject::new();
        let value = Value::Object(obj.clone());
        self.register(&value);

        for _ in 0..prop_count {
            let key = self.buffer.read_string()?;
            let prop = self.read_value()?;
            obj.set(key, prop);
        }
        Ok(value)
    }

    fn read_array(&mut self) -> Result<Value, CloneError> {
        let length = self.buffer.read_u32()?;
        let arr = JsArray::new();
        let value = Value::Array(arr.clone());
        self.register(&value);

        for _ in 0..length {
            arr.push(self.read_value()?);
        }
        Ok(value)
    }

    fn read_map(&mut self) -> Result<Value, CloneError> {
        let size = self.buffer.read_u32()?;
        let map = JsMap::new();
        let value = Value::Map(map.clone());
        self.register(&value);

        for _ in 0..size {
            let key = self.read_value()?;
            let val = self.read_value()?;
            map.insert(key, val);
        }
        Ok(value)
    }

    fn read_set(&mut self) -> Result<Value, CloneError> {
        let size = self.buffer.read_u32()?;
        let set = JsSet::new();
        let value = Value::Set(set.clone());
        self.register(&value);

        for _ in 0..size {
            set.add(self.read_value()?);
        }
        Ok(value)
    }

    fn read_error(&mut self, tag: CloneType) -> Result<Value, CloneError> {
        let name = self.buffer.read_string()?;
        let message = self.buffer.read_string()?;
        let kind = error_kind(tag).ok_or(CloneError::InvalidData)?;

        // Subclass tags reconstruct through their canonical constructor;
        // the encoded name only matters for the generic Error tag.
        let err = if tag == CloneType::Error {
            JsError::with_name(name, message)
        } else {
            JsError::new(kind, message)
        };
        let value = Value::Error(err);
        self.register(&value);
        Ok(value)
    }

    fn read_typed_array(&mut self, tag: CloneType) -> Result<Value, CloneError> {
        let buffer_byte_length = self.buffer.read_u32()? as usize;
        let bytes = self.buffer.read_bytes(buffer_byte_length)?.to_vec();
        let byte_offset = self.buffer.read_u32()? as usize;
        let length = self.buffer.read_u32()? as usize;

        let kind = view_kind(tag).ok_or(CloneError::InvalidData)?;
        let buffer = JsArrayBuffer::from_bytes(bytes);
        let view = JsTypedArray::new(buffer, kind, byte_offset, length)
            .map_err(|_| CloneError::InvalidData)?;
        let value = Value::TypedArray(view);
        self.register(&value);
        Ok(value)
    }

    fn read_data_view(&mut self) -> Result<Value, CloneError> {
        let buffer_byte_length = self.buffer.read_u32()? as usize;
        let bytes = self.buffer.read_bytes(buffer_byte_length)?.to_vec();
        let byte_offset = self.buffer.read_u32()? as usize;
        let byte_length = self.buffer.read_u32()? as usize;

        let buffer = JsArrayBuffer::from_bytes(bytes);
        let view = JsDataView::new(buffer, byte_offset, byte_length)
            .map_err(|_| CloneError::InvalidData)?;
        let value = Value::DataView(view);
        self.register(&value);
        Ok(value)
    }

    fn read_bigint(&mut self) -> Result<Value, CloneError> {
        let sign = match self.buffer.read_u8()? {
            0 => Sign::Plus,
            1 => Sign::Minus,
            _ => return Err(CloneError::InvalidData),
        };
        let magnitude_len = self.buffer.read_u32()? as usize;
        let magnitude = self.buffer.read_bytes(magnitude_len)?;
        if magnitude.is_empty() {
            return Ok(Value::BigInt(BigInt::from(0)));
        }
        Ok(Value::BigInt(BigInt::from_bytes_le(sign, magnitude)))
    }

    fn register(&mut self, value: &Value) {
        self.refs.push(value.clone());
    }
}
