//! Rendering of evaluation results for the synchronous host API.
//!
//! The rules, applied in order: a string is itself; numbers render as
//! the shortest lossless decimal (integer form when exact); booleans,
//! null and undefined by name; objects render as their `JSON.stringify`
//! equivalent, falling back to `[object Object]` when the graph cannot
//! be represented (cycles, BigInt members); anything else is
//! `[unknown]`.

use serde_json::{Map as JsonMap, Number as JsonNumber, Value as JsonValue};

use crate::value::{JsTypedArray, TypedArrayKind, Value};

/// Anything `JSON.stringify` would throw on, plus graphs we refuse to
/// walk (cycles).
struct Unrepresentable;

pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Int32(i) => i.to_string(),
        Value::Double(d) => format_number(*d),
        Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),

        Value::Object(_)
        | Value::Array(_)
        | Value::Date(_)
        | Value::RegExp(_)
        | Value::Map(_)
        | Value::Set(_)
        | Value::Error(_)
        | Value::ArrayBuffer(_)
        | Value::TypedArray(_)
        | Value::DataView(_)
        | Value::Promise
        | Value::WeakMap
        | Value::WeakSet
        | Value::Proxy => match json_value(value, &mut Vec::new()) {
            Ok(Some(json)) => json.to_string(),
            _ => "[object Object]".to_string(),
        },

        Value::BigInt(_) | Value::Function(_) | Value::Symbol(_) => "[unknown]".to_string(),
    }
}

/// Shortest round-trip decimal; integer form when the value is integral
/// and fits a 64-bit integer.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if n == n.trunc() && n >= -I64_BOUND && n < I64_BOUND {
        return (n as i64).to_string();
    }
    n.to_string()
}

/// `Ok(None)` mirrors `JSON.stringify` returning `undefined` for the
/// value (dropped from objects, nulled in arrays).
fn json_value(value: &Value, seen: &mut Vec<usize>) -> Result<Option<JsonValue>, Unrepresentable> {
    match value {
        Value::Undefined | Value::Function(_) | Value::Symbol(_) => Ok(None),
        Value::Null => Ok(Some(JsonValue::Null)),
        Value::Bool(b) => Ok(Some(JsonValue::Bool(*b))),
        Value::Int32(i) => Ok(Some(JsonValue::Number(JsonNumber::from(*i)))),
        Value::Double(d) => Ok(Some(json_number(*d))),
        Value::String(s) => Ok(Some(JsonValue::String(s.to_string()))),
        Value::BigInt(_) => Err(Unrepresentable),

        Value::Date(date) => Ok(Some(date_json(date.timestamp_ms()))),

        Value::Object(obj) => with_cycle_guard(seen, obj.ptr_id(), |seen| {
            let mut map = JsonMap::new();
            for (key, prop) in obj.entries() {
                if let Some(json) = json_value(&prop, seen)? {
                    map.insert(key, json);
                }
            }
            Ok(Some(JsonValue::Object(map)))
        }),
        Value::Array(arr) => with_cycle_guard(seen, arr.ptr_id(), |seen| {
            let mut elements = Vec::with_capacity(arr.len());
            for element in arr.values() {
                elements.push(json_value(&element, seen)?.unwrap_or(JsonValue::Null));
            }
            Ok(Some(JsonValue::Array(elements)))
        }),

        Value::TypedArray(view) => typed_array_json(view),

        // No enumerable own properties: an empty object, like
        // JSON.stringify(new Map()) and friends.
        Value::RegExp(_)
        | Value::Map(_)
        | Value::Set(_)
        | Value::Error(_)
        | Value::ArrayBuffer(_)
        | Value::DataView(_)
        | Value::Promise
        | Value::WeakMap
        | Value::WeakSet
        | Value::Proxy => Ok(Some(JsonValue::Object(JsonMap::new()))),
    }
}

fn with_cycle_guard<F>(
    seen: &mut Vec<usize>,
    id: usize,
    f: F,
) -> Result<Option<JsonValue>, Unrepresentable>
where
    F: FnOnce(&mut Vec<usize>) -> Result<Option<JsonValue>, Unrepresentable>,
{
    if seen.contains(&id) {
        return Err(Unrepresentable);
    }
    seen.push(id);
    let result = f(seen);
    seen.pop();
    result
}

fn json_number(n: f64) -> JsonValue {
    if !n.is_finite() {
        // JSON.stringify(Infinity) and (NaN) are "null".
        return JsonValue::Null;
    }
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if n == n.trunc() && n >= -I64_BOUND && n < I64_BOUND {
        return JsonValue::Number(JsonNumber::from(n as i64));
    }
    JsonNumber::from_f64(n).map_or(JsonValue::Null, JsonValue::Number)
}

fn date_json(timestamp_ms: f64) -> JsonValue {
    if !timestamp_ms.is_finite() {
        return JsonValue::Null;
    }
    match chrono::DateTime::from_timestamp_millis(timestamp_ms as i64) {
        Some(dt) => JsonValue::String(dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()),
        None => JsonValue::Null,
    }
}

fn typed_array_json(view: &JsTypedArray) -> Result<Option<JsonValue>, Unrepresentable> {
    // BigInt elements make JSON.stringify throw.
    if matches!(
        view.kind(),
        TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64
    ) {
        return Err(Unrepresentable);
    }

    let bytes = view.buffer().to_vec();
    let bpe = view.kind().bytes_per_element();
    let mut map = JsonMap::new();
    for index in 0..view.length() {
        let start = view.byte_offset() + index * bpe;
        let element = &bytes[start..start + bpe];
        let n = decode_element(view.kind(), element);
        map.insert(index.to_string(), json_number(n));
    }
    Ok(Some(JsonValue::Object(map)))
}

fn decode_element(kind: TypedArrayKind, bytes: &[u8]) -> f64 {
    match kind {
        TypedArrayKind::Int8 => f64::from(bytes[0] as i8),
        TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => f64::from(bytes[0]),
        TypedArrayKind::Int16 => {
            f64::from(i16::from_ne_bytes(bytes.try_into().expect("2 bytes")))
        }
        TypedArrayKind::Uint16 => {
            f64::from(u16::from_ne_bytes(bytes.try_into().expect("2 bytes")))
        }
        TypedArrayKind::Int32 => {
            f64::from(i32::from_ne_bytes(bytes.try_into().expect("4 bytes")))
        }
        TypedArrayKind::Uint32 => {
            f64::from(u32::from_ne_bytes(bytes.try_into().expect("4 bytes")))
        }
        TypedArrayKind::Float32 => {
            f64::from(f32::from_ne_bytes(bytes.try_into().expect("4 bytes")))
        }
        TypedArrayKind::Float64 => f64::from_ne_bytes(bytes.try_into().expect("8 bytes")),
        TypedArrayKind::BigInt64 | TypedArrayKind::BigUint64 => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{JsArray, JsArrayBuffer, JsDate, JsFunction, JsMap, JsObject, JsSymbol};
    use num_bigint::BigInt;

    #[test]
    fn strings_render_verbatim() {
        assert_eq!(display_string(&Value::string("hi")), "hi");
    }

    #[test]
    fn numbers_render_shortest_with_integer_fold() {
        assert_eq!(display_string(&Value::Int32(3)), "3");
        assert_eq!(display_string(&Value::Double(3.0)), "3");
        assert_eq!(display_string(&Value::Double(0.1)), "0.1");
        assert_eq!(display_string(&Value::Double(-2.5)), "-2.5");
        assert_eq!(display_string(&Value::Double(f64::NAN)), "NaN");
        assert_eq!(display_string(&Value::Double(f64::INFINITY)), "Infinity");
    }

    #[test]
    fn keywords_render_by_name() {
        assert_eq!(display_string(&Value::Bool(true)), "true");
        assert_eq!(display_string(&Value::Bool(false)), "false");
        assert_eq!(display_string(&Value::Null), "null");
        assert_eq!(display_string(&Value::Undefined), "undefined");
    }

    #[test]
    fn objects_render_as_json_in_insertion_order() {
        let obj = JsObject::new();
        obj.set("b", Value::Int32(2));
        obj.set("a", Value::Double(1.0));
        obj.set("s", Value::string("x"));
        assert_eq!(display_string(&Value::Object(obj)), r#"{"b":2,"a":1,"s":"x"}"#);
    }

    #[test]
    fn undefined_members_drop_from_objects_and_null_in_arrays() {
        let obj = JsObject::new();
        obj.set("gone", Value::Undefined);
        obj.set("f", Value::Function(JsFunction::new(|_| Ok(Value::Undefined))));
        obj.set("kept", Value::Int32(1));
        assert_eq!(display_string(&Value::Object(obj)), r#"{"kept":1}"#);

        let arr = JsArray::from_values([Value::Undefined, Value::Int32(1)]);
        assert_eq!(display_string(&Value::Array(arr)), "[null,1]");
    }

    #[test]
    fn cyclic_objects_fall_back() {
        let obj = JsObject::new();
        obj.set("me", Value::Object(obj.clone()));
        assert_eq!(display_string(&Value::Object(obj)), "[object Object]");
    }

    #[test]
    fn bigint_member_falls_back() {
        let obj = JsObject::new();
        obj.set("n", Value::BigInt(BigInt::from(1)));
        assert_eq!(display_string(&Value::Object(obj)), "[object Object]");
    }

    #[test]
    fn exotic_objects_render_empty() {
        assert_eq!(display_string(&Value::Map(JsMap::new())), "{}");
        assert_eq!(
            display_string(&Value::ArrayBuffer(JsArrayBuffer::new(4))),
            "{}"
        );
    }

    #[test]
    fn dates_render_iso_inside_json() {
        let arr = JsArray::from_values([Value::Date(JsDate::new(0.0))]);
        assert_eq!(
            display_string(&Value::Array(arr)),
            r#"["1970-01-01T00:00:00.000Z"]"#
        );
        let invalid = JsArray::from_values([Value::Date(JsDate::new(f64::NAN))]);
        assert_eq!(display_string(&Value::Array(invalid)), "[null]");
    }

    #[test]
    fn non_objects_without_rules_are_unknown() {
        assert_eq!(display_string(&Value::BigInt(BigInt::from(7))), "[unknown]");
        assert_eq!(
            display_string(&Value::Function(JsFunction::new(|_| Ok(Value::Undefined)))),
            "[unknown]"
        );
        assert_eq!(display_string(&Value::Symbol(JsSymbol::new(None))), "[unknown]");
    }

    #[test]
    fn typed_arrays_render_index_keyed() {
        let buffer = JsArrayBuffer::from_bytes(vec![1, 2, 250]);
        let view =
            crate::value::JsTypedArray::new(buffer, TypedArrayKind::Uint8, 1, 2).unwrap();
        assert_eq!(
            display_string(&Value::TypedArray(view)),
            r#"{"0":2,"1":250}"#
        );
    }
}
