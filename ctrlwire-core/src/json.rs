//! # JSON projection
//!
//! Converts [`DynamicMessage`] values to and from the canonical proto3 JSON shape used by
//! the control-plane web clients:
//!
//! * Keys are lowerCamelCase JSON names. Input also accepts the original field name.
//! * 64-bit integers are strings, 32-bit integers are numbers.
//! * Bytes are standard base64.
//! * Enums are their symbolic names.
//! * `google.protobuf.Timestamp` is an RFC 3339 string.
//! * Maps are objects keyed by the stringified map key.
use crate::message::{DynamicMessage, MapKey, Value};
use crate::schema::{EnumDescriptor, FieldDescriptor, Kind, MessageDescriptor, UNRECOGNIZED};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use bytes::Bytes;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::BTreeMap;
use std::str::FromStr;

const UNRECOGNIZED_NAME: &str = "UNRECOGNIZED";

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Expected a JSON object for message '{message}', found: {found}")]
    ExpectedObject { message: String, found: JsonValue },
    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: JsonValue },
    #[error("Invalid base64 in field '{field}': {source}")]
    InvalidBase64 {
        field: String,
        source: base64::DecodeError,
    },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(JsonValue),
    #[error("Invalid key '{key}' for map field '{field}'")]
    InvalidMapKey { field: String, key: String },
}

impl DynamicMessage {
    /// Projects the message to JSON.
    ///
    /// Singular fields at their default value, empty repeated and map fields, and unset
    /// fields with presence are omitted.
    pub fn to_json(&self) -> JsonValue {
        if self.descriptor().is_timestamp() {
            return timestamp_to_json(self);
        }

        let mut object = Map::new();
        for (field, value) in self.fields() {
            if self.has(&field) {
                object.insert(field.json_name().to_string(), value_to_json(&field.kind(), value));
            }
        }
        JsonValue::Object(object)
    }

    /// Builds a message of type `desc` from its JSON projection.
    ///
    /// Unknown keys are ignored and `null` leaves a field at its default.
    ///
    /// # Returns
    ///
    /// * `Ok(DynamicMessage)` - The default instance with every recognised key applied.
    /// * `Err(JsonError)` - A value does not fit the type of its field.
    pub fn from_json(desc: MessageDescriptor, json: &JsonValue) -> Result<Self, JsonError> {
        if desc.is_timestamp() {
            return timestamp_from_json(desc, json);
        }

        let object = match json {
            JsonValue::Object(object) => object,
            JsonValue::Null => return Ok(Self::new(desc)),
            other => {
                return Err(JsonError::ExpectedObject {
                    message: desc.full_name().to_string(),
                    found: other.clone(),
                });
            }
        };

        let mut message = Self::new(desc.clone());
        for (key, value) in object {
            let Some(field) = desc.get_field_by_name(key) else {
                tracing::trace!(message = desc.full_name(), key, "ignoring unknown JSON key");
                continue;
            };
            if value.is_null() {
                message.clear(&field);
                continue;
            }
            let value = field_from_json(&field, value)?;
            message.put(&field, value);
        }

        Ok(message)
    }
}

fn value_to_json(kind: &Kind, value: &Value) -> JsonValue {
    match (value, kind) {
        (Value::List(items), kind) => {
            JsonValue::Array(items.iter().map(|item| value_to_json(kind, item)).collect())
        }
        (Value::Map(entries), Kind::Map { value: value_kind, .. }) => JsonValue::Object(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), value_to_json(value_kind, value)))
                .collect(),
        ),
        (Value::EnumNumber(number), Kind::Enum(desc)) => JsonValue::String(
            desc.get_value(*number)
                .map_or(UNRECOGNIZED_NAME, |value| value.name.as_str())
                .to_string(),
        ),
        (value, _) => scalar_to_json(value),
    }
}

fn scalar_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Bool(v) => JsonValue::Bool(*v),
        Value::I32(v) | Value::EnumNumber(v) => JsonValue::from(*v),
        Value::U32(v) => JsonValue::from(*v),
        Value::I64(v) => JsonValue::String(v.to_string()),
        Value::U64(v) => JsonValue::String(v.to_string()),
        Value::F32(v) => float_to_json(f64::from(*v)),
        Value::F64(v) => float_to_json(*v),
        Value::String(v) => JsonValue::String(v.clone()),
        Value::Bytes(v) => JsonValue::String(STANDARD.encode(v)),
        Value::Message(msg) => msg.to_json(),
        Value::List(_) | Value::Map(_) => JsonValue::Null,
    }
}

fn float_to_json(v: f64) -> JsonValue {
    if v.is_nan() {
        JsonValue::String("NaN".to_string())
    } else if v == f64::INFINITY {
        JsonValue::String("Infinity".to_string())
    } else if v == f64::NEG_INFINITY {
        JsonValue::String("-Infinity".to_string())
    } else {
        Number::from_f64(v).map_or(JsonValue::Null, JsonValue::Number)
    }
}

fn field_from_json(field: &FieldDescriptor, json: &JsonValue) -> Result<Value, JsonError> {
    let kind = field.kind();

    if let Kind::Map { key, value } = &kind {
        let JsonValue::Object(object) = json else {
            return Err(invalid(field, json));
        };

        let mut entries = BTreeMap::new();
        for (raw_key, raw_value) in object {
            let entry_key = map_key_from_str(key, raw_key).ok_or_else(|| JsonError::InvalidMapKey {
                field: field.name().to_string(),
                key: raw_key.clone(),
            })?;
            entries.insert(entry_key, single_from_json(field, value, raw_value)?);
        }
        return Ok(Value::Map(entries));
    }

    if field.is_repeated() {
        let JsonValue::Array(items) = json else {
            return Err(invalid(field, json));
        };
        return items
            .iter()
            .map(|item| single_from_json(field, &kind, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List);
    }

    single_from_json(field, &kind, json)
}

fn single_from_json(field: &FieldDescriptor, kind: &Kind, json: &JsonValue) -> Result<Value, JsonError> {
    if json.is_null() {
        return Ok(Value::default_for(kind));
    }

    let value = match kind {
        Kind::Int32 => integer(json).map(Value::I32),
        Kind::Int64 => integer(json).map(Value::I64),
        Kind::Uint32 => integer(json).map(Value::U32),
        Kind::Uint64 => integer(json).map(Value::U64),
        Kind::Bool => json.as_bool().map(Value::Bool),
        Kind::Double => float(json).map(Value::F64),
        Kind::Float => float(json).map(|v| Value::F32(v as f32)),
        Kind::String => json.as_str().map(Value::from),
        Kind::Bytes => {
            let Some(encoded) = json.as_str() else {
                return Err(invalid(field, json));
            };
            let decoded = STANDARD
                .decode(encoded)
                .or_else(|_| URL_SAFE.decode(encoded))
                .map_err(|source| JsonError::InvalidBase64 {
                    field: field.name().to_string(),
                    source,
                })?;
            Some(Value::Bytes(Bytes::from(decoded)))
        }
        Kind::Enum(desc) => enum_from_json(desc, json).map(Value::EnumNumber),
        Kind::Message(desc) => {
            return DynamicMessage::from_json(desc.clone(), json).map(Value::Message);
        }
        Kind::Map { .. } => None,
    };

    value.ok_or_else(|| invalid(field, json))
}

fn invalid(field: &FieldDescriptor, json: &JsonValue) -> JsonError {
    JsonError::InvalidValue {
        field: field.name().to_string(),
        value: json.clone(),
    }
}

/// Accepts a JSON number or a decimal string that fits `T`.
fn integer<T>(json: &JsonValue) -> Option<T>
where
    T: TryFrom<i64> + TryFrom<u64> + FromStr,
{
    match json {
        JsonValue::Number(n) => {
            if let Some(v) = n.as_i64() {
                <T as TryFrom<i64>>::try_from(v).ok()
            } else {
                n.as_u64().and_then(|v| <T as TryFrom<u64>>::try_from(v).ok())
            }
        }
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn float(json: &JsonValue) -> Option<f64> {
    match json {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            // `f64::from_str` also reads "inf" and "nan".
            other => other.parse::<f64>().ok().filter(|v| v.is_finite()),
        },
        _ => None,
    }
}

fn enum_from_json(desc: &EnumDescriptor, json: &JsonValue) -> Option<i32> {
    match json {
        JsonValue::String(name) => Some(
            desc.get_value_by_name(name)
                .map_or(UNRECOGNIZED, |value| value.number),
        ),
        JsonValue::Number(_) => {
            let number: i32 = integer(json)?;
            Some(if desc.get_value(number).is_some() {
                number
            } else {
                UNRECOGNIZED
            })
        }
        _ => None,
    }
}

fn map_key_from_str(kind: &Kind, raw: &str) -> Option<MapKey> {
    Some(match kind {
        Kind::Bool => MapKey::Bool(raw.parse().ok()?),
        Kind::Int32 => MapKey::I32(raw.parse().ok()?),
        Kind::Int64 => MapKey::I64(raw.parse().ok()?),
        Kind::Uint32 => MapKey::U32(raw.parse().ok()?),
        Kind::Uint64 => MapKey::U64(raw.parse().ok()?),
        Kind::String => MapKey::String(raw.to_string()),
        _ => return None,
    })
}

fn timestamp_parts(message: &DynamicMessage) -> (i64, i32) {
    let seconds = message.get_by_number(1).and_then(Value::as_i64).unwrap_or(0);
    let nanos = message
        .get_by_number(2)
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .unwrap_or(0);
    (seconds, nanos)
}

fn timestamp_to_json(message: &DynamicMessage) -> JsonValue {
    let (seconds, nanos) = timestamp_parts(message);
    JsonValue::String(prost_types::Timestamp { seconds, nanos }.to_string())
}

/// Accepts an RFC 3339 string, a `{seconds, nanos}` object or integer epoch milliseconds.
fn timestamp_from_json(desc: MessageDescriptor, json: &JsonValue) -> Result<DynamicMessage, JsonError> {
    let timestamp_error = || JsonError::InvalidTimestamp(json.clone());

    let (seconds, nanos) = match json {
        JsonValue::Null => (0, 0),
        JsonValue::String(s) => {
            let parsed = prost_types::Timestamp::from_str(s).map_err(|_| timestamp_error())?;
            (parsed.seconds, parsed.nanos)
        }
        JsonValue::Number(n) => {
            let millis = n.as_i64().ok_or_else(timestamp_error)?;
            let nanos = millis.rem_euclid(1_000) * 1_000_000;
            (millis.div_euclid(1_000), nanos as i32)
        }
        JsonValue::Object(object) => {
            let seconds = match object.get("seconds") {
                None | Some(JsonValue::Null) => 0,
                Some(v) => integer(v).ok_or_else(timestamp_error)?,
            };
            let nanos = match object.get("nanos") {
                None | Some(JsonValue::Null) => 0,
                Some(v) => integer::<i32>(v)
                    .filter(|n| (0..1_000_000_000).contains(n))
                    .ok_or_else(timestamp_error)?,
            };
            (seconds, nanos)
        }
        _ => return Err(timestamp_error()),
    };

    let mut message = DynamicMessage::new(desc.clone());
    if let Some(field) = desc.get_field(1) {
        message.put(&field, Value::I64(seconds));
    }
    if let Some(field) = desc.get_field(2) {
        message.put(&field, Value::I32(nanos));
    }
    Ok(message)
}
