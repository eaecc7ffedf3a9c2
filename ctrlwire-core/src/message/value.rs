use super::DynamicMessage;
use crate::schema::Kind;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// A single field value of a [`DynamicMessage`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Bytes),
    /// The number of an enum value, or [`crate::schema::UNRECOGNIZED`].
    EnumNumber(i32),
    Message(DynamicMessage),
    /// Elements of a repeated field.
    List(Vec<Value>),
    /// Entries of a map field.
    Map(BTreeMap<MapKey, Value>),
}

/// The key of a map field entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MapKey {
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    String(String),
}

impl Value {
    /// The zero value of a kind, as used by the default instance of a message.
    pub fn default_for(kind: &Kind) -> Value {
        match kind {
            Kind::Int32 => Value::I32(0),
            Kind::Int64 => Value::I64(0),
            Kind::Uint32 => Value::U32(0),
            Kind::Uint64 => Value::U64(0),
            Kind::Bool => Value::Bool(false),
            Kind::String => Value::String(String::new()),
            Kind::Bytes => Value::Bytes(Bytes::new()),
            Kind::Double => Value::F64(0.0),
            Kind::Float => Value::F32(0.0),
            Kind::Enum(desc) => Value::EnumNumber(desc.default_number()),
            Kind::Message(desc) => Value::Message(DynamicMessage::new(desc.clone())),
            Kind::Map { .. } => Value::Map(BTreeMap::new()),
        }
    }

    /// Whether this scalar equals the zero value of its kind.
    ///
    /// Messages, lists and maps are never considered default here: their presence is
    /// tracked separately.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(v) => !v,
            Value::I32(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => *v == 0.0,
            Value::F64(v) => *v == 0.0,
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::EnumNumber(v) => *v == 0,
            Value::Message(_) | Value::List(_) | Value::Map(_) => false,
        }
    }

    /// Whether this value can be stored as a single (non-repeated) value of `kind`.
    pub fn is_valid_for(&self, kind: &Kind) -> bool {
        match (self, kind) {
            (Value::Bool(_), Kind::Bool)
            | (Value::I32(_), Kind::Int32)
            | (Value::I64(_), Kind::Int64)
            | (Value::U32(_), Kind::Uint32)
            | (Value::U64(_), Kind::Uint64)
            | (Value::F32(_), Kind::Float)
            | (Value::F64(_), Kind::Double)
            | (Value::String(_), Kind::String)
            | (Value::Bytes(_), Kind::Bytes)
            | (Value::EnumNumber(_), Kind::Enum(_)) => true,
            (Value::Message(msg), Kind::Message(desc)) => msg.descriptor() == desc,
            (Value::Map(entries), Kind::Map { key, value }) => entries
                .iter()
                .all(|(k, v)| k.is_valid_for(key) && v.is_valid_for(value)),
            _ => false,
        }
    }

    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<MapKey, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Signed integral view of integer, bool and enum values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(v) | Value::EnumNumber(v) => Some(i64::from(*v)),
            Value::I64(v) => Some(*v),
            Value::U32(v) => Some(i64::from(*v)),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

impl MapKey {
    pub fn is_valid_for(&self, kind: &Kind) -> bool {
        matches!(
            (self, kind),
            (MapKey::Bool(_), Kind::Bool)
                | (MapKey::I32(_), Kind::Int32)
                | (MapKey::I64(_), Kind::Int64)
                | (MapKey::U32(_), Kind::Uint32)
                | (MapKey::U64(_), Kind::Uint64)
                | (MapKey::String(_), Kind::String)
        )
    }

    pub fn default_for(kind: &Kind) -> Option<MapKey> {
        Some(match kind {
            Kind::Bool => MapKey::Bool(false),
            Kind::Int32 => MapKey::I32(0),
            Kind::Int64 => MapKey::I64(0),
            Kind::Uint32 => MapKey::U32(0),
            Kind::Uint64 => MapKey::U64(0),
            Kind::String => MapKey::String(String::new()),
            _ => return None,
        })
    }

    pub fn from_value(value: Value) -> Option<MapKey> {
        Some(match value {
            Value::Bool(v) => MapKey::Bool(v),
            Value::I32(v) => MapKey::I32(v),
            Value::I64(v) => MapKey::I64(v),
            Value::U32(v) => MapKey::U32(v),
            Value::U64(v) => MapKey::U64(v),
            Value::String(v) => MapKey::String(v),
            _ => return None,
        })
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(v) => Value::Bool(*v),
            MapKey::I32(v) => Value::I32(*v),
            MapKey::I64(v) => Value::I64(*v),
            MapKey::U32(v) => Value::U32(*v),
            MapKey::U64(v) => Value::U64(*v),
            MapKey::String(v) => Value::String(v.clone()),
        }
    }
}

/// Map keys are stringified the way the JSON mapping expects.
impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(v) => write!(f, "{v}"),
            MapKey::I32(v) => write!(f, "{v}"),
            MapKey::I64(v) => write!(f, "{v}"),
            MapKey::U32(v) => write!(f, "{v}"),
            MapKey::U64(v) => write!(f, "{v}"),
            MapKey::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::U32(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::U64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<DynamicMessage> for Value {
    fn from(value: DynamicMessage) -> Self {
        Value::Message(value)
    }
}

impl From<&str> for MapKey {
    fn from(value: &str) -> Self {
        MapKey::String(value.to_string())
    }
}
