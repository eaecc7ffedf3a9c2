//! Descriptor-driven protobuf encoding.
use super::{DynamicMessage, MapKey, Value};
use crate::schema::{FieldDescriptor, Kind};
use crate::wire::{self, WireType};
use bytes::{BufMut, Bytes};

impl DynamicMessage {
    /// Serializes the message into `buf`.
    ///
    /// Fields are written in declaration order. Singular fields without presence are
    /// skipped when they hold their default value; repeated fields are written one tag
    /// per element; map entries are written as `{1: key, 2: value}` sub-messages.
    pub fn encode(&self, buf: &mut impl BufMut) {
        for (field, value) in self.fields() {
            encode_field(&field, value, buf);
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        Bytes::from(self.encode_to_vec())
    }

    /// Serializes the message preceded by its length as a varint.
    pub fn encode_length_delimited_to_vec(&self) -> Vec<u8> {
        let body = self.encode_to_vec();
        let mut buf = Vec::with_capacity(body.len() + wire::encoded_len_varint(body.len() as u64));
        wire::encode_length_delimited(&body, &mut buf);
        buf
    }
}

fn encode_field(field: &FieldDescriptor, value: &Value, buf: &mut impl BufMut) {
    let kind = field.kind();

    match (value, &kind) {
        (Value::List(items), _) => {
            for item in items {
                encode_value(field.number(), &kind, item, buf);
            }
        }
        (Value::Map(entries), Kind::Map { key, value: value_kind }) => {
            for (entry_key, entry_value) in entries {
                let entry = encode_map_entry(key, value_kind, entry_key, entry_value);
                wire::encode_tag(field.number(), WireType::LengthDelimited, buf);
                wire::encode_length_delimited(&entry, buf);
            }
        }
        (value, kind) => {
            if !field.has_presence() && value.is_default() {
                return;
            }
            encode_value(field.number(), kind, value, buf);
        }
    }
}

fn encode_map_entry(key_kind: &Kind, value_kind: &Kind, key: &MapKey, value: &Value) -> Vec<u8> {
    let mut entry = Vec::new();
    let key = key.to_value();

    if !key.is_default() {
        encode_value(1, key_kind, &key, &mut entry);
    }
    // Message values have presence and are always written.
    if !value.is_default() {
        encode_value(2, value_kind, value, &mut entry);
    }

    entry
}

/// Writes the tag and payload of a single value.
fn encode_value(number: u32, kind: &Kind, value: &Value, buf: &mut impl BufMut) {
    wire::encode_tag(number, kind.wire_type(), buf);

    match value {
        Value::Bool(v) => wire::encode_varint(u64::from(*v), buf),
        // Negative 32-bit integers are sign extended to ten bytes.
        Value::I32(v) | Value::EnumNumber(v) => wire::encode_varint(i64::from(*v) as u64, buf),
        Value::I64(v) => wire::encode_varint(*v as u64, buf),
        Value::U32(v) => wire::encode_varint(u64::from(*v), buf),
        Value::U64(v) => wire::encode_varint(*v, buf),
        Value::F32(v) => buf.put_f32_le(*v),
        Value::F64(v) => buf.put_f64_le(*v),
        Value::String(v) => wire::encode_length_delimited(v.as_bytes(), buf),
        Value::Bytes(v) => wire::encode_length_delimited(v, buf),
        Value::Message(msg) => wire::encode_length_delimited(&msg.encode_to_vec(), buf),
        // Nested lists and maps are rejected by `DynamicMessage::set`.
        Value::List(_) | Value::Map(_) => {}
    }
}
