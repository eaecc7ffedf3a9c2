//! Descriptor-driven protobuf decoding.
use super::{DynamicMessage, MapKey, Value};
use crate::schema::{FieldDescriptor, Kind, MessageDescriptor, UNRECOGNIZED};
use crate::wire::{self, DecodeContext, DecodeError, WireType};
use bytes::{Buf, Bytes};
use std::collections::BTreeMap;

impl DynamicMessage {
    /// Decodes a message of type `desc` from the whole of `buf`.
    ///
    /// Unknown fields, and known fields encoded with an unexpected wire type, are skipped.
    /// Decoding stops early at a zero tag or at an end-group tag. Messages and groups nested
    /// deeper than [`wire::RECURSION_LIMIT`] fail with `RecursionLimitReached`.
    ///
    /// # Returns
    ///
    /// * `Ok(DynamicMessage)` - The decoded message; fields absent from the input hold their defaults.
    /// * `Err(DecodeError)` - The input is not valid protobuf. No partial message is returned.
    pub fn decode(desc: MessageDescriptor, mut buf: impl Buf) -> Result<Self, DecodeError> {
        let mut bytes = buf.copy_to_bytes(buf.remaining());
        let mut message = Self::new(desc);
        message.merge(&mut bytes, DecodeContext::default())?;
        Ok(message)
    }

    /// Decodes a message preceded by its varint length, as written by
    /// [`DynamicMessage::encode_length_delimited_to_vec`].
    pub fn decode_length_delimited(
        desc: MessageDescriptor,
        mut buf: impl Buf,
    ) -> Result<Self, DecodeError> {
        let mut bytes = buf.copy_to_bytes(buf.remaining());
        let body = wire::decode_length_delimited(&mut bytes)?;
        Self::decode(desc, body)
    }

    fn merge(&mut self, buf: &mut Bytes, ctx: DecodeContext) -> Result<(), DecodeError> {
        while buf.has_remaining() {
            let Some((number, wire_type)) = wire::decode_key(buf)? else {
                break;
            };
            if wire_type == WireType::EndGroup {
                break;
            }

            match self.desc.get_field(number) {
                Some(field) if accepts(&field, wire_type) => {
                    self.merge_field(&field, wire_type, buf, ctx)?
                }
                _ => wire::skip_field(wire_type, number, buf, ctx)?,
            }
        }

        Ok(())
    }

    fn merge_field(
        &mut self,
        field: &FieldDescriptor,
        wire_type: WireType,
        buf: &mut Bytes,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        let kind = field.kind();

        if let Kind::Map { key, value } = &kind {
            let mut entry = wire::decode_length_delimited(buf)?;
            let (entry_key, entry_value) = decode_map_entry(key, value, &mut entry, ctx)?;
            if let Some(Value::Map(entries)) = self.slot_mut(field) {
                entries.insert(entry_key, entry_value);
            }
            return Ok(());
        }

        if field.is_repeated() {
            let mut items = Vec::new();
            if wire_type == WireType::LengthDelimited && kind.is_packable() {
                let mut packed = wire::decode_length_delimited(buf)?;
                while packed.has_remaining() {
                    items.push(decode_value(&kind, &mut packed, ctx)?);
                }
            } else {
                items.push(decode_value(&kind, buf, ctx)?);
            }

            if let Some(Value::List(list)) = self.slot_mut(field) {
                list.extend(items);
            }
            return Ok(());
        }

        let value = decode_value(&kind, buf, ctx)?;
        self.put(field, value);
        Ok(())
    }
}

fn accepts(field: &FieldDescriptor, wire_type: WireType) -> bool {
    let kind = field.kind();
    wire_type == kind.wire_type()
        || (field.is_repeated() && kind.is_packable() && wire_type == WireType::LengthDelimited)
}

fn decode_map_entry(
    key_kind: &Kind,
    value_kind: &Kind,
    buf: &mut Bytes,
    ctx: DecodeContext,
) -> Result<(MapKey, Value), DecodeError> {
    let mut key = None;
    let mut value = None;

    while buf.has_remaining() {
        let Some((number, wire_type)) = wire::decode_key(buf)? else {
            break;
        };
        if wire_type == WireType::EndGroup {
            break;
        }

        match number {
            1 if wire_type == key_kind.wire_type() => {
                key = Some(decode_value(key_kind, buf, ctx)?)
            }
            2 if wire_type == value_kind.wire_type() => {
                value = Some(decode_value(value_kind, buf, ctx)?)
            }
            number => wire::skip_field(wire_type, number, buf, ctx)?,
        }
    }

    let key = key
        .and_then(MapKey::from_value)
        .or_else(|| MapKey::default_for(key_kind))
        .unwrap_or_else(|| MapKey::String(String::new()));
    let value = value.unwrap_or_else(|| Value::default_for(value_kind));

    Ok((key, value))
}

/// Reads the payload of a single value whose tag has been consumed.
fn decode_value(
    kind: &Kind,
    buf: &mut Bytes,
    ctx: DecodeContext,
) -> Result<Value, DecodeError> {
    Ok(match kind {
        Kind::Int32 => Value::I32(wire::decode_varint(buf)? as i32),
        Kind::Int64 => Value::I64(wire::decode_varint(buf)? as i64),
        Kind::Uint32 => Value::U32(wire::decode_varint(buf)? as u32),
        Kind::Uint64 => Value::U64(wire::decode_varint(buf)?),
        Kind::Bool => Value::Bool(wire::decode_varint(buf)? != 0),
        Kind::Enum(desc) => {
            let number = wire::decode_varint(buf)? as i32;
            if desc.get_value(number).is_some() {
                Value::EnumNumber(number)
            } else {
                Value::EnumNumber(UNRECOGNIZED)
            }
        }
        Kind::Double => Value::F64(f64::from_bits(wire::decode_fixed64(buf)?)),
        Kind::Float => Value::F32(f32::from_bits(wire::decode_fixed32(buf)?)),
        Kind::String => Value::String(wire::decode_string(buf)?),
        Kind::Bytes => Value::Bytes(wire::decode_length_delimited(buf)?),
        Kind::Message(desc) => {
            ctx.limit_reached()?;
            let mut body = wire::decode_length_delimited(buf)?;
            let mut message = DynamicMessage::new(desc.clone());
            message.merge(&mut body, ctx.enter_recursion())?;
            Value::Message(message)
        }
        Kind::Map { .. } => Value::Map(BTreeMap::new()),
    })
}
