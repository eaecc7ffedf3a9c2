//! # Wire primitives
//!
//! The protobuf binary encoding building blocks used by the message engine:
//! base-128 varints, field tags, length-delimited payloads and fixed-width scalars.
//!
//! Writing varints is delegated to [`prost::encoding`]. Reading is implemented here so
//! that a truncated buffer and an over-long varint are reported as distinct errors.
//!
//! ## References
//!
//! * [Protocol Buffers Encoding](https://protobuf.dev/programming-guides/encoding/)
use bytes::{Buf, BufMut, Bytes};

/// A varint never spans more than ten bytes (`ceil(64 / 7)`).
const MAX_VARINT_LEN: usize = 10;

/// Maximum nesting of messages and groups accepted by the decoder, the same limit prost uses.
pub const RECURSION_LIMIT: u32 = 100;

/// Errors raised while reading protobuf bytes.
///
/// All of them abort the decode call that hit them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Malformed varint: continuation bit still set after {MAX_VARINT_LEN} bytes")]
    MalformedVarint,
    #[error("Truncated input: the buffer ended in the middle of a value")]
    TruncatedInput,
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("Invalid wire type {0}")]
    InvalidWireType(u32),
    #[error("Group for field {0} is never closed")]
    UnterminatedGroup(u32),
    #[error("Invalid field key {0}")]
    InvalidKey(u64),
    #[error("Recursion limit of {RECURSION_LIMIT} nested messages reached")]
    RecursionLimitReached,
}

/// Remaining nesting budget of a decode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    recurse_count: u32,
}

impl Default for DecodeContext {
    fn default() -> Self {
        Self {
            recurse_count: RECURSION_LIMIT,
        }
    }
}

impl DecodeContext {
    /// The context for a value nested one level deeper.
    pub fn enter_recursion(&self) -> Self {
        Self {
            recurse_count: self.recurse_count.saturating_sub(1),
        }
    }

    /// Fails once the budget is spent. Call before descending into a nested value.
    pub fn limit_reached(&self) -> Result<(), DecodeError> {
        if self.recurse_count == 0 {
            Err(DecodeError::RecursionLimitReached)
        } else {
            Ok(())
        }
    }
}

/// The six wire types of the protobuf encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WireType {
    Varint = 0,
    SixtyFourBit = 1,
    LengthDelimited = 2,
    StartGroup = 3,
    EndGroup = 4,
    ThirtyTwoBit = 5,
}

impl TryFrom<u32> for WireType {
    type Error = DecodeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::SixtyFourBit),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::ThirtyTwoBit),
            other => Err(DecodeError::InvalidWireType(other)),
        }
    }
}

pub fn encode_varint(value: u64, buf: &mut impl BufMut) {
    prost::encoding::encode_varint(value, buf);
}

pub fn encoded_len_varint(value: u64) -> usize {
    prost::encoding::encoded_len_varint(value)
}

/// Reads one varint from the front of `buf`.
///
/// # Returns
///
/// * `Ok(value)` - The decoded value, `buf` advanced past it.
/// * `Err(DecodeError::TruncatedInput)` - The buffer ended before the last byte.
/// * `Err(DecodeError::MalformedVarint)` - Ten bytes were read and the continuation bit was still set.
pub fn decode_varint(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    let mut value = 0u64;

    for i in 0..MAX_VARINT_LEN {
        if !buf.has_remaining() {
            return Err(DecodeError::TruncatedInput);
        }

        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << (i * 7);

        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }

    Err(DecodeError::MalformedVarint)
}

/// Reads the key of a field.
///
/// # Returns
///
/// * `Ok(None)` - A zero key, which terminates a message.
/// * `Ok(Some((field_number, wire_type)))` - A valid key.
/// * `Err(DecodeError::InvalidKey)` - The key overflows 32 bits or names field 0.
pub fn decode_key(buf: &mut impl Buf) -> Result<Option<(u32, WireType)>, DecodeError> {
    let key = decode_varint(buf)?;
    if key == 0 {
        return Ok(None);
    }

    let tag = u32::try_from(key).map_err(|_| DecodeError::InvalidKey(key))?;
    let wire_type = WireType::try_from(tag & 7)?;
    let field_number = tag >> 3;
    if field_number == 0 {
        return Err(DecodeError::InvalidKey(key));
    }

    Ok(Some((field_number, wire_type)))
}

/// Writes the key of a field: `(field_number << 3) | wire_type`.
pub fn encode_tag(field_number: u32, wire_type: WireType, buf: &mut impl BufMut) {
    encode_varint((u64::from(field_number) << 3) | wire_type as u64, buf);
}

pub fn encode_length_delimited(payload: &[u8], buf: &mut impl BufMut) {
    encode_varint(payload.len() as u64, buf);
    buf.put_slice(payload);
}

/// Reads a varint length prefix followed by that many bytes.
pub fn decode_length_delimited(buf: &mut Bytes) -> Result<Bytes, DecodeError> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| DecodeError::TruncatedInput)?;

    if buf.remaining() < len {
        return Err(DecodeError::TruncatedInput);
    }

    Ok(buf.split_to(len))
}

pub fn decode_string(buf: &mut Bytes) -> Result<String, DecodeError> {
    let bytes = decode_length_delimited(buf)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

pub fn decode_fixed64(buf: &mut impl Buf) -> Result<u64, DecodeError> {
    if buf.remaining() < 8 {
        return Err(DecodeError::TruncatedInput);
    }
    Ok(buf.get_u64_le())
}

pub fn decode_fixed32(buf: &mut impl Buf) -> Result<u32, DecodeError> {
    if buf.remaining() < 4 {
        return Err(DecodeError::TruncatedInput);
    }
    Ok(buf.get_u32_le())
}

/// Skips a single value whose tag has already been consumed.
///
/// A start-group tag skips everything up to the matching end-group tag, including
/// nested groups. Each nested group spends one level of `ctx`.
pub fn skip_field(
    wire_type: WireType,
    field_number: u32,
    buf: &mut Bytes,
    ctx: DecodeContext,
) -> Result<(), DecodeError> {
    match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
        }
        WireType::SixtyFourBit => {
            decode_fixed64(buf)?;
        }
        WireType::ThirtyTwoBit => {
            decode_fixed32(buf)?;
        }
        WireType::LengthDelimited => {
            decode_length_delimited(buf)?;
        }
        WireType::StartGroup => {
            ctx.limit_reached()?;

            loop {
                if !buf.has_remaining() {
                    return Err(DecodeError::UnterminatedGroup(field_number));
                }

                let Some((inner_number, inner_type)) = decode_key(buf)? else {
                    return Err(DecodeError::UnterminatedGroup(field_number));
                };

                if inner_type == WireType::EndGroup {
                    if inner_number == field_number {
                        break;
                    }
                    return Err(DecodeError::UnterminatedGroup(field_number));
                }

                skip_field(inner_type, inner_number, buf, ctx.enter_recursion())?;
            }
        }
        // A stray end-group carries no payload.
        WireType::EndGroup => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn varint_bytes(value: u64) -> Bytes {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        Bytes::from(buf)
    }

    #[test]
    fn varint_boundaries_survive_a_round_trip() {
        for value in [0, 127, 128, u64::from(u32::MAX), i64::MAX as u64, u64::MAX] {
            let mut bytes = varint_bytes(value);
            assert_eq!(bytes.len(), encoded_len_varint(value));
            assert_eq!(decode_varint(&mut bytes), Ok(value));
            assert!(bytes.is_empty());
        }
    }

    #[test]
    fn varint_uses_seven_bits_per_byte() {
        assert_eq!(varint_bytes(0).as_ref(), &[0x00]);
        assert_eq!(varint_bytes(127).as_ref(), &[0x7f]);
        assert_eq!(varint_bytes(128).as_ref(), &[0x80, 0x01]);
        assert_eq!(varint_bytes(300).as_ref(), &[0xac, 0x02]);
    }

    #[test]
    fn ten_continuation_bytes_are_malformed() {
        let mut bytes = Bytes::from_static(&[0xff; 11]);
        assert_eq!(decode_varint(&mut bytes), Err(DecodeError::MalformedVarint));
    }

    #[test]
    fn varint_cut_short_is_truncated() {
        let mut bytes = Bytes::from_static(&[0x80, 0x80]);
        assert_eq!(decode_varint(&mut bytes), Err(DecodeError::TruncatedInput));
    }

    #[test]
    fn tag_packs_field_number_and_wire_type() {
        let mut buf = Vec::new();
        encode_tag(1, WireType::LengthDelimited, &mut buf);
        encode_tag(16, WireType::Varint, &mut buf);
        assert_eq!(buf, vec![0x0a, 0x80, 0x01]);
    }

    #[test]
    fn length_prefix_is_bounds_checked() {
        let mut bytes = Bytes::from_static(&[0x05, b'a', b'b']);
        assert_eq!(
            decode_length_delimited(&mut bytes),
            Err(DecodeError::TruncatedInput)
        );
    }

    #[test]
    fn strings_must_be_utf8() {
        let mut bytes = Bytes::from_static(&[0x02, 0xc3, 0x28]);
        assert_eq!(decode_string(&mut bytes), Err(DecodeError::InvalidUtf8));

        let mut bytes = Bytes::from_static(&[0x02, 0xc3, 0xa9]);
        assert_eq!(decode_string(&mut bytes).as_deref(), Ok("é"));
    }

    #[test]
    fn unknown_wire_types_are_rejected() {
        assert_matches!(WireType::try_from(6), Err(DecodeError::InvalidWireType(6)));
        assert_matches!(WireType::try_from(7), Err(DecodeError::InvalidWireType(7)));
    }

    #[test]
    fn skip_consumes_exactly_one_value() {
        // fixed64, then a trailing varint that must remain.
        let mut bytes = Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 0x2a]);
        skip_field(WireType::SixtyFourBit, 1, &mut bytes, DecodeContext::default()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x2a]);

        let mut bytes = Bytes::from_static(&[0x03, b'x', b'y', b'z', 0x2a]);
        skip_field(WireType::LengthDelimited, 1, &mut bytes, DecodeContext::default()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x2a]);
    }

    #[test]
    fn skip_group_stops_at_matching_end() {
        // Field 2 group: { field 1 varint 5 }, end group 2, then 0x2a.
        let mut bytes = Bytes::from_static(&[0x08, 0x05, 0x14, 0x2a]);
        skip_field(WireType::StartGroup, 2, &mut bytes, DecodeContext::default()).unwrap();
        assert_eq!(bytes.as_ref(), &[0x2a]);

        let mut bytes = Bytes::from_static(&[0x08, 0x05]);
        assert_eq!(
            skip_field(WireType::StartGroup, 2, &mut bytes, DecodeContext::default()),
            Err(DecodeError::UnterminatedGroup(2))
        );
    }

    #[test]
    fn keys_wider_than_32_bits_are_rejected() {
        let key = (1u64 << 32) | (1 << 3) | WireType::LengthDelimited as u64;
        let mut bytes = varint_bytes(key);
        assert_eq!(decode_key(&mut bytes), Err(DecodeError::InvalidKey(key)));
    }

    #[test]
    fn field_number_zero_is_rejected() {
        let mut bytes = Bytes::from_static(&[0x02]);
        assert_eq!(decode_key(&mut bytes), Err(DecodeError::InvalidKey(2)));

        let mut bytes = Bytes::from_static(&[0x00]);
        assert_eq!(decode_key(&mut bytes), Ok(None));

        let mut bytes = Bytes::from_static(&[0x0a]);
        assert_eq!(
            decode_key(&mut bytes),
            Ok(Some((1, WireType::LengthDelimited)))
        );
    }

    /// `depth` nested start-groups of field 100, each closed by its end-group.
    fn nested_groups(depth: usize, closed: bool) -> Bytes {
        let mut buf = Vec::new();
        for _ in 0..depth {
            encode_tag(100, WireType::StartGroup, &mut buf);
        }
        if closed {
            for _ in 0..depth {
                encode_tag(100, WireType::EndGroup, &mut buf);
            }
        }
        Bytes::from(buf)
    }

    #[test]
    fn nested_groups_are_skipped_up_to_the_recursion_limit() {
        let limit = RECURSION_LIMIT as usize;

        // The outer start tag is consumed by the caller.
        let mut bytes = nested_groups(limit, true).slice(2..);
        skip_field(WireType::StartGroup, 100, &mut bytes, DecodeContext::default()).unwrap();
        assert!(bytes.is_empty());

        let mut bytes = nested_groups(limit + 1, false).slice(2..);
        assert_eq!(
            skip_field(WireType::StartGroup, 100, &mut bytes, DecodeContext::default()),
            Err(DecodeError::RecursionLimitReached)
        );
    }

    #[test]
    fn context_budget_runs_out() {
        let mut ctx = DecodeContext::default();
        for _ in 0..RECURSION_LIMIT {
            assert_eq!(ctx.limit_reached(), Ok(()));
            ctx = ctx.enter_recursion();
        }
        assert_eq!(ctx.limit_reached(), Err(DecodeError::RecursionLimitReached));
        assert_eq!(ctx.enter_recursion(), ctx);
    }
}
