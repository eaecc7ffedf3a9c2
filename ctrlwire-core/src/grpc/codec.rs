//! # DynamicMessage codec
//!
//! Implements `tonic::codec::Codec` so that `tonic` can carry [`DynamicMessage`] values
//! without generated structs.
//!
//! * **Encoder**: writes the message with the descriptor-driven encoder.
//! * **Decoder**: reads the body with the descriptor the codec was created for.
//!
//! The same codec serves both sides of a call: a client binds it to the method output,
//! a server to the method input.
use crate::message::DynamicMessage;
use crate::schema::MessageDescriptor;
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A codec whose decoder produces messages of a single type.
#[derive(Debug, Clone)]
pub struct DynamicCodec {
    decode_desc: MessageDescriptor,
}

impl DynamicCodec {
    /// Creates a codec that decodes incoming bodies as `decode_desc`.
    pub fn new(decode_desc: MessageDescriptor) -> Self {
        Self { decode_desc }
    }
}

impl Codec for DynamicCodec {
    type Encode = DynamicMessage;
    type Decode = DynamicMessage;

    type Encoder = DynamicEncoder;
    type Decoder = DynamicDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        DynamicEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        DynamicDecoder(self.decode_desc.clone())
    }
}

/// Encodes a message with its own descriptor.
#[derive(Debug)]
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let msg = DynamicMessage::decode(self.0.clone(), src).map_err(|e| {
            Status::internal(format!(
                "Failed to decode '{}' from Protobuf bytes: {e}",
                self.0.full_name()
            ))
        })?;

        Ok(Some(msg))
    }
}
