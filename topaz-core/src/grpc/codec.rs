//! # DynamicMessage Codec
//!
//! This module implements `tonic::codec::Codec` so that `tonic` can transport
//! `prost_reflect::DynamicMessage` directly, bypassing the need for generated Rust structs.
//!
//! ## How it works
//!
//! 1. **Encoder**: Serializes the `DynamicMessage` into the gRPC byte buffer.
//! 2. **Decoder**: Reads raw bytes from the wire and merges them into a new `DynamicMessage`
//!    of the output `MessageDescriptor`.
//!
//! The decoded message keeps its descriptor, so its fully qualified type name travels with it
//! up to the [`crate::registry::MessageRegistry`].
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// A Codec moving `DynamicMessage`s to and from Protobuf binary format.
pub struct DynamicCodec {
    /// Schema for the output message.
    res_desc: MessageDescriptor,
}

impl DynamicCodec {
    /// Creates a new `DynamicCodec`.
    ///
    /// # Arguments
    /// * `res_desc` - Descriptor for the response message type.
    pub fn new(res_desc: MessageDescriptor) -> Self {
        Self { res_desc }
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
        DynamicDecoder(self.res_desc.clone())
    }
}

/// Responsible for encoding a `DynamicMessage` into Protobuf bytes.
pub struct DynamicEncoder;

impl Encoder for DynamicEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode(dst)
            .map_err(|e| Status::internal(format!("Failed to encode Protobuf message: {}", e)))
    }
}

/// Responsible for decoding Protobuf bytes into a `DynamicMessage`.
pub struct DynamicDecoder(MessageDescriptor);

impl Decoder for DynamicDecoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src)
            .map_err(|e| Status::internal(format!("Failed to decode Protobuf bytes: {}", e)))?;

        Ok(Some(msg))
    }
}
