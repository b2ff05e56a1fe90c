//! `tonic` codec that puts uniform serde values on the wire as protobuf.
//!
//! The uniform types are the proto3 JSON form of `a2a.v1`, so each message
//! is transcoded through a [`DynamicMessage`] of the method's descriptor:
//! JSON value in, protobuf bytes out, and the reverse for responses.

use std::marker::PhantomData;

use prost::Message as _;
use prost_reflect::{DeserializeOptions, DynamicMessage, MessageDescriptor, ReflectMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder};
use tonic::Status;

/// Encodes `E` as `encode`, decodes `D` from `decode`.
#[derive(Debug)]
pub struct ProtoCodec<E, D> {
    encode: MessageDescriptor,
    decode: MessageDescriptor,
    _marker: PhantomData<fn(E) -> D>,
}

impl<E, D> ProtoCodec<E, D> {
    pub fn new(encode: MessageDescriptor, decode: MessageDescriptor) -> Self {
        Self {
            encode,
            decode,
            _marker: PhantomData,
        }
    }
}

impl<E, D> Codec for ProtoCodec<E, D>
where
    E: Serialize + Send + 'static,
    D: DeserializeOwned + Send + 'static,
{
    type Encode = E;
    type Decode = D;
    type Encoder = ProtoEncoder<E>;
    type Decoder = ProtoDecoder<D>;

    fn encoder(&mut self) -> Self::Encoder {
        ProtoEncoder(self.encode.clone(), PhantomData)
    }

    fn decoder(&mut self) -> Self::Decoder {
        ProtoDecoder(self.decode.clone(), PhantomData)
    }
}

#[derive(Debug)]
pub struct ProtoEncoder<E>(MessageDescriptor, PhantomData<fn(E)>);

impl<E: Serialize> Encoder for ProtoEncoder<E> {
    type Item = E;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        to_message(self.0.clone(), &item)?
            .encode(dst)
            .map_err(|e| Status::internal(format!("failed to encode {}: {e}", self.0.full_name())))
    }
}

#[derive(Debug)]
pub struct ProtoDecoder<D>(MessageDescriptor, PhantomData<fn() -> D>);

impl<D: DeserializeOwned> Decoder for ProtoDecoder<D> {
    type Item = D;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let message = DynamicMessage::decode(self.0.clone(), src).map_err(|e| {
            Status::internal(format!("failed to decode {}: {e}", self.0.full_name()))
        })?;
        from_message(&message).map(Some)
    }
}

/// Uniform value to a message of `descriptor`.
///
/// Unknown JSON keys are ignored so newer uniform fields do not break older
/// schemas.
pub(crate) fn to_message<T: Serialize>(
    descriptor: MessageDescriptor,
    value: &T,
) -> Result<DynamicMessage, Status> {
    let name = descriptor.full_name().to_string();
    let json = serde_json::to_value(value)
        .map_err(|e| Status::internal(format!("failed to serialize {name}: {e}")))?;
    let options = DeserializeOptions::new().deny_unknown_fields(false);
    DynamicMessage::deserialize_with_options(descriptor, json, &options)
        .map_err(|e| Status::invalid_argument(format!("request does not fit {name}: {e}")))
}

/// Message back to its uniform value.
pub(crate) fn from_message<T: DeserializeOwned>(message: &DynamicMessage) -> Result<T, Status> {
    let name = message.descriptor().full_name().to_string();
    let json = serde_json::to_value(message)
        .map_err(|e| Status::internal(format!("failed to render {name}: {e}")))?;
    serde_json::from_value(json)
        .map_err(|e| Status::internal(format!("unexpected {name} from agent: {e}")))
}
