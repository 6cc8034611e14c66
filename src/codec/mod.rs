//! Conversions between the transport's message types and their wire representation.
mod message;
mod stream_frame;

pub(crate) use message::decode_message;
pub(crate) use message::encode_message;
pub(crate) use message::DecodeError;
pub(crate) use stream_frame::heartbeat_frame;
pub(crate) use stream_frame::DecodedFrame;
pub(crate) use stream_frame::StreamDecoder;
pub(crate) use stream_frame::StreamEncoder;
pub(crate) use stream_frame::StreamType;
