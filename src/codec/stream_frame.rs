//! Framing for long-lived streams. gRPC already length-prefixes each `StreamFrame`, so this
//! module only decides what goes into a frame.
//!
//! The general class (`Message`) always carries full messages. The optimized class (`MsgAppV2`)
//! carries the append messages a leader sends to a follower: once a full append has gone out on
//! a connection, every following append that picks up exactly where the previous one ended is
//! sent as just `{entries, commit}`. Both ends track the same (term, next index) state, which is
//! reset whenever a connection is replaced.

use crate::api::{Message, MessageType, PeerId};
use crate::codec::message::{decode_entries, decode_message, encode_entries, encode_message, DecodeError};
use crate::grpc::{stream_frame, ProtoAppEntries, ProtoLinkHeartbeat, ProtoStreamType, StreamFrame};
use std::fmt;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum StreamType {
    /// General messages: votes, heartbeats, responses.
    Message,
    /// Appends from the leader, with the compact encoding.
    MsgAppV2,
}

impl StreamType {
    pub(crate) fn to_proto(self) -> ProtoStreamType {
        match self {
            StreamType::Message => ProtoStreamType::StreamTypeMessage,
            StreamType::MsgAppV2 => ProtoStreamType::StreamTypeMsgAppV2,
        }
    }

    pub(crate) fn from_proto(raw: i32) -> Result<Self, DecodeError> {
        match ProtoStreamType::from_i32(raw) {
            Some(ProtoStreamType::StreamTypeMessage) => Ok(StreamType::Message),
            Some(ProtoStreamType::StreamTypeMsgAppV2) => Ok(StreamType::MsgAppV2),
            Some(ProtoStreamType::StreamTypeUnspecified) | None => Err(DecodeError::UnknownStreamType(raw)),
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Message => write!(f, "stream Message"),
            StreamType::MsgAppV2 => write!(f, "stream MsgApp v2"),
        }
    }
}

/// Position after the last append seen on a connection.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct AppendCursor {
    term: u64,
    next_index: u64,
    from: PeerId,
    to: PeerId,
}

impl AppendCursor {
    fn after(message: &Message) -> Self {
        AppendCursor {
            term: message.term,
            next_index: message.index + message.entries.len() as u64,
            from: message.from,
            to: message.to,
        }
    }

    fn continues_with(&self, message: &Message) -> bool {
        message.is_append()
            && message.term == self.term
            && message.log_term == self.term
            && message.index == self.next_index
            && message.from == self.from
            && message.to == self.to
            && !message.reject
            && message.reject_hint == 0
            && message.snapshot.is_none()
    }
}

pub(crate) fn heartbeat_frame() -> StreamFrame {
    StreamFrame {
        frame: Some(stream_frame::Frame::Heartbeat(ProtoLinkHeartbeat {})),
    }
}

pub(crate) struct StreamEncoder {
    stream_type: StreamType,
    cursor: Option<AppendCursor>,
}

impl StreamEncoder {
    pub(crate) fn new(stream_type: StreamType) -> Self {
        StreamEncoder {
            stream_type,
            cursor: None,
        }
    }

    pub(crate) fn encode(&mut self, message: &Message) -> StreamFrame {
        if self.stream_type == StreamType::MsgAppV2 {
            if let Some(cursor) = self.cursor.as_mut() {
                if cursor.continues_with(message) {
                    cursor.next_index += message.entries.len() as u64;
                    return StreamFrame {
                        frame: Some(stream_frame::Frame::AppEntries(ProtoAppEntries {
                            entries: encode_entries(&message.entries),
                            commit: message.commit,
                        })),
                    };
                }
            }
            if message.is_append() {
                self.cursor.replace(AppendCursor::after(message));
            }
        }

        StreamFrame {
            frame: Some(stream_frame::Frame::Message(encode_message(message))),
        }
    }
}

/// What a stream reader gets out of one frame.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum DecodedFrame {
    Heartbeat,
    Message(Message),
}

pub(crate) struct StreamDecoder {
    stream_type: StreamType,
    cursor: Option<AppendCursor>,
}

impl StreamDecoder {
    pub(crate) fn new(stream_type: StreamType) -> Self {
        StreamDecoder {
            stream_type,
            cursor: None,
        }
    }

    pub(crate) fn decode(&mut self, frame: StreamFrame) -> Result<DecodedFrame, DecodeError> {
        match frame.frame {
            None => Err(DecodeError::EmptyFrame),
            Some(stream_frame::Frame::Heartbeat(_)) => Ok(DecodedFrame::Heartbeat),
            Some(stream_frame::Frame::Message(proto)) => {
                let message = decode_message(proto)?;
                if self.stream_type == StreamType::MsgAppV2 && message.is_append() {
                    self.cursor.replace(AppendCursor::after(&message));
                }
                Ok(DecodedFrame::Message(message))
            }
            Some(stream_frame::Frame::AppEntries(app_entries)) => {
                let cursor = match (self.stream_type, self.cursor.as_mut()) {
                    (StreamType::MsgAppV2, Some(cursor)) => cursor,
                    _ => return Err(DecodeError::OrphanAppEntries),
                };

                let entries = decode_entries(app_entries.entries);
                let mut message = Message::new(MessageType::Append, cursor.from, cursor.to);
                message.term = cursor.term;
                message.log_term = cursor.term;
                message.index = cursor.next_index;
                message.commit = app_entries.commit;
                cursor.next_index += entries.len() as u64;
                message.entries = entries;

                Ok(DecodedFrame::Message(message))
            }
        }
    }
}
