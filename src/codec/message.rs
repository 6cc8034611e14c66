use crate::api::{Entry, Message, MessageType, PeerId, SnapshotMetadata};
use crate::grpc::{ProtoEntry, ProtoMessage, ProtoMessageType, ProtoSnapshotMetadata};
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub(crate) enum DecodeError {
    #[error("unknown message type {0}")]
    UnknownMessageType(i32),
    #[error("unknown stream type {0}")]
    UnknownStreamType(i32),
    #[error("stream frame carries no payload")]
    EmptyFrame,
    #[error("compact append frame received before any full append on this connection")]
    OrphanAppEntries,
    #[error("snapshot upload did not start with a header")]
    MissingSnapshotHeader,
}

pub(crate) fn encode_message(message: &Message) -> ProtoMessage {
    ProtoMessage {
        msg_type: encode_message_type(message.msg_type) as i32,
        to: message.to.as_u64(),
        from: message.from.as_u64(),
        term: message.term,
        log_term: message.log_term,
        index: message.index,
        entries: encode_entries(&message.entries),
        commit: message.commit,
        snapshot: message.snapshot.map(|md| ProtoSnapshotMetadata {
            index: md.index,
            term: md.term,
        }),
        reject: message.reject,
        reject_hint: message.reject_hint,
    }
}

pub(crate) fn decode_message(proto: ProtoMessage) -> Result<Message, DecodeError> {
    let msg_type = decode_message_type(proto.msg_type)?;

    Ok(Message {
        msg_type,
        to: PeerId::new(proto.to),
        from: PeerId::new(proto.from),
        term: proto.term,
        log_term: proto.log_term,
        index: proto.index,
        entries: decode_entries(proto.entries),
        commit: proto.commit,
        snapshot: proto.snapshot.map(|md| SnapshotMetadata {
            index: md.index,
            term: md.term,
        }),
        reject: proto.reject,
        reject_hint: proto.reject_hint,
    })
}

pub(crate) fn encode_entries(entries: &[Entry]) -> Vec<ProtoEntry> {
    entries
        .iter()
        .map(|entry| ProtoEntry {
            term: entry.term,
            index: entry.index,
            data: entry.data.to_vec(),
        })
        .collect()
}

pub(crate) fn decode_entries(entries: Vec<ProtoEntry>) -> Vec<Entry> {
    entries
        .into_iter()
        .map(|entry| Entry {
            term: entry.term,
            index: entry.index,
            data: Bytes::from(entry.data),
        })
        .collect()
}

fn encode_message_type(msg_type: MessageType) -> ProtoMessageType {
    match msg_type {
        MessageType::Hup => ProtoMessageType::MsgHup,
        MessageType::Beat => ProtoMessageType::MsgBeat,
        MessageType::Proposal => ProtoMessageType::MsgProp,
        MessageType::Append => ProtoMessageType::MsgApp,
        MessageType::AppendResponse => ProtoMessageType::MsgAppResp,
        MessageType::Vote => ProtoMessageType::MsgVote,
        MessageType::VoteResponse => ProtoMessageType::MsgVoteResp,
        MessageType::Snapshot => ProtoMessageType::MsgSnap,
        MessageType::Heartbeat => ProtoMessageType::MsgHeartbeat,
        MessageType::HeartbeatResponse => ProtoMessageType::MsgHeartbeatResp,
        MessageType::Unreachable => ProtoMessageType::MsgUnreachable,
        MessageType::SnapshotStatus => ProtoMessageType::MsgSnapStatus,
        MessageType::CheckQuorum => ProtoMessageType::MsgCheckQuorum,
        MessageType::TransferLeader => ProtoMessageType::MsgTransferLeader,
        MessageType::TimeoutNow => ProtoMessageType::MsgTimeoutNow,
    }
}

fn decode_message_type(raw: i32) -> Result<MessageType, DecodeError> {
    let proto_type = ProtoMessageType::from_i32(raw).ok_or(DecodeError::UnknownMessageType(raw))?;

    let msg_type = match proto_type {
        ProtoMessageType::MsgUnspecified => return Err(DecodeError::UnknownMessageType(raw)),
        ProtoMessageType::MsgHup => MessageType::Hup,
        ProtoMessageType::MsgBeat => MessageType::Beat,
        ProtoMessageType::MsgProp => MessageType::Proposal,
        ProtoMessageType::MsgApp => MessageType::Append,
        ProtoMessageType::MsgAppResp => MessageType::AppendResponse,
        ProtoMessageType::MsgVote => MessageType::Vote,
        ProtoMessageType::MsgVoteResp => MessageType::VoteResponse,
        ProtoMessageType::MsgSnap => MessageType::Snapshot,
        ProtoMessageType::MsgHeartbeat => MessageType::Heartbeat,
        ProtoMessageType::MsgHeartbeatResp => MessageType::HeartbeatResponse,
        ProtoMessageType::MsgUnreachable => MessageType::Unreachable,
        ProtoMessageType::MsgSnapStatus => MessageType::SnapshotStatus,
        ProtoMessageType::MsgCheckQuorum => MessageType::CheckQuorum,
        ProtoMessageType::MsgTransferLeader => MessageType::TransferLeader,
        ProtoMessageType::MsgTimeoutNow => MessageType::TimeoutNow,
    };

    Ok(msg_type)
}
