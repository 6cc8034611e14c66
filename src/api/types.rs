use bytes::Bytes;
use std::fmt;
use tokio::io::AsyncRead;
use tokio::sync::oneshot;

/// PeerId identifies a member of the cluster. Zero is never a valid member ID.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct PeerId(u64);

impl PeerId {
    pub fn new(id: u64) -> Self {
        PeerId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub(crate) fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageType {
    Hup,
    Beat,
    Proposal,
    Append,
    AppendResponse,
    Vote,
    VoteResponse,
    Snapshot,
    Heartbeat,
    HeartbeatResponse,
    Unreachable,
    SnapshotStatus,
    CheckQuorum,
    TransferLeader,
    TimeoutNow,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Entry {
    pub term: u64,
    pub index: u64,
    pub data: Bytes,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SnapshotMetadata {
    pub index: u64,
    pub term: u64,
}

/// Message is a unit of consensus protocol communication. The transport never mutates a message
/// in transit; it is either delivered once or dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    pub msg_type: MessageType,
    pub to: PeerId,
    pub from: PeerId,
    pub term: u64,
    pub log_term: u64,
    pub index: u64,
    pub entries: Vec<Entry>,
    pub commit: u64,
    pub snapshot: Option<SnapshotMetadata>,
    pub reject: bool,
    pub reject_hint: u64,
}

impl Message {
    /// A message with only the routing fields set.
    pub fn new(msg_type: MessageType, from: PeerId, to: PeerId) -> Self {
        Message {
            msg_type,
            to,
            from,
            term: 0,
            log_term: 0,
            index: 0,
            entries: vec![],
            commit: 0,
            snapshot: None,
            reject: false,
            reject_hint: 0,
        }
    }

    pub(crate) fn is_append(&self) -> bool {
        self.msg_type == MessageType::Append
    }

    pub(crate) fn is_snapshot(&self) -> bool {
        self.msg_type == MessageType::Snapshot
    }

    pub(crate) fn is_proposal(&self) -> bool {
        self.msg_type == MessageType::Proposal
    }
}

/// SnapshotMessage is a snapshot notification plus the snapshot payload produced by snapshot
/// storage. The payload is streamed to the remote; the transport does not interpret it.
pub struct SnapshotMessage {
    pub message: Message,
    pub total_size: u64,
    pub reader: Box<dyn AsyncRead + Send + Unpin>,
    /// Receives `true` once the remote has stored the snapshot, `false` on any failure.
    pub close_notify: Option<oneshot::Sender<bool>>,
}

impl SnapshotMessage {
    pub fn new(message: Message, total_size: u64, reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        SnapshotMessage {
            message,
            total_size,
            reader,
            close_notify: None,
        }
    }

    /// Returns a receiver that resolves with the outcome of the transfer.
    pub fn close_notify(&mut self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        self.close_notify.replace(tx);
        rx
    }

    pub(crate) fn notify(&mut self, success: bool) {
        if let Some(tx) = self.close_notify.take() {
            let _ = tx.send(success);
        }
    }
}

impl fmt::Debug for SnapshotMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotMessage")
            .field("message", &self.message)
            .field("total_size", &self.total_size)
            .finish()
    }
}
