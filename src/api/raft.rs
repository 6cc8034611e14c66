use crate::api::types::{Message, PeerId};
use tokio_util::sync::CancellationToken;

/// Raft is the consensus core as seen by the transport. Inbound messages are handed to
/// `process()`; failed outbound deliveries are reported back so the core can retry on its own
/// schedule.
#[async_trait::async_trait]
pub trait Raft: Send + Sync + 'static {
    /// Process an inbound message. `ctx` is cancelled when the peer the message came from is
    /// stopped; implementations should give up waiting at that point.
    async fn process(&self, ctx: &CancellationToken, message: Message) -> Result<(), ProcessError>;

    /// The message to `id` could not be delivered.
    fn report_unreachable(&self, id: PeerId);

    /// Outcome of a snapshot transfer to `id`.
    fn report_snapshot(&self, id: PeerId, status: SnapshotStatus);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SnapshotStatus {
    Finish,
    Failure,
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("message from removed member {0}")]
    RemovedMember(PeerId),
    #[error("processing cancelled")]
    Cancelled,
    #[error("consensus core stopped")]
    Stopped,
    #[error("{0}")]
    Other(String),
}
