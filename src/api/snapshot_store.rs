use crate::api::types::SnapshotMetadata;
use std::io;
use tokio::io::AsyncWrite;

pub type SnapshotSink = Box<dyn AsyncWrite + Send + Unpin>;

/// SnapshotStore persists snapshots received from a remote leader. The sender side gets its
/// payload from `SnapshotMessage::reader` instead, so this trait only covers the receiving half.
#[async_trait::async_trait]
pub trait SnapshotStore: Send + Sync + 'static {
    /// Open a sink for an incoming snapshot. The transport writes exactly `total_size` bytes and
    /// then shuts the sink down.
    async fn create_sink(&self, metadata: SnapshotMetadata, total_size: u64) -> io::Result<SnapshotSink>;
}
