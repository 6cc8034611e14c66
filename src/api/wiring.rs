use crate::api::options::TransportOptionsValidated;
use crate::api::{PeerId, Raft, SnapshotStore, TransportError, TransportOptions};
use crate::transport::{Transport, TransportParts};
use std::convert::TryFrom;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct TransportConfig {
    pub local_id: u64,
    pub cluster_id: u64,
    // Port 0 binds an ephemeral port; see `Transport::local_addr()`.
    pub listen_addr: SocketAddr,
    pub raft: Arc<dyn Raft>,
    pub snapshot_store: Arc<dyn SnapshotStore>,
    pub info_logger: slog::Logger,
    pub options: TransportOptions,
}

/// Binds the listener and starts serving. Peers are added afterwards with
/// `Transport::add_peer()`.
pub async fn try_create_transport(config: TransportConfig) -> Result<Transport, TransportError> {
    let options = TransportOptionsValidated::try_from(config.options)
        .map_err(|e| TransportError::IllegalOptions(e.to_string()))?;

    Transport::start(TransportParts {
        logger: config.info_logger,
        local_id: PeerId::new(config.local_id),
        cluster_id: config.cluster_id,
        listen_addr: config.listen_addr,
        raft: config.raft,
        snapshot_store: config.snapshot_store,
        options,
    })
    .await
}
