use crate::api::PeerId;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Illegal options for configuring transport: {0}")]
    IllegalOptions(String),
    #[error("Failed to bind listener")]
    Bind(#[source] io::Error),
    #[error("Local member ID must be non-zero")]
    InvalidLocalId,
    #[error("Invalid peer ID {0}")]
    InvalidPeerId(PeerId),
    #[error("Peer {0} already exists")]
    PeerExists(PeerId),
    #[error("Peer {0} not found")]
    PeerNotFound(PeerId),
    #[error("Peer {0} does not recognize this member; it was likely removed from the cluster")]
    MemberRemoved(PeerId),
    #[error("Peer {0} belongs to a different cluster")]
    ClusterMismatch(PeerId),
}
