//! This mod is meant to hold most of the code for the library's client-facing API.
mod errors;
mod options;
mod raft;
mod snapshot_store;
mod stats;
mod types;
mod wiring;

pub use errors::TransportError;
pub use options::TransportOptions;
pub use raft::ProcessError;
pub use raft::Raft;
pub use raft::SnapshotStatus;
pub use snapshot_store::SnapshotSink;
pub use snapshot_store::SnapshotStore;
pub use stats::FollowerStats;
pub use stats::LatencyStats;
pub use types::Entry;
pub use types::Message;
pub use types::MessageType;
pub use types::PeerId;
pub use types::SnapshotMessage;
pub use types::SnapshotMetadata;
pub use wiring::try_create_transport;
pub use wiring::TransportConfig;

// So peers can be configured from validated options.
pub(crate) use options::TransportOptionsValidated;
