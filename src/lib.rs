mod api;
mod codec;
mod peer;
mod server;
#[cfg(test)]
mod test_utils;
mod transport;
mod grpc {
    include!("../generated/rafthttp.rs");
}

pub use api::try_create_transport;
pub use api::Entry;
pub use api::FollowerStats;
pub use api::LatencyStats;
pub use api::Message;
pub use api::MessageType;
pub use api::PeerId;
pub use api::ProcessError;
pub use api::Raft;
pub use api::SnapshotMessage;
pub use api::SnapshotMetadata;
pub use api::SnapshotSink;
pub use api::SnapshotStatus;
pub use api::SnapshotStore;
pub use api::TransportConfig;
pub use api::TransportError;
pub use api::TransportOptions;
pub use transport::Transport;
// Part of the `Raft` trait signature.
pub use tokio_util::sync::CancellationToken;

// `crate::{root_mod}` holds no code, only `mod` and `pub use` statements. Modules are never `pub`;
// types are exported one by one so each root_mod can be organized freely.
