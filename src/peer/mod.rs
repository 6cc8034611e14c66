mod errors;
mod follower_stats;
mod outgoing_conn;
mod peer;
mod peer_status;
mod pipeline;
mod snapshot_sender;
mod stream_reader;
mod stream_writer;
mod url_picker;

pub(crate) use outgoing_conn::OutgoingConn;
pub(crate) use peer::Peer;
pub(crate) use peer::PeerConfig;
