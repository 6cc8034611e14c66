mod registry;
mod transport;

pub(crate) use registry::PeerRegistry;
pub use transport::Transport;
pub(crate) use transport::TransportParts;
