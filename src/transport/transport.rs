use crate::api::{
    FollowerStats, Message, PeerId, Raft, SnapshotMessage, SnapshotStatus, SnapshotStore, TransportError,
    TransportOptionsValidated,
};
use crate::peer::{Peer, PeerConfig};
use crate::server::{self, RpcServer, RpcServerShutdownHandle};
use crate::transport::PeerRegistry;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Transport connects the local member to the rest of the cluster. It serves the endpoints remote
/// peers dial and owns one `Peer` per remote member.
pub struct Transport {
    logger: slog::Logger,
    local_id: PeerId,
    cluster_id: u64,
    raft: Arc<dyn Raft>,
    options: TransportOptionsValidated,
    peers: PeerRegistry,
    local_addr: SocketAddr,
    errorc: mpsc::UnboundedSender<TransportError>,
    errors: Mutex<Option<mpsc::UnboundedReceiver<TransportError>>>,
    ctx: CancellationToken,
    server: Mutex<Option<(RpcServerShutdownHandle, JoinHandle<()>)>>,
}

pub(crate) struct TransportParts {
    pub(crate) logger: slog::Logger,
    pub(crate) local_id: PeerId,
    pub(crate) cluster_id: u64,
    pub(crate) listen_addr: SocketAddr,
    pub(crate) raft: Arc<dyn Raft>,
    pub(crate) snapshot_store: Arc<dyn SnapshotStore>,
    pub(crate) options: TransportOptionsValidated,
}

impl Transport {
    pub(crate) async fn start(parts: TransportParts) -> Result<Self, TransportError> {
        if parts.local_id.is_none() {
            return Err(TransportError::InvalidLocalId);
        }
        let logger = parts.logger.new(slog::o!("LocalPeerId" => parts.local_id.to_string()));

        let listener = TcpListener::bind(parts.listen_addr)
            .await
            .map_err(TransportError::Bind)?;
        let local_addr = listener.local_addr().map_err(TransportError::Bind)?;

        let peers = PeerRegistry::default();
        let ctx = CancellationToken::new();
        let rpc_server = RpcServer::new(
            logger.clone(),
            parts.local_id,
            parts.cluster_id,
            peers.clone(),
            parts.raft.clone(),
            parts.snapshot_store,
            ctx.clone(),
        );
        let (shutdown_handle, shutdown_signal) = server::shutdown_signal();
        let server_task = tokio::spawn(rpc_server.run(listener, shutdown_signal));

        let (errorc, errors) = mpsc::unbounded_channel();
        slog::info!(logger, "Started transport for cluster {:x} on {}", parts.cluster_id, local_addr);

        Ok(Transport {
            logger,
            local_id: parts.local_id,
            cluster_id: parts.cluster_id,
            raft: parts.raft,
            options: parts.options,
            peers,
            local_addr,
            errorc,
            errors: Mutex::new(Some(errors)),
            ctx,
            server: Mutex::new(Some((shutdown_handle, server_task))),
        })
    }

    /// The address the server is bound to, which differs from the configured one when that used
    /// port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The URL remote peers should use to reach this member.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Errors that need an operator, such as this member having been removed from the cluster.
    /// The receiver can be taken once.
    pub fn errors(&self) -> Option<mpsc::UnboundedReceiver<TransportError>> {
        self.errors.lock().expect("Transport.errors() mutex guard poison").take()
    }

    /// Queues each message for its peer without blocking. Undeliverable messages are reported
    /// through `Raft::report_unreachable()` rather than returned.
    pub fn send(&self, messages: Vec<Message>) {
        for message in messages {
            if message.to.is_none() {
                continue;
            }
            match self.peers.get(message.to) {
                Some(peer) => peer.send(message),
                None => slog::debug!(
                    self.logger,
                    "Ignored {:?} to unknown peer {}",
                    message.msg_type,
                    message.to
                ),
            }
        }
    }

    pub fn send_snapshot(&self, mut snapshot: SnapshotMessage) {
        let to = snapshot.message.to;
        match self.peers.get(to) {
            Some(peer) => peer.send_snap(snapshot),
            None => {
                slog::warn!(self.logger, "Cannot send snapshot to unknown peer {}", to);
                self.raft.report_snapshot(to, SnapshotStatus::Failure);
                snapshot.notify(false);
            }
        }
    }

    pub fn add_peer(&self, id: PeerId, urls: Vec<String>) -> Result<(), TransportError> {
        if id.is_none() || id == self.local_id {
            return Err(TransportError::InvalidPeerId(id));
        }
        if self.peers.contains(id) {
            return Err(TransportError::PeerExists(id));
        }

        let peer = Arc::new(Peer::start(PeerConfig {
            logger: self.logger.clone(),
            local_id: self.local_id,
            peer_id: id,
            cluster_id: self.cluster_id,
            urls,
            raft: self.raft.clone(),
            errorc: self.errorc.clone(),
            options: self.options.clone(),
        }));
        if !self.peers.insert(id, peer.clone()) {
            // Lost a race with another add_peer(); the peer started here was never visible.
            tokio::spawn(async move { peer.stop().await });
            return Err(TransportError::PeerExists(id));
        }

        slog::info!(self.logger, "Added remote peer {}", id);
        Ok(())
    }

    pub async fn remove_peer(&self, id: PeerId) -> Result<(), TransportError> {
        let peer = self.peers.remove(id).ok_or(TransportError::PeerNotFound(id))?;
        peer.stop().await;
        slog::info!(self.logger, "Removed remote peer {}", id);
        Ok(())
    }

    pub fn update_peer(&self, id: PeerId, urls: Vec<String>) -> Result<(), TransportError> {
        self.peer(id)?.update(urls);
        slog::info!(self.logger, "Updated remote peer {}", id);
        Ok(())
    }

    pub fn pause_peer(&self, id: PeerId) -> Result<(), TransportError> {
        self.peer(id)?.pause();
        Ok(())
    }

    pub fn resume_peer(&self, id: PeerId) -> Result<(), TransportError> {
        self.peer(id)?.resume();
        Ok(())
    }

    /// When the connection with `id` last became active, or `None` if it is not active.
    pub fn active_since(&self, id: PeerId) -> Option<DateTime<Utc>> {
        self.peers.get(id).and_then(|peer| peer.active_since())
    }

    /// Counts and latency of appends sent to `id`, or `None` for an unknown peer.
    pub fn follower_stats(&self, id: PeerId) -> Option<FollowerStats> {
        self.peers.get(id).map(|peer| peer.follower_stats())
    }

    /// Stops every peer, then the server. Processing calls still running are cancelled.
    pub async fn stop(&self) {
        self.ctx.cancel();
        for peer in self.peers.drain() {
            peer.stop().await;
        }

        let server = self.server.lock().expect("Transport.stop() mutex guard poison").take();
        if let Some((shutdown_handle, server_task)) = server {
            shutdown_handle.shutdown();
            if tokio::time::timeout(self.options.conn_read_timeout, server_task).await.is_err() {
                slog::warn!(self.logger, "Server did not shut down in time");
            }
        }

        slog::info!(self.logger, "Stopped transport");
    }

    fn peer(&self, id: PeerId) -> Result<Arc<Peer>, TransportError> {
        self.peers.get(id).ok_or(TransportError::PeerNotFound(id))
    }
}
