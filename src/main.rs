use raft_transport::{
    CancellationToken, Message, MessageType, PeerId, ProcessError, Raft, SnapshotMetadata, SnapshotSink,
    SnapshotStatus, SnapshotStore, TransportConfig, TransportOptions,
};
use slog::Drain;
use std::error::Error;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::time::Duration;

/// Consensus core stand-in that logs what the transport hands it.
struct LoggingRaft {
    logger: slog::Logger,
}

#[async_trait::async_trait]
impl Raft for LoggingRaft {
    async fn process(&self, _ctx: &CancellationToken, message: Message) -> Result<(), ProcessError> {
        slog::info!(
            self.logger,
            "Received {:?} from {} (term {})",
            message.msg_type,
            message.from,
            message.term
        );
        Ok(())
    }

    fn report_unreachable(&self, id: PeerId) {
        slog::warn!(self.logger, "Peer {} unreachable", id);
    }

    fn report_snapshot(&self, id: PeerId, status: SnapshotStatus) {
        slog::info!(self.logger, "Snapshot to {}: {:?}", id, status);
    }
}

struct DiscardSnapshotStore;

#[async_trait::async_trait]
impl SnapshotStore for DiscardSnapshotStore {
    async fn create_sink(&self, _metadata: SnapshotMetadata, _total_size: u64) -> io::Result<SnapshotSink> {
        Ok(Box::new(tokio::io::sink()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let root_logger = create_root_logger_for_stdout();

    let mut transports = Vec::with_capacity(2);
    for id in 1..=2u64 {
        let logger = root_logger.new(slog::o!("Member" => id));
        let config = TransportConfig {
            local_id: id,
            cluster_id: 0xC1,
            listen_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0),
            raft: Arc::new(LoggingRaft { logger: logger.clone() }),
            snapshot_store: Arc::new(DiscardSnapshotStore),
            info_logger: logger,
            options: TransportOptions::default(),
        };
        transports.push(raft_transport::try_create_transport(config).await?);
    }

    let (one, two) = (&transports[0], &transports[1]);
    one.add_peer(PeerId::new(2), vec![two.url()])?;
    two.add_peer(PeerId::new(1), vec![one.url()])?;

    // Give the stream readers a moment to dial; until then messages use the pipeline.
    tokio::time::sleep(Duration::from_millis(500)).await;

    for term in 1..=3 {
        let mut heartbeat = Message::new(MessageType::Heartbeat, PeerId::new(1), PeerId::new(2));
        heartbeat.term = term;
        one.send(vec![heartbeat]);
    }
    tokio::time::sleep(Duration::from_millis(500)).await;

    slog::info!(root_logger, "Member 2 active since {:?}", one.active_since(PeerId::new(2)));
    slog::info!(root_logger, "Member 2 stats {:?}", one.follower_stats(PeerId::new(2)));
    for transport in &transports {
        transport.stop().await;
    }

    Ok(())
}

fn create_root_logger_for_stdout() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).use_file_location().build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}
