use bytes::Bytes;
use raft_transport::{
    CancellationToken, Entry, Message, MessageType, PeerId, ProcessError, Raft, SnapshotMessage, SnapshotMetadata,
    SnapshotSink, SnapshotStatus, SnapshotStore, Transport, TransportConfig, TransportError, TransportOptions,
};
use slog::Drain;
use std::error::Error;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::Duration;

const CLUSTER_ID: u64 = 0xC1;

#[tokio::test]
async fn messages_flow_both_ways_over_streams() -> Result<(), Box<dyn Error>> {
    let mut cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    cluster.connect()?;
    cluster.wait_until_active().await;

    for term in 1..=20 {
        cluster.one.send(vec![heartbeat(1, 2, term)]);
    }
    for term in 1..=20 {
        assert_eq!(cluster.two_raft.next_processed().await, heartbeat(1, 2, term));
    }

    cluster.two.send(vec![heartbeat(2, 1, 7)]);
    assert_eq!(cluster.one_raft.next_processed().await, heartbeat(2, 1, 7));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn consecutive_appends_arrive_intact() -> Result<(), Box<dyn Error>> {
    let mut cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    cluster.connect()?;
    cluster.wait_until_active().await;

    let appends: Vec<Message> = (0..10).map(|i| append(3, 100 + i * 2, 2)).collect();
    cluster.one.send(appends.clone());
    for expected in appends {
        assert_eq!(cluster.two_raft.next_processed().await, expected);
    }

    let stats = cluster.one.follower_stats(PeerId::new(2)).expect("Peer 2 is known");
    assert_eq!((stats.success, stats.fail), (10, 0));
    assert!(stats.latency.minimum <= stats.latency.average && stats.latency.average <= stats.latency.maximum);
    assert!(cluster.one.follower_stats(PeerId::new(3)).is_none());

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn snapshot_is_transferred_and_reported() -> Result<(), Box<dyn Error>> {
    let mut cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    cluster.connect()?;

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let mut message = Message::new(MessageType::Snapshot, PeerId::new(1), PeerId::new(2));
    message.term = 5;
    message.snapshot = Some(SnapshotMetadata { index: 900, term: 5 });
    let mut snapshot = SnapshotMessage::new(
        message.clone(),
        payload.len() as u64,
        Box::new(io::Cursor::new(payload.clone())),
    );
    let done = snapshot.close_notify();
    cluster.one.send_snapshot(snapshot);

    let outcome = tokio::time::timeout(Duration::from_secs(10), done).await?;
    assert_eq!(outcome, Ok(true));
    assert_eq!(cluster.two_raft.next_processed().await, message);
    assert_eq!(
        cluster.two_store.saved(),
        vec![(SnapshotMetadata { index: 900, term: 5 }, payload)]
    );
    assert!(cluster
        .one_raft
        .calls()
        .contains(&RaftCall::ReportSnapshot(PeerId::new(2), SnapshotStatus::Finish)));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn paused_peer_drops_until_resumed() -> Result<(), Box<dyn Error>> {
    let mut cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    cluster.connect()?;
    cluster.wait_until_active().await;

    cluster.one.pause_peer(PeerId::new(2))?;
    cluster.one.send(vec![heartbeat(1, 2, 1)]);
    cluster.two_raft.assert_nothing_processed().await;

    cluster.one.resume_peer(PeerId::new(2))?;
    cluster.one.send(vec![heartbeat(1, 2, 2)]);
    assert_eq!(cluster.two_raft.next_processed().await, heartbeat(1, 2, 2));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn dead_first_url_is_skipped() -> Result<(), Box<dyn Error>> {
    let mut cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    let dead = dead_url().await;
    cluster.one.add_peer(PeerId::new(2), vec![dead, cluster.two.url()])?;
    cluster.two.add_peer(PeerId::new(1), vec![cluster.one.url()])?;

    // The core retransmits whatever it was told was unreachable.
    let delivered = tokio::time::timeout(Duration::from_secs(10), async {
        let mut term = 0;
        loop {
            term += 1;
            cluster.one.send(vec![heartbeat(1, 2, term)]);
            if let Ok(Some(_)) = tokio::time::timeout(Duration::from_millis(200), cluster.two_raft.processed.recv()).await
            {
                return;
            }
        }
    })
    .await;
    assert!(delivered.is_ok(), "Nothing reached the live URL");

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn staggered_startup_is_not_an_error() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    let mut errors = cluster.one.errors().expect("errors() taken twice");
    assert!(cluster.one.errors().is_none());

    // Member 2 refuses member 1's streams until it learns about member 1.
    cluster.one.add_peer(PeerId::new(2), vec![cluster.two.url()])?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    cluster.two.add_peer(PeerId::new(1), vec![cluster.one.url()])?;
    cluster.wait_until_active().await;

    assert!(errors.try_recv().is_err());

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn removed_member_is_reported() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;
    let mut errors = cluster.one.errors().unwrap();
    cluster.connect()?;
    cluster.wait_until_active().await;

    // Member 2 drops member 1, closing its streams; member 1's redials are then refused.
    cluster.two.remove_peer(PeerId::new(1)).await?;

    let error = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await?.unwrap();
    assert!(matches!(error, TransportError::MemberRemoved(id) if id == PeerId::new(2)));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn cluster_mismatch_is_reported() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID + 1).await?;
    let mut errors = cluster.one.errors().unwrap();
    cluster.connect()?;

    let error = tokio::time::timeout(Duration::from_secs(5), errors.recv()).await?.unwrap();
    assert!(matches!(error, TransportError::ClusterMismatch(id) if id == PeerId::new(2)));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn peer_management_errors() -> Result<(), Box<dyn Error>> {
    let cluster = Cluster::start(CLUSTER_ID, CLUSTER_ID).await?;

    assert!(matches!(
        cluster.one.add_peer(PeerId::new(1), vec![]),
        Err(TransportError::InvalidPeerId(_))
    ));
    cluster.one.add_peer(PeerId::new(2), vec![cluster.two.url()])?;
    assert!(matches!(
        cluster.one.add_peer(PeerId::new(2), vec![]),
        Err(TransportError::PeerExists(_))
    ));
    assert!(matches!(
        cluster.one.pause_peer(PeerId::new(3)),
        Err(TransportError::PeerNotFound(_))
    ));

    cluster.one.update_peer(PeerId::new(2), vec![cluster.two.url()])?;
    cluster.one.remove_peer(PeerId::new(2)).await?;
    assert!(matches!(
        cluster.one.remove_peer(PeerId::new(2)).await,
        Err(TransportError::PeerNotFound(_))
    ));
    assert_eq!(cluster.one.active_since(PeerId::new(2)), None);

    // Snapshots for unknown peers fail right away.
    let message = Message::new(MessageType::Snapshot, PeerId::new(1), PeerId::new(2));
    let mut snapshot = SnapshotMessage::new(message, 0, Box::new(io::Cursor::new(vec![])));
    let done = snapshot.close_notify();
    cluster.one.send_snapshot(snapshot);
    assert_eq!(done.await, Ok(false));

    cluster.stop().await;
    Ok(())
}

#[tokio::test]
async fn illegal_options_are_rejected() {
    let mut options = TransportOptions::default();
    options.connection_per_pipeline = Some(0);
    let result = raft_transport::try_create_transport(config(1, CLUSTER_ID, RecordingRaft::new().0, options)).await;
    assert!(matches!(result, Err(TransportError::IllegalOptions(_))));
}

// -- setup --

struct Cluster {
    one: Transport,
    two: Transport,
    one_raft: RecordingRaftHandle,
    two_raft: RecordingRaftHandle,
    two_store: Arc<MemorySnapshotStore>,
}

impl Cluster {
    async fn start(one_cluster_id: u64, two_cluster_id: u64) -> Result<Self, TransportError> {
        let (one_raft, one_handle) = RecordingRaft::new();
        let (two_raft, two_handle) = RecordingRaft::new();
        let two_store = Arc::new(MemorySnapshotStore::default());

        let one = raft_transport::try_create_transport(config(1, one_cluster_id, one_raft, fast_options())).await?;
        let mut two_config = config(2, two_cluster_id, two_raft, fast_options());
        let snapshot_store: Arc<dyn SnapshotStore> = two_store.clone();
        two_config.snapshot_store = snapshot_store;
        let two = raft_transport::try_create_transport(two_config).await?;

        Ok(Cluster {
            one,
            two,
            one_raft: one_handle,
            two_raft: two_handle,
            two_store,
        })
    }

    fn connect(&self) -> Result<(), TransportError> {
        self.one.add_peer(PeerId::new(2), vec![self.two.url()])?;
        self.two.add_peer(PeerId::new(1), vec![self.one.url()])?;
        Ok(())
    }

    /// Waits until both general streams are attached, so sends no longer use the pipeline.
    async fn wait_until_active(&self) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.one.active_since(PeerId::new(2)).is_none() || self.two.active_since(PeerId::new(1)).is_none() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("Peers never became active");
        // Activation happens per stream; let the remaining streams attach too.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    async fn stop(self) {
        self.one.stop().await;
        self.two.stop().await;
    }
}

fn config(id: u64, cluster_id: u64, raft: Arc<RecordingRaft>, options: TransportOptions) -> TransportConfig {
    TransportConfig {
        local_id: id,
        cluster_id,
        listen_addr: SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0),
        raft,
        snapshot_store: Arc::new(MemorySnapshotStore::default()),
        info_logger: create_test_logger(id),
        options,
    }
}

fn fast_options() -> TransportOptions {
    TransportOptions {
        dial_backoff_initial: Some(Duration::from_millis(20)),
        dial_backoff_max: Some(Duration::from_millis(100)),
        ..TransportOptions::default()
    }
}

fn heartbeat(from: u64, to: u64, term: u64) -> Message {
    let mut message = Message::new(MessageType::Heartbeat, PeerId::new(from), PeerId::new(to));
    message.term = term;
    message
}

fn append(term: u64, index: u64, num_entries: u64) -> Message {
    let mut message = Message::new(MessageType::Append, PeerId::new(1), PeerId::new(2));
    message.term = term;
    message.log_term = term;
    message.index = index;
    message.commit = index;
    message.entries = (1..=num_entries)
        .map(|i| Entry {
            term,
            index: index + i,
            data: Bytes::from(format!("entry-{}", index + i)),
        })
        .collect();
    message
}

async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[derive(Clone, Debug, PartialEq)]
enum RaftCall {
    ReportUnreachable(PeerId),
    ReportSnapshot(PeerId, SnapshotStatus),
}

struct RecordingRaft {
    processed: mpsc::UnboundedSender<Message>,
    calls: Arc<Mutex<Vec<RaftCall>>>,
}

struct RecordingRaftHandle {
    processed: mpsc::UnboundedReceiver<Message>,
    calls: Arc<Mutex<Vec<RaftCall>>>,
}

impl RecordingRaft {
    fn new() -> (Arc<Self>, RecordingRaftHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let calls = Arc::new(Mutex::new(vec![]));
        let raft = RecordingRaft {
            processed: tx,
            calls: calls.clone(),
        };
        (Arc::new(raft), RecordingRaftHandle { processed: rx, calls })
    }
}

impl RecordingRaftHandle {
    async fn next_processed(&mut self) -> Message {
        tokio::time::timeout(Duration::from_secs(5), self.processed.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Expected message")
    }

    async fn assert_nothing_processed(&mut self) {
        if let Ok(message) = tokio::time::timeout(Duration::from_millis(300), self.processed.recv()).await {
            panic!("Expected nothing, got {:?}", message);
        }
    }

    fn calls(&self) -> Vec<RaftCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Raft for RecordingRaft {
    async fn process(&self, _ctx: &CancellationToken, message: Message) -> Result<(), ProcessError> {
        self.processed
            .send(message)
            .map_err(|_| ProcessError::Stopped)
    }

    fn report_unreachable(&self, id: PeerId) {
        self.calls.lock().unwrap().push(RaftCall::ReportUnreachable(id));
    }

    fn report_snapshot(&self, id: PeerId, status: SnapshotStatus) {
        self.calls.lock().unwrap().push(RaftCall::ReportSnapshot(id, status));
    }
}

#[derive(Default)]
struct MemorySnapshotStore {
    saved: Mutex<Vec<(SnapshotMetadata, Arc<Mutex<Vec<u8>>>)>>,
}

impl MemorySnapshotStore {
    fn saved(&self) -> Vec<(SnapshotMetadata, Vec<u8>)> {
        self.saved
            .lock()
            .unwrap()
            .iter()
            .map(|(metadata, data)| (*metadata, data.lock().unwrap().clone()))
            .collect()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn create_sink(&self, metadata: SnapshotMetadata, _total_size: u64) -> io::Result<SnapshotSink> {
        let data = Arc::new(Mutex::new(vec![]));
        self.saved.lock().unwrap().push((metadata, data.clone()));
        Ok(Box::new(MemorySink { data }))
    }
}

struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
}

impl AsyncWrite for MemorySink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn create_test_logger(id: u64) -> slog::Logger {
    let decorator = slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();

    slog::Logger::root(drain, slog::o!("Member" => id))
}
