use crate::api::{Message, PeerId, ProcessError, Raft, SnapshotMetadata, SnapshotSink, SnapshotStatus, SnapshotStore};
use crate::grpc::raft_transport_server::{RaftTransport, RaftTransportServer};
use crate::grpc::{
    snapshot_chunk, PipelineAck, PipelineRequest, ProtoSnapshotHeader, SnapshotAck, SnapshotChunk, StreamFrame,
    StreamRequest,
};
use slog::Drain;
use std::fmt::Debug;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Code, Request, Response, Status, Streaming};

pub(crate) const CLUSTER_ID: u64 = 0x1000;

/// Logger whose output is captured by the test harness.
pub(crate) fn logger() -> slog::Logger {
    let decorator = slog_term::PlainSyncDecorator::new(slog_term::TestStdoutWriter);
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    slog::Logger::root(drain, slog::o!())
}

/// Poll `condition` until it holds, giving background tasks a chance to run in between.
pub(crate) async fn eventually<F: Fn() -> bool>(condition: F) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.expect("Condition never became true");
}

/// A URL nothing listens on: bind an ephemeral port and release it.
pub(crate) async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub(crate) struct TestUtilReceiver<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Debug> TestUtilReceiver<T> {
    pub(crate) fn new(rx: mpsc::Receiver<T>) -> Self {
        TestUtilReceiver { rx }
    }

    pub(crate) async fn recv(&mut self) -> T {
        tokio::time::timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("Unexpected timeout")
            .expect("Expected value")
    }

    pub(crate) async fn assert_no_value(&mut self) {
        if let Ok(value) = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await {
            panic!("Expected nothing, got {:?}", value);
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RaftCall {
    Process(Message),
    ReportUnreachable(PeerId),
    ReportSnapshot(PeerId, SnapshotStatus),
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum ProcessMode {
    Accept,
    FailFirst(usize),
    BlockUntilCancelled,
}

/// Records everything the transport tells the consensus core.
pub(crate) struct FakeRaft {
    calls: Mutex<Vec<RaftCall>>,
    mode: Mutex<ProcessMode>,
}

impl FakeRaft {
    pub(crate) fn new() -> Self {
        FakeRaft::with_mode(ProcessMode::Accept)
    }

    /// The first `n` calls to `process()` fail.
    pub(crate) fn failing_first(n: usize) -> Self {
        FakeRaft::with_mode(ProcessMode::FailFirst(n))
    }

    /// `process()` waits until its context is cancelled.
    pub(crate) fn blocking() -> Self {
        FakeRaft::with_mode(ProcessMode::BlockUntilCancelled)
    }

    fn with_mode(mode: ProcessMode) -> Self {
        FakeRaft {
            calls: Mutex::new(vec![]),
            mode: Mutex::new(mode),
        }
    }

    pub(crate) fn calls(&self) -> Vec<RaftCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn processed(&self) -> Vec<Message> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RaftCall::Process(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, expected: &RaftCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|call| *call == expected).count()
    }

    fn record(&self, call: RaftCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Raft for FakeRaft {
    async fn process(&self, ctx: &CancellationToken, message: Message) -> Result<(), ProcessError> {
        self.record(RaftCall::Process(message));

        let mode = *self.mode.lock().unwrap();
        match mode {
            ProcessMode::Accept => Ok(()),
            ProcessMode::FailFirst(0) => Ok(()),
            ProcessMode::FailFirst(n) => {
                *self.mode.lock().unwrap() = ProcessMode::FailFirst(n - 1);
                Err(ProcessError::Other("injected failure".to_string()))
            }
            ProcessMode::BlockUntilCancelled => {
                ctx.cancelled().await;
                Err(ProcessError::Cancelled)
            }
        }
    }

    fn report_unreachable(&self, id: PeerId) {
        self.record(RaftCall::ReportUnreachable(id));
    }

    fn report_snapshot(&self, id: PeerId, status: SnapshotStatus) {
        self.record(RaftCall::ReportSnapshot(id, status));
    }
}

/// Keeps received snapshots in memory.
#[derive(Default)]
pub(crate) struct MemorySnapshotStore {
    saved: Mutex<Vec<(SnapshotMetadata, Arc<Mutex<Vec<u8>>>)>>,
}

impl MemorySnapshotStore {
    pub(crate) fn saved(&self) -> Vec<(SnapshotMetadata, Vec<u8>)> {
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
    async fn create_sink(&self, metadata: SnapshotMetadata, total_size: u64) -> io::Result<SnapshotSink> {
        let data = Arc::new(Mutex::new(Vec::with_capacity(total_size as usize)));
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

pub(crate) type FrameSender = mpsc::Sender<Result<StreamFrame, Status>>;

/// A remote peer that hands every request to the test instead of a consensus core.
pub(crate) struct StubPeerServer {
    pub(crate) url: String,
    streams: mpsc::UnboundedReceiver<(StreamRequest, FrameSender)>,
    pipelined: mpsc::UnboundedReceiver<PipelineRequest>,
    snapshots: mpsc::UnboundedReceiver<(ProtoSnapshotHeader, Vec<u8>)>,
    _shutdown: oneshot::Sender<()>,
}

struct StubService {
    reject: Option<Code>,
    streams: mpsc::UnboundedSender<(StreamRequest, FrameSender)>,
    pipelined: mpsc::UnboundedSender<PipelineRequest>,
    snapshots: mpsc::UnboundedSender<(ProtoSnapshotHeader, Vec<u8>)>,
}

impl StubService {
    fn check(&self) -> Result<(), Status> {
        match self.reject {
            Some(code) => Err(Status::new(code, "rejected by stub")),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl RaftTransport for StubService {
    type OpenStreamStream = ReceiverStream<Result<StreamFrame, Status>>;

    async fn open_stream(&self, request: Request<StreamRequest>) -> Result<Response<Self::OpenStreamStream>, Status> {
        self.check()?;
        let (tx, rx) = mpsc::channel(16);
        let _ = self.streams.send((request.into_inner(), tx));
        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn pipeline(&self, request: Request<PipelineRequest>) -> Result<Response<PipelineAck>, Status> {
        self.check()?;
        let _ = self.pipelined.send(request.into_inner());
        Ok(Response::new(PipelineAck {}))
    }

    async fn send_snapshot(&self, request: Request<Streaming<SnapshotChunk>>) -> Result<Response<SnapshotAck>, Status> {
        self.check()?;
        let mut stream = request.into_inner();
        let mut header = None;
        let mut data = vec![];
        while let Some(chunk) = stream.message().await? {
            match chunk.chunk {
                Some(snapshot_chunk::Chunk::Header(h)) => header = Some(h),
                Some(snapshot_chunk::Chunk::Data(bytes)) => data.extend_from_slice(&bytes),
                None => return Err(Status::invalid_argument("empty chunk")),
            }
        }

        let header = header.ok_or_else(|| Status::invalid_argument("missing header"))?;
        let received_bytes = data.len() as u64;
        let _ = self.snapshots.send((header, data));
        Ok(Response::new(SnapshotAck { received_bytes }))
    }
}

impl StubPeerServer {
    pub(crate) async fn start() -> Self {
        StubPeerServer::start_with(None).await
    }

    /// Every request fails with `code`.
    pub(crate) async fn start_rejecting(code: Code) -> Self {
        StubPeerServer::start_with(Some(code)).await
    }

    async fn start_with(reject: Option<Code>) -> Self {
        let (streams_tx, streams) = mpsc::unbounded_channel();
        let (pipelined_tx, pipelined) = mpsc::unbounded_channel();
        let (snapshots_tx, snapshots) = mpsc::unbounded_channel();
        let service = StubService {
            reject,
            streams: streams_tx,
            pipelined: pipelined_tx,
            snapshots: snapshots_tx,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(
            Server::builder()
                .add_service(RaftTransportServer::new(service))
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                    let _ = shutdown_rx.await;
                }),
        );

        StubPeerServer {
            url,
            streams,
            pipelined,
            snapshots,
            _shutdown: shutdown_tx,
        }
    }

    pub(crate) async fn next_stream(&mut self) -> (StreamRequest, FrameSender) {
        tokio::time::timeout(Duration::from_secs(5), self.streams.recv())
            .await
            .expect("Expected a stream to be opened")
            .unwrap()
    }

    pub(crate) async fn assert_no_stream(&mut self) {
        if let Ok(Some((request, _))) = tokio::time::timeout(Duration::from_millis(200), self.streams.recv()).await {
            panic!("Unexpected stream {:?}", request);
        }
    }

    pub(crate) async fn next_pipelined(&mut self) -> PipelineRequest {
        tokio::time::timeout(Duration::from_secs(5), self.pipelined.recv())
            .await
            .expect("Expected a pipeline request")
            .unwrap()
    }

    pub(crate) async fn next_snapshot(&mut self) -> (ProtoSnapshotHeader, Vec<u8>) {
        tokio::time::timeout(Duration::from_secs(5), self.snapshots.recv())
            .await
            .expect("Expected a snapshot")
            .unwrap()
    }

    /// Stops accepting connections. Dropping the server has the same effect.
    pub(crate) fn stop(self) {}
}
