use crate::api::{Message, PeerId, Raft, SnapshotStatus, TransportError};
use crate::codec::encode_message;
use crate::grpc::raft_transport_client::RaftTransportClient;
use crate::grpc::PipelineRequest;
use crate::peer::errors::SendError;
use crate::peer::follower_stats::FollowerStatsRecorder;
use crate::peer::peer_status::{Failure, PeerStatus};
use crate::peer::url_picker::UrlPicker;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tonic::Code;

pub(crate) struct PipelineConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) peer_id: PeerId,
    pub(crate) cluster_id: u64,
    pub(crate) picker: Arc<UrlPicker>,
    pub(crate) status: Arc<PeerStatus>,
    pub(crate) raft: Arc<dyn Raft>,
    pub(crate) stats: Arc<FollowerStatsRecorder>,
    pub(crate) errorc: mpsc::UnboundedSender<TransportError>,
    pub(crate) buf_size: usize,
    pub(crate) connections: usize,
    pub(crate) dial_timeout: Duration,
    pub(crate) request_timeout: Duration,
}

/// Pipeline delivers messages one request at a time over short-lived connections. It carries
/// snapshot notifications and everything that cannot go over an attached stream.
pub(crate) struct Pipeline {
    msgc: mpsc::Sender<Message>,
    stop: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct PipelineWorker {
    logger: slog::Logger,
    peer_id: PeerId,
    cluster_id: u64,
    picker: Arc<UrlPicker>,
    status: Arc<PeerStatus>,
    raft: Arc<dyn Raft>,
    stats: Arc<FollowerStatsRecorder>,
    errorc: mpsc::UnboundedSender<TransportError>,
    dial_timeout: Duration,
    request_timeout: Duration,
    msgc: Arc<tokio::sync::Mutex<mpsc::Receiver<Message>>>,
    stop: CancellationToken,
}

const FAILURE: Failure = Failure {
    source: "pipeline",
    action: "post to",
};

impl Pipeline {
    pub(crate) fn start(config: PipelineConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(config.buf_size);
        let msg_rx = Arc::new(tokio::sync::Mutex::new(msg_rx));
        let stop = CancellationToken::new();
        let logger = config.logger.new(slog::o!("Sender" => "pipeline"));

        let workers = (0..config.connections)
            .map(|_| {
                let worker = PipelineWorker {
                    logger: logger.clone(),
                    peer_id: config.peer_id,
                    cluster_id: config.cluster_id,
                    picker: config.picker.clone(),
                    status: config.status.clone(),
                    raft: config.raft.clone(),
                    stats: config.stats.clone(),
                    errorc: config.errorc.clone(),
                    dial_timeout: config.dial_timeout,
                    request_timeout: config.request_timeout,
                    msgc: msg_rx.clone(),
                    stop: stop.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();

        slog::info!(logger, "Started HTTP pipelining with peer {}", config.peer_id);

        Pipeline {
            msgc: msg_tx,
            stop,
            workers: Mutex::new(workers),
        }
    }

    pub(crate) fn msgc(&self) -> mpsc::Sender<Message> {
        self.msgc.clone()
    }

    /// Abandons in-flight requests and returns once every worker has exited.
    pub(crate) async fn stop(&self) {
        self.stop.cancel();
        let workers: Vec<_> = self
            .workers
            .lock()
            .expect("Pipeline.stop() mutex guard poison")
            .drain(..)
            .collect();
        for worker in workers {
            let _ = worker.await;
        }
    }
}

impl PipelineWorker {
    async fn run(self) {
        loop {
            let message = tokio::select! {
                _ = self.stop.cancelled() => break,
                message = self.next_message() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            let started = Instant::now();
            let result = tokio::select! {
                _ = self.stop.cancelled() => break,
                result = self.post(&message) => result,
            };
            self.stats.record(&message, started, &result);

            match result {
                Ok(()) => self.status.activate(),
                Err(e) => {
                    self.report_critical(&e);
                    self.status.deactivate(FAILURE, &e.to_string());
                    self.raft.report_unreachable(message.to);
                    if message.is_snapshot() {
                        self.raft.report_snapshot(message.to, SnapshotStatus::Failure);
                    }
                }
            }
        }

        slog::debug!(self.logger, "Pipeline worker for {} exited", self.peer_id);
    }

    async fn next_message(&self) -> Option<Message> {
        self.msgc.lock().await.recv().await
    }

    async fn post(&self, message: &Message) -> Result<(), SendError> {
        let url = self.picker.pick().ok_or(SendError::NoUrl)?;
        let result = self.post_url(&url, message).await;
        if result.is_err() {
            self.picker.unreachable(&url);
        }
        result
    }

    /// One connect-send-wait-close cycle. The connection is dropped on return.
    async fn post_url(&self, url: &str, message: &Message) -> Result<(), SendError> {
        let endpoint = Endpoint::from_shared(url.to_string())?;
        let channel = tokio::time::timeout(self.dial_timeout, endpoint.connect())
            .await
            .map_err(|_| SendError::Timeout)??;

        let mut client = RaftTransportClient::new(channel);
        let request = PipelineRequest {
            cluster_id: self.cluster_id,
            message: Some(encode_message(message)),
        };
        tokio::time::timeout(self.request_timeout, client.pipeline(request))
            .await
            .map_err(|_| SendError::Timeout)??;

        Ok(())
    }

    fn report_critical(&self, error: &SendError) {
        let critical = match error {
            SendError::Rpc(status) if status.code() == Code::PermissionDenied => {
                TransportError::MemberRemoved(self.peer_id)
            }
            SendError::Rpc(status) if status.code() == Code::FailedPrecondition => {
                TransportError::ClusterMismatch(self.peer_id)
            }
            _ => return,
        };

        slog::error!(self.logger, "{}", critical);
        let _ = self.errorc.send(critical);
    }
}
