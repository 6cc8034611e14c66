use crate::api::{Message, PeerId, TransportError};
use crate::codec::{DecodedFrame, StreamDecoder, StreamType};
use crate::grpc::raft_transport_client::RaftTransportClient;
use crate::grpc::{StreamFrame, StreamRequest};
use crate::peer::errors::StreamError;
use crate::peer::peer_status::{Failure, PeerStatus};
use crate::peer::url_picker::UrlPicker;
use rand::Rng;
use std::cmp;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;
use tonic::{Code, Streaming};

pub(crate) struct StreamReaderConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) local_id: PeerId,
    pub(crate) peer_id: PeerId,
    pub(crate) cluster_id: u64,
    pub(crate) stream_type: StreamType,
    pub(crate) picker: Arc<UrlPicker>,
    pub(crate) status: Arc<PeerStatus>,
    pub(crate) recvc: mpsc::Sender<Message>,
    pub(crate) propc: mpsc::Sender<Message>,
    pub(crate) errorc: mpsc::UnboundedSender<TransportError>,
    pub(crate) dial_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) backoff_initial: Duration,
    pub(crate) backoff_max: Duration,
}

/// StreamReader dials the remote peer's stream endpoint for one stream type and forwards what it
/// reads to the peer's inbound queues. It redials with backoff until stopped.
pub(crate) struct StreamReader {
    paused: Arc<Mutex<bool>>,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct StreamReaderTask {
    logger: slog::Logger,
    local_id: PeerId,
    peer_id: PeerId,
    cluster_id: u64,
    stream_type: StreamType,
    picker: Arc<UrlPicker>,
    status: Arc<PeerStatus>,
    recvc: mpsc::Sender<Message>,
    propc: mpsc::Sender<Message>,
    errorc: mpsc::UnboundedSender<TransportError>,
    dial_timeout: Duration,
    read_timeout: Duration,
    backoff_initial: Duration,
    backoff_max: Duration,
    paused: Arc<Mutex<bool>>,
    stop: CancellationToken,
}

impl StreamReader {
    pub(crate) fn start(config: StreamReaderConfig) -> Self {
        let paused = Arc::new(Mutex::new(false));
        let stop = CancellationToken::new();

        let task = StreamReaderTask {
            logger: config
                .logger
                .new(slog::o!("Stream" => config.stream_type.to_string())),
            local_id: config.local_id,
            peer_id: config.peer_id,
            cluster_id: config.cluster_id,
            stream_type: config.stream_type,
            picker: config.picker,
            status: config.status,
            recvc: config.recvc,
            propc: config.propc,
            errorc: config.errorc,
            dial_timeout: config.dial_timeout,
            read_timeout: config.read_timeout,
            backoff_initial: config.backoff_initial,
            backoff_max: config.backoff_max,
            paused: paused.clone(),
            stop: stop.clone(),
        };
        let handle = tokio::spawn(task.run());

        StreamReader {
            paused,
            stop,
            task: Mutex::new(Some(handle)),
        }
    }

    /// While paused, messages read from the connection are discarded. The connection itself is
    /// kept open.
    pub(crate) fn pause(&self) {
        *self.paused.lock().expect("StreamReader.pause() mutex guard poison") = true;
    }

    pub(crate) fn resume(&self) {
        *self.paused.lock().expect("StreamReader.resume() mutex guard poison") = false;
    }

    pub(crate) async fn stop(&self) {
        self.stop.cancel();
        let handle = self.task.lock().expect("StreamReader.stop() mutex guard poison").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl StreamReaderTask {
    async fn run(self) {
        let mut backoff = self.backoff_initial;
        let mut critical_reported = false;

        loop {
            let dialed = tokio::select! {
                _ = self.stop.cancelled() => break,
                dialed = self.dial() => dialed,
            };

            match dialed {
                Ok(mut stream) => {
                    self.status.activate();
                    slog::info!(self.logger, "Established {} reader with peer {}", self.stream_type, self.peer_id);
                    backoff = self.backoff_initial;
                    critical_reported = false;

                    let result = tokio::select! {
                        _ = self.stop.cancelled() => break,
                        result = self.read_loop(&mut stream) => result,
                    };
                    if let Err(e) = result {
                        self.status.deactivate(
                            Failure {
                                source: self.source(),
                                action: "read from",
                            },
                            &e.to_string(),
                        );
                    }
                    slog::info!(self.logger, "Lost {} reader with peer {}", self.stream_type, self.peer_id);
                }
                Err(e) => {
                    if !critical_reported {
                        critical_reported = self.report_critical(&e);
                    }
                    self.status.deactivate(
                        Failure {
                            source: self.source(),
                            action: "dial",
                        },
                        &e.to_string(),
                    );
                }
            }

            let delay = jittered(backoff);
            tokio::select! {
                _ = self.stop.cancelled() => break,
                _ = tokio::time::sleep(delay) => {},
            }
            backoff = cmp::min(backoff * 2, self.backoff_max);
        }

        slog::info!(self.logger, "Stopped {} reader with peer {}", self.stream_type, self.peer_id);
    }

    async fn dial(&self) -> Result<Streaming<StreamFrame>, StreamError> {
        let url = self.picker.pick().ok_or(StreamError::NoUrl)?;
        let result = self.dial_url(&url).await;
        if result.is_err() {
            self.picker.unreachable(&url);
        }
        result
    }

    async fn dial_url(&self, url: &str) -> Result<Streaming<StreamFrame>, StreamError> {
        let endpoint = Endpoint::from_shared(url.to_string())?;
        let channel = tokio::time::timeout(self.dial_timeout, endpoint.connect())
            .await
            .map_err(|_| StreamError::DialTimeout)??;

        let mut client = RaftTransportClient::new(channel);
        let request = StreamRequest {
            stream_type: self.stream_type.to_proto() as i32,
            from: self.local_id.as_u64(),
            to: self.peer_id.as_u64(),
            cluster_id: self.cluster_id,
        };
        let response = tokio::time::timeout(self.dial_timeout, client.open_stream(request))
            .await
            .map_err(|_| StreamError::DialTimeout)?
            .map_err(StreamError::Rejected)?;

        Ok(response.into_inner())
    }

    /// Reads until the connection fails. Only returns with an error.
    async fn read_loop(&self, stream: &mut Streaming<StreamFrame>) -> Result<(), StreamError> {
        let mut decoder = StreamDecoder::new(self.stream_type);
        loop {
            let frame = match tokio::time::timeout(self.read_timeout, stream.message()).await {
                Err(_) => return Err(StreamError::ReadTimeout),
                Ok(Err(status)) => return Err(StreamError::Read(status)),
                Ok(Ok(None)) => return Err(StreamError::Closed),
                Ok(Ok(Some(frame))) => frame,
            };

            // Decode even while paused so the append cursor stays in sync with the writer.
            let message = match decoder.decode(frame)? {
                DecodedFrame::Heartbeat => continue,
                DecodedFrame::Message(message) => message,
            };

            if self.is_paused() {
                continue;
            }

            let recvc = if message.is_proposal() {
                &self.propc
            } else {
                &self.recvc
            };
            if let Err(e) = recvc.try_send(message) {
                let message = match e {
                    mpsc::error::TrySendError::Full(m) | mpsc::error::TrySendError::Closed(m) => m,
                };
                if self.status.is_active() {
                    slog::warn!(
                        self.logger,
                        "Dropped internal raft message from {} since receiving buffer is full (overloaded network)",
                        message.from
                    );
                }
                slog::debug!(
                    self.logger,
                    "Dropped {:?} from {} since receiving buffer is full",
                    message.msg_type,
                    message.from
                );
            }
        }
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().expect("StreamReader.is_paused() mutex guard poison")
    }

    /// Some rejections mean retrying is pointless until an operator steps in. Those are
    /// published once per run of failed dials; the reader keeps retrying regardless.
    fn report_critical(&self, error: &StreamError) -> bool {
        let critical = match error {
            StreamError::Rejected(status) if status.code() == Code::NotFound => {
                // The remote has not been told about us yet; usual while a cluster starts.
                slog::warn!(self.logger, "Peer {} does not know this member yet", self.peer_id);
                return false;
            }
            StreamError::Rejected(status) if status.code() == Code::PermissionDenied => {
                TransportError::MemberRemoved(self.peer_id)
            }
            StreamError::Rejected(status) if status.code() == Code::FailedPrecondition => {
                TransportError::ClusterMismatch(self.peer_id)
            }
            _ => return false,
        };

        slog::error!(self.logger, "{}", critical);
        let _ = self.errorc.send(critical);
        true
    }

    fn source(&self) -> &'static str {
        match self.stream_type {
            StreamType::Message => "stream Message reader",
            StreamType::MsgAppV2 => "stream MsgApp v2 reader",
        }
    }
}

fn jittered(backoff: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(0.5..1.0);
    backoff.mul_f64(factor)
}
