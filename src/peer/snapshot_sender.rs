use crate::api::{PeerId, Raft, SnapshotMessage, SnapshotStatus};
use crate::codec::encode_message;
use crate::grpc::raft_transport_client::RaftTransportClient;
use crate::grpc::{snapshot_chunk, ProtoSnapshotHeader, SnapshotChunk};
use crate::peer::errors::SendError;
use crate::peer::peer_status::{Failure, PeerStatus};
use crate::peer::url_picker::UrlPicker;
use std::cmp;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;

const FAILURE: Failure = Failure {
    source: "snapshot sender",
    action: "send snapshot to",
};

// Allow a second per MiB on top of the write timeout.
const SNAPSHOT_BYTES_PER_SECOND: u64 = 1024 * 1024;

pub(crate) struct SnapshotSenderConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) peer_id: PeerId,
    pub(crate) cluster_id: u64,
    pub(crate) picker: Arc<UrlPicker>,
    pub(crate) status: Arc<PeerStatus>,
    pub(crate) raft: Arc<dyn Raft>,
    pub(crate) dial_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) chunk_size: usize,
}

/// SnapshotSender streams snapshot payloads to the peer, each on its own connection and task, so
/// a large transfer never holds up the streams or the pipeline.
pub(crate) struct SnapshotSender {
    inner: Arc<Inner>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

struct Inner {
    logger: slog::Logger,
    cluster_id: u64,
    picker: Arc<UrlPicker>,
    status: Arc<PeerStatus>,
    raft: Arc<dyn Raft>,
    dial_timeout: Duration,
    write_timeout: Duration,
    chunk_size: usize,
    stop: CancellationToken,
}

impl SnapshotSender {
    pub(crate) fn new(config: SnapshotSenderConfig) -> Self {
        SnapshotSender {
            inner: Arc::new(Inner {
                logger: config
                    .logger
                    .new(slog::o!("Sender" => "snapshot", "To" => config.peer_id.to_string())),
                cluster_id: config.cluster_id,
                picker: config.picker,
                status: config.status,
                raft: config.raft,
                dial_timeout: config.dial_timeout,
                write_timeout: config.write_timeout,
                chunk_size: config.chunk_size,
                stop: CancellationToken::new(),
            }),
            in_flight: Mutex::new(vec![]),
        }
    }

    /// Starts the transfer in the background and returns immediately.
    pub(crate) fn send(&self, snapshot: SnapshotMessage) {
        let inner = self.inner.clone();
        let mut in_flight = self.in_flight.lock().expect("SnapshotSender.send() mutex guard poison");
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.push(tokio::spawn(async move { inner.send(snapshot).await }));
    }

    /// Aborts transfers in progress, which are reported as failed, and waits for them to end.
    pub(crate) async fn stop(&self) {
        self.inner.stop.cancel();
        let in_flight: Vec<_> = self
            .in_flight
            .lock()
            .expect("SnapshotSender.stop() mutex guard poison")
            .drain(..)
            .collect();
        for handle in in_flight {
            let _ = handle.await;
        }
    }
}

impl Inner {
    async fn send(&self, mut snapshot: SnapshotMessage) {
        let to = snapshot.message.to;
        let index = snapshot.message.snapshot.map(|s| s.index).unwrap_or_default();
        slog::info!(
            self.logger,
            "Start sending snapshot [index: {}, to: {}, size: {}]",
            index,
            to,
            snapshot.total_size
        );

        let result = if self.stop.is_cancelled() {
            Err(SendError::Stopped)
        } else {
            tokio::select! {
                _ = self.stop.cancelled() => Err(SendError::Stopped),
                result = self.post(&mut snapshot) => result,
            }
        };

        match result {
            Ok(()) => {
                self.status.activate();
                self.raft.report_snapshot(to, SnapshotStatus::Finish);
                snapshot.notify(true);
                slog::info!(self.logger, "Sent snapshot [index: {}, to: {}]", index, to);
            }
            Err(e) => {
                slog::warn!(self.logger, "Failed to send snapshot [index: {}, to: {}]: {}", index, to, e);
                if !matches!(e, SendError::Stopped) {
                    self.status.deactivate(FAILURE, &e.to_string());
                }
                self.raft.report_unreachable(to);
                self.raft.report_snapshot(to, SnapshotStatus::Failure);
                snapshot.notify(false);
            }
        }
    }

    async fn post(&self, snapshot: &mut SnapshotMessage) -> Result<(), SendError> {
        let url = self.picker.pick().ok_or(SendError::NoUrl)?;
        let deadline = self.deadline(snapshot.total_size);
        let result = match tokio::time::timeout(deadline, self.post_url(&url, snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout),
        };
        if result.is_err() {
            self.picker.unreachable(&url);
        }
        result
    }

    fn deadline(&self, total_size: u64) -> Duration {
        self.write_timeout + Duration::from_secs(total_size / SNAPSHOT_BYTES_PER_SECOND)
    }

    async fn post_url(&self, url: &str, snapshot: &mut SnapshotMessage) -> Result<(), SendError> {
        let endpoint = Endpoint::from_shared(url.to_string())?;
        let channel = tokio::time::timeout(self.dial_timeout, endpoint.connect())
            .await
            .map_err(|_| SendError::Timeout)??;
        let mut client = RaftTransportClient::new(channel);

        let header = SnapshotChunk {
            chunk: Some(snapshot_chunk::Chunk::Header(ProtoSnapshotHeader {
                cluster_id: self.cluster_id,
                message: Some(encode_message(&snapshot.message)),
                total_size: snapshot.total_size,
            })),
        };
        let (chunk_tx, chunk_rx) = mpsc::channel(4);
        let upload = async {
            client.send_snapshot(ReceiverStream::new(chunk_rx)).await?;
            Ok::<(), SendError>(())
        };
        let feed = feed_chunks(
            snapshot.reader.as_mut(),
            chunk_tx,
            header,
            snapshot.total_size,
            self.chunk_size,
        );

        tokio::try_join!(upload, feed)?;
        Ok(())
    }
}

/// Pushes the header and then the payload in chunks of at most `chunk_size` bytes. Dropping the
/// sender on return ends the upload. If the upload ends first, its outcome is what counts.
async fn feed_chunks(
    reader: &mut (dyn AsyncRead + Send + Unpin),
    chunk_tx: mpsc::Sender<SnapshotChunk>,
    header: SnapshotChunk,
    total_size: u64,
    chunk_size: usize,
) -> Result<(), SendError> {
    if chunk_tx.send(header).await.is_err() {
        return Ok(());
    }

    let mut buf = vec![0u8; chunk_size];
    let mut sent = 0u64;
    while sent < total_size {
        let want = cmp::min(chunk_size as u64, total_size - sent) as usize;
        let n = reader.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(SendError::SnapshotTruncated {
                read: sent,
                expected: total_size,
            });
        }
        sent += n as u64;

        let chunk = SnapshotChunk {
            chunk: Some(snapshot_chunk::Chunk::Data(buf[..n].to_vec())),
        };
        if chunk_tx.send(chunk).await.is_err() {
            return Ok(());
        }
    }

    Ok(())
}
