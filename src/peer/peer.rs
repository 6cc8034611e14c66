use crate::api::{
    FollowerStats, Message, PeerId, Raft, SnapshotMessage, SnapshotStatus, TransportError, TransportOptionsValidated,
};
use crate::codec::StreamType;
use crate::peer::follower_stats::FollowerStatsRecorder;
use crate::peer::outgoing_conn::OutgoingConn;
use crate::peer::peer_status::PeerStatus;
use crate::peer::pipeline::{Pipeline, PipelineConfig};
use crate::peer::snapshot_sender::{SnapshotSender, SnapshotSenderConfig};
use crate::peer::stream_reader::{StreamReader, StreamReaderConfig};
use crate::peer::stream_writer::{StreamWriter, StreamWriterConfig};
use crate::peer::url_picker::UrlPicker;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const STREAM_APP_V2: &str = "stream MsgApp v2";
const STREAM_MSG: &str = "stream Message";
const PIPELINE_MSG: &str = "pipeline";

pub(crate) struct PeerConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) local_id: PeerId,
    pub(crate) peer_id: PeerId,
    pub(crate) cluster_id: u64,
    pub(crate) urls: Vec<String>,
    pub(crate) raft: Arc<dyn Raft>,
    pub(crate) errorc: mpsc::UnboundedSender<TransportError>,
    pub(crate) options: TransportOptionsValidated,
}

/// Peer is everything the local member uses to talk to one remote member.
///
/// Outbound, a message goes over one of three channels:
/// - the MsgApp v2 stream, for appends
/// - the Message stream, for everything else
/// - the pipeline, for snapshot notifications and whenever no stream is attached
///
/// Streams are opened by the remote's readers and attached here, and our own readers dial the
/// remote's streams. Inbound messages are handed to the consensus core by a single dispatch task
/// so they are processed in the order they arrived.
pub(crate) struct Peer {
    logger: slog::Logger,
    id: PeerId,
    raft: Arc<dyn Raft>,
    status: Arc<PeerStatus>,
    picker: Arc<UrlPicker>,
    stats: Arc<FollowerStatsRecorder>,

    msg_app_v2_writer: StreamWriter,
    writer: StreamWriter,
    pipeline: Pipeline,
    snap_sender: SnapshotSender,
    msg_app_v2_reader: StreamReader,
    msg_app_reader: StreamReader,

    paused: Mutex<bool>,
    ctx: CancellationToken,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl Peer {
    pub(crate) fn start(config: PeerConfig) -> Self {
        let PeerConfig {
            logger,
            local_id,
            peer_id,
            cluster_id,
            urls,
            raft,
            errorc,
            options,
        } = config;
        let logger = logger.new(slog::o!("RemotePeerId" => peer_id.to_string()));
        slog::info!(logger, "Starting remote peer {}", peer_id);

        let status = Arc::new(PeerStatus::new(logger.clone(), peer_id));
        let picker = Arc::new(UrlPicker::new(urls));
        let stats = Arc::new(FollowerStatsRecorder::default());
        let ctx = CancellationToken::new();

        let pipeline = Pipeline::start(PipelineConfig {
            logger: logger.clone(),
            peer_id,
            cluster_id,
            picker: picker.clone(),
            status: status.clone(),
            raft: raft.clone(),
            stats: stats.clone(),
            errorc: errorc.clone(),
            buf_size: options.pipeline_buf_size,
            connections: options.connection_per_pipeline,
            dial_timeout: options.conn_write_timeout,
            request_timeout: options.conn_read_timeout,
        });

        let writer_config = |stream_type| StreamWriterConfig {
            logger: logger.clone(),
            peer_id,
            stream_type,
            status: status.clone(),
            raft: raft.clone(),
            stats: stats.clone(),
            buf_size: options.stream_buf_size,
            write_timeout: options.conn_write_timeout,
            heartbeat_interval: options.heartbeat_interval(),
        };
        let msg_app_v2_writer = StreamWriter::start(writer_config(StreamType::MsgAppV2));
        let writer = StreamWriter::start(writer_config(StreamType::Message));

        let snap_sender = SnapshotSender::new(SnapshotSenderConfig {
            logger: logger.clone(),
            peer_id,
            cluster_id,
            picker: picker.clone(),
            status: status.clone(),
            raft: raft.clone(),
            dial_timeout: options.conn_write_timeout,
            write_timeout: options.conn_write_timeout,
            chunk_size: options.snapshot_chunk_size,
        });

        let (recv_tx, recv_rx) = mpsc::channel(options.recv_buf_size);
        let (prop_tx, prop_rx) = mpsc::channel(options.max_pending_proposals);

        let reader_config = |stream_type| StreamReaderConfig {
            logger: logger.clone(),
            local_id,
            peer_id,
            cluster_id,
            stream_type,
            picker: picker.clone(),
            status: status.clone(),
            recvc: recv_tx.clone(),
            propc: prop_tx.clone(),
            errorc: errorc.clone(),
            dial_timeout: options.conn_write_timeout,
            read_timeout: options.conn_read_timeout,
            backoff_initial: options.dial_backoff_initial,
            backoff_max: options.dial_backoff_max,
        };
        let msg_app_v2_reader = StreamReader::start(reader_config(StreamType::MsgAppV2));
        let msg_app_reader = StreamReader::start(reader_config(StreamType::Message));

        let dispatch = tokio::spawn(dispatch(logger.clone(), raft.clone(), ctx.clone(), prop_rx, recv_rx));

        Peer {
            logger,
            id: peer_id,
            raft,
            status,
            picker,
            stats,
            msg_app_v2_writer,
            writer,
            pipeline,
            snap_sender,
            msg_app_v2_reader,
            msg_app_reader,
            paused: Mutex::new(false),
            ctx,
            dispatch: Mutex::new(Some(dispatch)),
        }
    }

    /// Queues `message` without blocking. Messages that cannot be queued are dropped and
    /// reported as unreachable; the consensus core retransmits on its own schedule.
    pub(crate) fn send(&self, message: Message) {
        if self.is_paused() {
            return;
        }

        let (writec, name) = self.pick(&message);
        let message = match writec.try_send(message) {
            Ok(()) => return,
            Err(mpsc::error::TrySendError::Full(m)) | Err(mpsc::error::TrySendError::Closed(m)) => m,
        };

        if self.status.should_warn_drop() {
            slog::warn!(
                self.logger,
                "Dropped internal raft message to {} since {} sending buffer is full (bad/overloaded network)",
                message.to,
                name
            );
        }
        slog::debug!(
            self.logger,
            "Dropped {:?} to {} since {} sending buffer is full",
            message.msg_type,
            message.to,
            name
        );
        self.raft.report_unreachable(message.to);
        if message.is_snapshot() {
            self.raft.report_snapshot(message.to, SnapshotStatus::Failure);
        }
    }

    pub(crate) fn send_snap(&self, snapshot: SnapshotMessage) {
        self.snap_sender.send(snapshot);
    }

    pub(crate) fn update(&self, urls: Vec<String>) {
        self.picker.update(urls);
    }

    /// Gives a stream the remote opened to the writer of the same type.
    pub(crate) async fn attach_outgoing_conn(&self, conn: OutgoingConn) {
        let result = match conn.stream_type() {
            StreamType::MsgAppV2 => self.msg_app_v2_writer.attach(conn).await,
            StreamType::Message => self.writer.attach(conn).await,
        };
        if let Err(conn) = result {
            slog::debug!(self.logger, "Peer {} is stopped; closing {}", self.id, conn.stream_type());
            conn.close();
        }
    }

    pub(crate) fn active_since(&self) -> Option<DateTime<Utc>> {
        self.status.active_since()
    }

    pub(crate) fn follower_stats(&self) -> FollowerStats {
        self.stats.snapshot()
    }

    /// Outbound messages are dropped and inbound ones discarded until `resume()`.
    pub(crate) fn pause(&self) {
        *self.paused.lock().expect("Peer.pause() mutex guard poison") = true;
        self.msg_app_reader.pause();
        self.msg_app_v2_reader.pause();
    }

    pub(crate) fn resume(&self) {
        *self.paused.lock().expect("Peer.resume() mutex guard poison") = false;
        self.msg_app_reader.resume();
        self.msg_app_v2_reader.resume();
    }

    pub(crate) async fn stop(&self) {
        slog::info!(self.logger, "Stopping remote peer {}", self.id);

        self.ctx.cancel();
        let dispatch = self.dispatch.lock().expect("Peer.stop() mutex guard poison").take();
        if let Some(dispatch) = dispatch {
            let _ = dispatch.await;
        }

        self.msg_app_v2_writer.stop().await;
        self.writer.stop().await;
        self.pipeline.stop().await;
        self.snap_sender.stop().await;
        self.msg_app_v2_reader.stop().await;
        self.msg_app_reader.stop().await;

        slog::info!(self.logger, "Stopped remote peer {}", self.id);
    }

    fn is_paused(&self) -> bool {
        *self.paused.lock().expect("Peer.is_paused() mutex guard poison")
    }

    /// Chooses where `message` goes. Snapshot notifications always use the pipeline so they
    /// cannot hold up a stream.
    pub(crate) fn pick(&self, message: &Message) -> (mpsc::Sender<Message>, &'static str) {
        if message.is_snapshot() {
            return (self.pipeline.msgc(), PIPELINE_MSG);
        }
        if message.is_append() {
            if let Some(writec) = self.msg_app_v2_writer.writec() {
                return (writec, STREAM_APP_V2);
            }
        }
        if let Some(writec) = self.writer.writec() {
            return (writec, STREAM_MSG);
        }
        (self.pipeline.msgc(), PIPELINE_MSG)
    }
}

async fn dispatch(
    logger: slog::Logger,
    raft: Arc<dyn Raft>,
    ctx: CancellationToken,
    mut propc: mpsc::Receiver<Message>,
    mut recvc: mpsc::Receiver<Message>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            Some(message) = propc.recv() => message,
            Some(message) = recvc.recv() => message,
        };

        let msg_type = message.msg_type;
        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => break,
            result = raft.process(&ctx, message) => result,
        };
        if let Err(e) = result {
            slog::warn!(logger, "Failed to process raft message {:?}: {}", msg_type, e);
        }
    }
}
