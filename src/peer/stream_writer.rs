use crate::api::{Message, PeerId, Raft};
use crate::codec::{heartbeat_frame, StreamEncoder, StreamType};
use crate::peer::errors::StreamError;
use crate::peer::follower_stats::FollowerStatsRecorder;
use crate::peer::outgoing_conn::OutgoingConn;
use crate::peer::peer_status::{Failure, PeerStatus};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub(crate) struct StreamWriterConfig {
    pub(crate) logger: slog::Logger,
    pub(crate) peer_id: PeerId,
    pub(crate) stream_type: StreamType,
    pub(crate) status: Arc<PeerStatus>,
    pub(crate) raft: Arc<dyn Raft>,
    pub(crate) stats: Arc<FollowerStatsRecorder>,
    pub(crate) buf_size: usize,
    pub(crate) write_timeout: Duration,
    pub(crate) heartbeat_interval: Duration,
}

/// StreamWriter writes messages to one long-lived stream of one type. The stream is opened by
/// the remote peer and attached here; when writing fails the writer drops the connection and
/// waits for the remote to dial again rather than dialing itself.
pub(crate) struct StreamWriter {
    outbox: Arc<Mutex<Outbox>>,
    connc: mpsc::Sender<OutgoingConn>,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

// The channel senders use to queue messages for the current connection. It is replaced
// whenever a connection closes, so messages queued for a dead connection are dropped with it.
struct Outbox {
    msgc: mpsc::Sender<Message>,
    working: bool,
}

struct StreamWriterTask {
    logger: slog::Logger,
    peer_id: PeerId,
    stream_type: StreamType,
    status: Arc<PeerStatus>,
    raft: Arc<dyn Raft>,
    stats: Arc<FollowerStatsRecorder>,
    buf_size: usize,
    write_timeout: Duration,
    heartbeat_interval: Duration,
    outbox: Arc<Mutex<Outbox>>,
    connc: mpsc::Receiver<OutgoingConn>,
    msgc: mpsc::Receiver<Message>,
    stop: CancellationToken,
}

struct AttachedConn {
    conn: OutgoingConn,
    encoder: StreamEncoder,
    last_write: Instant,
}

impl StreamWriter {
    pub(crate) fn start(config: StreamWriterConfig) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel(config.buf_size);
        let (conn_tx, conn_rx) = mpsc::channel(1);
        let outbox = Arc::new(Mutex::new(Outbox {
            msgc: msg_tx,
            working: false,
        }));
        let stop = CancellationToken::new();

        let task = StreamWriterTask {
            logger: config
                .logger
                .new(slog::o!("Stream" => config.stream_type.to_string())),
            peer_id: config.peer_id,
            stream_type: config.stream_type,
            status: config.status,
            raft: config.raft,
            stats: config.stats,
            buf_size: config.buf_size,
            write_timeout: config.write_timeout,
            heartbeat_interval: config.heartbeat_interval,
            outbox: outbox.clone(),
            connc: conn_rx,
            msgc: msg_rx,
            stop: stop.clone(),
        };
        let handle = tokio::spawn(task.run());

        StreamWriter {
            outbox,
            connc: conn_tx,
            stop,
            task: Mutex::new(Some(handle)),
        }
    }

    /// Returns the queue for the current connection, or `None` if no connection is attached.
    pub(crate) fn writec(&self) -> Option<mpsc::Sender<Message>> {
        let outbox = self.outbox.lock().expect("StreamWriter.writec() mutex guard poison");
        if outbox.working {
            Some(outbox.msgc.clone())
        } else {
            None
        }
    }

    /// Hand a new connection to the writer. The previous connection, if any, is closed by the
    /// writer. If the writer has stopped, the connection is handed back and the caller must
    /// close it.
    pub(crate) async fn attach(&self, conn: OutgoingConn) -> Result<(), OutgoingConn> {
        if self.stop.is_cancelled() {
            return Err(conn);
        }
        self.connc.send(conn).await.map_err(|e| e.0)
    }

    pub(crate) async fn stop(&self) {
        self.stop.cancel();
        let handle = self.task.lock().expect("StreamWriter.stop() mutex guard poison").take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl StreamWriterTask {
    async fn run(mut self) {
        let mut attached: Option<AttachedConn> = None;
        let mut ticker = tokio::time::interval(self.heartbeat_interval);

        loop {
            let working = attached.is_some();
            tokio::select! {
                _ = self.stop.cancelled() => {
                    self.close(&mut attached);
                    // Refuse connections that raced with stop.
                    self.connc.close();
                    while let Ok(conn) = self.connc.try_recv() {
                        conn.close();
                    }
                    slog::info!(self.logger, "Stopped streaming with peer {}", self.peer_id);
                    return;
                }
                Some(conn) = self.connc.recv() => {
                    self.close(&mut attached);
                    debug_assert_eq!(conn.stream_type(), self.stream_type);
                    attached = Some(AttachedConn {
                        conn,
                        encoder: StreamEncoder::new(self.stream_type),
                        last_write: Instant::now(),
                    });
                    self.status.activate();
                    self.outbox.lock().expect("StreamWriter outbox mutex guard poison").working = true;
                    slog::info!(self.logger, "Established {} writer with peer {}", self.stream_type, self.peer_id);
                }
                _ = ticker.tick(), if working => {
                    if let Err(e) = self.heartbeat(&mut attached).await {
                        self.status.deactivate(Failure { source: self.source(), action: "heartbeat" }, &e.to_string());
                        self.close(&mut attached);
                    }
                }
                Some(message) = self.msgc.recv(), if working => {
                    let started = Instant::now();
                    let result = self.write(&mut attached, &message).await;
                    self.stats.record(&message, started, &result);
                    if let Err(e) = result {
                        self.status.deactivate(Failure { source: self.source(), action: "write" }, &e.to_string());
                        self.raft.report_unreachable(message.to);
                        self.close(&mut attached);
                    }
                }
            }
        }
    }

    async fn heartbeat(&self, attached: &mut Option<AttachedConn>) -> Result<(), StreamError> {
        let attached = attached.as_mut().ok_or(StreamError::Closed)?;
        if attached.last_write.elapsed() < self.heartbeat_interval {
            return Ok(());
        }
        attached.conn.write(heartbeat_frame(), self.write_timeout).await?;
        attached.last_write = Instant::now();
        Ok(())
    }

    async fn write(&self, attached: &mut Option<AttachedConn>, message: &Message) -> Result<(), StreamError> {
        let attached = attached.as_mut().ok_or(StreamError::Closed)?;
        let frame = attached.encoder.encode(message);
        attached.conn.write(frame, self.write_timeout).await?;
        attached.last_write = Instant::now();
        Ok(())
    }

    fn close(&mut self, attached: &mut Option<AttachedConn>) {
        let attached = match attached.take() {
            Some(attached) => attached,
            None => return,
        };
        attached.conn.close();

        let (msg_tx, msg_rx) = mpsc::channel(self.buf_size);
        {
            let mut outbox = self.outbox.lock().expect("StreamWriter outbox mutex guard poison");
            outbox.msgc = msg_tx;
            outbox.working = false;
        }
        let mut pending = std::mem::replace(&mut self.msgc, msg_rx);
        if pending.try_recv().is_ok() {
            self.raft.report_unreachable(self.peer_id);
        }

        slog::info!(self.logger, "Closed {} writer with peer {}", self.stream_type, self.peer_id);
    }

    fn source(&self) -> &'static str {
        match self.stream_type {
            StreamType::Message => "stream Message writer",
            StreamType::MsgAppV2 => "stream MsgApp v2 writer",
        }
    }
}
