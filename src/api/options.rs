use std::convert::TryFrom;
use tokio::time::Duration;

/// Tuning knobs for the peer transport. Every field is optional; unset fields take the defaults
/// listed on `TransportOptionsValidated`.
#[derive(Clone, Debug, Default)]
pub struct TransportOptions {
    pub conn_read_timeout: Option<Duration>,
    pub conn_write_timeout: Option<Duration>,
    pub stream_buf_size: Option<usize>,
    pub pipeline_buf_size: Option<usize>,
    pub connection_per_pipeline: Option<usize>,
    pub recv_buf_size: Option<usize>,
    pub max_pending_proposals: Option<usize>,
    pub dial_backoff_initial: Option<Duration>,
    pub dial_backoff_max: Option<Duration>,
    pub snapshot_chunk_size: Option<usize>,
}

#[derive(Clone, Debug)]
pub(crate) struct TransportOptionsValidated {
    // 5s is long enough to absorb scheduling jitter and short enough to recycle a dead
    // connection well before an election timeout. TCP keepalive takes minutes.
    pub conn_read_timeout: Duration,
    pub conn_write_timeout: Duration,
    pub stream_buf_size: usize,
    pub pipeline_buf_size: usize,
    pub connection_per_pipeline: usize,
    pub recv_buf_size: usize,
    // Holds proposals during one leader election. An election takes at most ~1s with 0-2
    // conflicts, and we assume fewer than 4096 concurrent proposers.
    pub max_pending_proposals: usize,
    pub dial_backoff_initial: Duration,
    pub dial_backoff_max: Duration,
    pub snapshot_chunk_size: usize,
}

impl TransportOptionsValidated {
    /// Idle streams write a keepalive frame this often.
    pub(crate) fn heartbeat_interval(&self) -> Duration {
        self.conn_read_timeout / 3
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.conn_read_timeout.as_millis() < 3 || self.conn_write_timeout.as_millis() == 0 {
            return Err("Connection timeouts must be at least a few milliseconds");
        }
        if self.stream_buf_size == 0 || self.pipeline_buf_size == 0 {
            return Err("Outbound buffer sizes must be non-zero");
        }
        if self.recv_buf_size == 0 || self.max_pending_proposals == 0 {
            return Err("Inbound buffer sizes must be non-zero");
        }
        if self.connection_per_pipeline == 0 {
            return Err("Pipeline needs at least one connection");
        }
        if self.dial_backoff_initial.as_millis() == 0 {
            return Err("Initial dial backoff must be at least a millisecond");
        }
        if self.dial_backoff_initial > self.dial_backoff_max {
            return Err("Initial dial backoff must not exceed the maximum dial backoff");
        }
        if self.snapshot_chunk_size == 0 {
            return Err("Snapshot chunk size must be non-zero");
        }

        Ok(())
    }
}

impl Default for TransportOptionsValidated {
    fn default() -> Self {
        TransportOptionsValidated {
            conn_read_timeout: Duration::from_secs(5),
            conn_write_timeout: Duration::from_secs(5),
            stream_buf_size: 4096,
            pipeline_buf_size: 64,
            connection_per_pipeline: 4,
            recv_buf_size: 4096,
            max_pending_proposals: 4096,
            dial_backoff_initial: Duration::from_millis(100),
            dial_backoff_max: Duration::from_secs(1),
            snapshot_chunk_size: 64 * 1024,
        }
    }
}

impl TryFrom<TransportOptions> for TransportOptionsValidated {
    type Error = &'static str;

    fn try_from(options: TransportOptions) -> Result<Self, Self::Error> {
        let defaults = TransportOptionsValidated::default();
        let values = TransportOptionsValidated {
            conn_read_timeout: options.conn_read_timeout.unwrap_or(defaults.conn_read_timeout),
            conn_write_timeout: options.conn_write_timeout.unwrap_or(defaults.conn_write_timeout),
            stream_buf_size: options.stream_buf_size.unwrap_or(defaults.stream_buf_size),
            pipeline_buf_size: options.pipeline_buf_size.unwrap_or(defaults.pipeline_buf_size),
            connection_per_pipeline: options
                .connection_per_pipeline
                .unwrap_or(defaults.connection_per_pipeline),
            recv_buf_size: options.recv_buf_size.unwrap_or(defaults.recv_buf_size),
            max_pending_proposals: options.max_pending_proposals.unwrap_or(defaults.max_pending_proposals),
            dial_backoff_initial: options.dial_backoff_initial.unwrap_or(defaults.dial_backoff_initial),
            dial_backoff_max: options.dial_backoff_max.unwrap_or(defaults.dial_backoff_max),
            snapshot_chunk_size: options.snapshot_chunk_size.unwrap_or(defaults.snapshot_chunk_size),
        };

        values.validate()?;
        Ok(values)
    }
}
