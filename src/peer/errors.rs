use crate::codec::DecodeError;
use tonic::codegen::http::uri;

/// Failures on a long-lived stream. All of them end the connection; none of them end the
/// component that owned it.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StreamError {
    #[error("peer has no URL to dial")]
    NoUrl,
    #[error("invalid peer URL: {0}")]
    InvalidUrl(#[from] uri::InvalidUri),
    #[error("dial failed: {0}")]
    Dial(#[from] tonic::transport::Error),
    #[error("dial timed out")]
    DialTimeout,
    #[error("remote rejected stream: {0}")]
    Rejected(tonic::Status),
    #[error("read failed: {0}")]
    Read(tonic::Status),
    #[error("read timed out")]
    ReadTimeout,
    #[error("write timed out")]
    WriteTimeout,
    #[error("connection closed")]
    Closed,
    #[error("undecodable frame: {0}")]
    Decode(#[from] DecodeError),
}

/// Failures of a one-shot delivery (pipeline or snapshot).
#[derive(Debug, thiserror::Error)]
pub(crate) enum SendError {
    #[error("peer has no URL to dial")]
    NoUrl,
    #[error("invalid peer URL: {0}")]
    InvalidUrl(#[from] uri::InvalidUri),
    #[error("dial failed: {0}")]
    Dial(#[from] tonic::transport::Error),
    #[error("request failed: {0}")]
    Rpc(#[from] tonic::Status),
    #[error("request timed out")]
    Timeout,
    #[error("failed to read snapshot payload: {0}")]
    SnapshotRead(#[from] std::io::Error),
    #[error("snapshot payload ended after {read} of {expected} bytes")]
    SnapshotTruncated { read: u64, expected: u64 },
    #[error("stopped")]
    Stopped,
}
