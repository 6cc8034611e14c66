use crate::codec::StreamType;
use crate::grpc::StreamFrame;
use crate::peer::errors::StreamError;
use tokio::sync::mpsc;
use tokio::time::Duration;

/// OutgoingConn is the write half of a stream the remote peer opened to us. It is created by the
/// stream handler and handed to the peer, which passes it to the stream writer of the same type.
/// From then on the writer owns it and is the only one that closes it.
#[derive(Debug)]
pub(crate) struct OutgoingConn {
    stream_type: StreamType,
    sender: mpsc::Sender<Result<StreamFrame, tonic::Status>>,
}

impl OutgoingConn {
    pub(crate) fn new(stream_type: StreamType, sender: mpsc::Sender<Result<StreamFrame, tonic::Status>>) -> Self {
        OutgoingConn { stream_type, sender }
    }

    pub(crate) fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    /// Write one frame. The write deadline is applied to each frame separately.
    pub(crate) async fn write(&self, frame: StreamFrame, timeout: Duration) -> Result<(), StreamError> {
        match tokio::time::timeout(timeout, self.sender.send(Ok(frame))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(StreamError::Closed),
            Err(_) => Err(StreamError::WriteTimeout),
        }
    }

    /// Ends the response stream, which the remote reader observes as the stream closing.
    pub(crate) fn close(self) {
        drop(self.sender);
    }
}
