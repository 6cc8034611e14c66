use crate::api::{Message, PeerId, ProcessError, Raft, SnapshotStore};
use crate::codec::{decode_message, DecodeError, StreamType};
use crate::grpc::raft_transport_server::{RaftTransport, RaftTransportServer};
use crate::grpc::{
    snapshot_chunk, PipelineAck, PipelineRequest, ProtoSnapshotHeader, SnapshotAck, SnapshotChunk, StreamFrame,
    StreamRequest,
};
use crate::peer::OutgoingConn;
use crate::server::RpcServerShutdownSignal;
use crate::transport::PeerRegistry;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

// Frames buffered between a stream writer and the connection.
const OUTGOING_CONN_BUF_FRAMES: usize = 16;

/// RpcServer is the type that implements the peer transport gRPC interface: the stream endpoint
/// remote readers dial, the pipeline endpoint, and the snapshot endpoint.
pub(crate) struct RpcServer {
    logger: slog::Logger,
    local_id: PeerId,
    cluster_id: u64,
    peers: PeerRegistry,
    raft: Arc<dyn Raft>,
    snapshot_store: Arc<dyn SnapshotStore>,
    ctx: CancellationToken,
}

impl RpcServer {
    pub(crate) fn new(
        logger: slog::Logger,
        local_id: PeerId,
        cluster_id: u64,
        peers: PeerRegistry,
        raft: Arc<dyn Raft>,
        snapshot_store: Arc<dyn SnapshotStore>,
        ctx: CancellationToken,
    ) -> Self {
        RpcServer {
            logger,
            local_id,
            cluster_id,
            peers,
            raft,
            snapshot_store,
            ctx,
        }
    }

    pub(crate) async fn run(self, listener: TcpListener, shutdown_signal: RpcServerShutdownSignal) {
        let logger = self.logger.clone();
        slog::info!(logger, "Listening on '{:?}'", listener.local_addr());

        let result = Server::builder()
            .add_service(RaftTransportServer::new(self))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown_signal)
            .await;

        slog::info!(logger, "Server run() has exited: {:?}", result);
    }

    fn check_cluster_id(&self, cluster_id: u64) -> Result<(), Status> {
        if cluster_id != self.cluster_id {
            slog::warn!(
                self.logger,
                "Rejected request with cluster ID {:x}; local cluster ID is {:x}",
                cluster_id,
                self.cluster_id
            );
            return Err(Status::failed_precondition("cluster ID mismatch"));
        }
        Ok(())
    }

    fn check_not_removed(&self, from: PeerId) -> Result<(), Status> {
        if self.peers.is_removed(from) {
            slog::warn!(self.logger, "Rejected request from removed member {}", from);
            return Err(Status::permission_denied(format!("member {} was removed", from)));
        }
        Ok(())
    }

    async fn handle_open_stream(&self, rpc_request: StreamRequest) -> Result<ReceiverStream<Result<StreamFrame, Status>>, Status> {
        self.check_cluster_id(rpc_request.cluster_id)?;

        if rpc_request.to != self.local_id.as_u64() {
            slog::warn!(
                self.logger,
                "Rejected stream addressed to {}; local member is {}",
                PeerId::new(rpc_request.to),
                self.local_id
            );
            return Err(Status::invalid_argument("stream addressed to another member"));
        }

        let stream_type = StreamType::from_proto(rpc_request.stream_type).map_err(|e| {
            slog::error!(self.logger, "Rejected stream request: {}", e);
            invalid_argument(e)
        })?;

        let from = PeerId::new(rpc_request.from);
        let peer = match self.peers.get(from) {
            Some(peer) => peer,
            None => {
                self.check_not_removed(from)?;
                slog::warn!(self.logger, "Rejected {} from unknown peer {}", stream_type, from);
                return Err(Status::not_found(format!("peer {} not found", from)));
            }
        };

        let (tx, rx) = mpsc::channel(OUTGOING_CONN_BUF_FRAMES);
        peer.attach_outgoing_conn(OutgoingConn::new(stream_type, tx)).await;

        Ok(ReceiverStream::new(rx))
    }

    async fn handle_pipeline(&self, rpc_request: PipelineRequest) -> Result<PipelineAck, Status> {
        self.check_cluster_id(rpc_request.cluster_id)?;
        let message = Self::convert_message(rpc_request.message)?;
        self.check_not_removed(message.from)?;
        self.process(message).await?;
        Ok(PipelineAck {})
    }

    async fn handle_send_snapshot(&self, mut chunks: Streaming<SnapshotChunk>) -> Result<SnapshotAck, Status> {
        let header = match chunks.message().await? {
            Some(SnapshotChunk {
                chunk: Some(snapshot_chunk::Chunk::Header(header)),
            }) => header,
            _ => return Err(invalid_argument(DecodeError::MissingSnapshotHeader)),
        };
        let ProtoSnapshotHeader {
            cluster_id,
            message,
            total_size,
        } = header;
        self.check_cluster_id(cluster_id)?;

        let message = Self::convert_message(message)?;
        self.check_not_removed(message.from)?;
        if !message.is_snapshot() {
            return Err(Status::invalid_argument("snapshot header must carry a snapshot message"));
        }
        let metadata = message.snapshot.unwrap_or_default();
        slog::info!(
            self.logger,
            "Receiving snapshot [index: {}, from: {}, size: {}]",
            metadata.index,
            message.from,
            total_size
        );

        let mut sink = self
            .snapshot_store
            .create_sink(metadata, total_size)
            .await
            .map_err(|e| Status::internal(format!("failed to create snapshot sink: {}", e)))?;

        let mut received = 0u64;
        while let Some(chunk) = chunks.message().await? {
            let data = match chunk.chunk {
                Some(snapshot_chunk::Chunk::Data(data)) => data,
                _ => return Err(Status::invalid_argument("expected snapshot data chunk")),
            };
            received += data.len() as u64;
            if received > total_size {
                return Err(Status::invalid_argument("snapshot exceeds announced size"));
            }
            sink.write_all(&data)
                .await
                .map_err(|e| Status::internal(format!("failed to save snapshot: {}", e)))?;
        }
        if received != total_size {
            return Err(Status::invalid_argument(format!(
                "snapshot ended after {} of {} bytes",
                received, total_size
            )));
        }
        sink.shutdown()
            .await
            .map_err(|e| Status::internal(format!("failed to save snapshot: {}", e)))?;

        slog::info!(
            self.logger,
            "Received snapshot [index: {}, from: {}]",
            metadata.index,
            message.from
        );
        self.process(message).await?;

        Ok(SnapshotAck {
            received_bytes: received,
        })
    }

    fn convert_message(proto: Option<crate::grpc::ProtoMessage>) -> Result<Message, Status> {
        let proto = proto.ok_or_else(|| Status::invalid_argument("missing message"))?;
        decode_message(proto).map_err(invalid_argument)
    }

    async fn process(&self, message: Message) -> Result<(), Status> {
        let msg_type = message.msg_type;
        self.raft.process(&self.ctx, message).await.map_err(|e| {
            slog::warn!(self.logger, "Failed to process raft message {:?}: {}", msg_type, e);
            match e {
                ProcessError::RemovedMember(_) => Status::permission_denied(e.to_string()),
                _ => Status::internal(e.to_string()),
            }
        })
    }
}

fn invalid_argument(e: DecodeError) -> Status {
    Status::invalid_argument(e.to_string())
}

#[async_trait::async_trait]
impl RaftTransport for RpcServer {
    type OpenStreamStream = ReceiverStream<Result<StreamFrame, Status>>;

    async fn open_stream(
        &self,
        rpc_request_wrapped: Request<StreamRequest>,
    ) -> Result<Response<Self::OpenStreamStream>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        self.handle_open_stream(rpc_request).await.map(Response::new)
    }

    async fn pipeline(&self, rpc_request_wrapped: Request<PipelineRequest>) -> Result<Response<PipelineAck>, Status> {
        let rpc_request = rpc_request_wrapped.into_inner();

        slog::debug!(self.logger, "ServerWire - {:?}", rpc_request);
        let rpc_result = self.handle_pipeline(rpc_request).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }

    async fn send_snapshot(
        &self,
        rpc_request_wrapped: Request<Streaming<SnapshotChunk>>,
    ) -> Result<Response<SnapshotAck>, Status> {
        let rpc_result = self.handle_send_snapshot(rpc_request_wrapped.into_inner()).await;
        slog::debug!(self.logger, "ServerWire - {:?}", rpc_result);

        rpc_result.map(Response::new)
    }
}
