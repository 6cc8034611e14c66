#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamRequest {
    #[prost(enumeration = "ProtoStreamType", tag = "1")]
    pub stream_type: i32,
    /// Sender of the request, i.e. the node reading the stream.
    #[prost(uint64, tag = "2")]
    pub from: u64,
    #[prost(uint64, tag = "3")]
    pub to: u64,
    #[prost(uint64, tag = "4")]
    pub cluster_id: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoEntry {
    #[prost(uint64, tag = "1")]
    pub term: u64,
    #[prost(uint64, tag = "2")]
    pub index: u64,
    #[prost(bytes = "vec", tag = "3")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSnapshotMetadata {
    #[prost(uint64, tag = "1")]
    pub index: u64,
    #[prost(uint64, tag = "2")]
    pub term: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoMessage {
    #[prost(enumeration = "ProtoMessageType", tag = "1")]
    pub msg_type: i32,
    #[prost(uint64, tag = "2")]
    pub to: u64,
    #[prost(uint64, tag = "3")]
    pub from: u64,
    #[prost(uint64, tag = "4")]
    pub term: u64,
    #[prost(uint64, tag = "5")]
    pub log_term: u64,
    #[prost(uint64, tag = "6")]
    pub index: u64,
    #[prost(message, repeated, tag = "7")]
    pub entries: ::prost::alloc::vec::Vec<ProtoEntry>,
    #[prost(uint64, tag = "8")]
    pub commit: u64,
    #[prost(message, optional, tag = "9")]
    pub snapshot: ::core::option::Option<ProtoSnapshotMetadata>,
    #[prost(bool, tag = "10")]
    pub reject: bool,
    #[prost(uint64, tag = "11")]
    pub reject_hint: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoLinkHeartbeat {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoAppEntries {
    #[prost(message, repeated, tag = "1")]
    pub entries: ::prost::alloc::vec::Vec<ProtoEntry>,
    #[prost(uint64, tag = "2")]
    pub commit: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamFrame {
    #[prost(oneof = "stream_frame::Frame", tags = "1, 2, 3")]
    pub frame: ::core::option::Option<stream_frame::Frame>,
}
/// Nested message and enum types in `StreamFrame`.
pub mod stream_frame {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Frame {
        #[prost(message, tag = "1")]
        Heartbeat(super::ProtoLinkHeartbeat),
        #[prost(message, tag = "2")]
        Message(super::ProtoMessage),
        #[prost(message, tag = "3")]
        AppEntries(super::ProtoAppEntries),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PipelineRequest {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub message: ::core::option::Option<ProtoMessage>,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PipelineAck {}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProtoSnapshotHeader {
    #[prost(uint64, tag = "1")]
    pub cluster_id: u64,
    #[prost(message, optional, tag = "2")]
    pub message: ::core::option::Option<ProtoMessage>,
    #[prost(uint64, tag = "3")]
    pub total_size: u64,
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SnapshotChunk {
    #[prost(oneof = "snapshot_chunk::Chunk", tags = "1, 2")]
    pub chunk: ::core::option::Option<snapshot_chunk::Chunk>,
}
/// Nested message and enum types in `SnapshotChunk`.
pub mod snapshot_chunk {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Chunk {
        #[prost(message, tag = "1")]
        Header(super::ProtoSnapshotHeader),
        #[prost(bytes, tag = "2")]
        Data(::prost::alloc::vec::Vec<u8>),
    }
}
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SnapshotAck {
    #[prost(uint64, tag = "1")]
    pub received_bytes: u64,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoStreamType {
    StreamTypeUnspecified = 0,
    StreamTypeMessage = 1,
    StreamTypeMsgAppV2 = 2,
}
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ProtoMessageType {
    MsgUnspecified = 0,
    MsgHup = 1,
    MsgBeat = 2,
    MsgProp = 3,
    MsgApp = 4,
    MsgAppResp = 5,
    MsgVote = 6,
    MsgVoteResp = 7,
    MsgSnap = 8,
    MsgHeartbeat = 9,
    MsgHeartbeatResp = 10,
    MsgUnreachable = 11,
    MsgSnapStatus = 12,
    MsgCheckQuorum = 13,
    MsgTransferLeader = 14,
    MsgTimeoutNow = 15,
}
#[doc = r" Generated client implementations."]
pub mod raft_transport_client {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    pub struct RaftTransportClient<T> {
        inner: tonic::client::Grpc<T>,
    }
    impl RaftTransportClient<tonic::transport::Channel> {
        #[doc = r" Attempt to create a new client by connecting to a given endpoint."]
        pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
        where
            D: std::convert::TryInto<tonic::transport::Endpoint>,
            D::Error: Into<StdError>,
        {
            let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
            Ok(Self::new(conn))
        }
    }
    impl<T> RaftTransportClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::ResponseBody: Body + HttpBody + Send + 'static,
        T::Error: Into<StdError>,
        <T::ResponseBody as HttpBody>::Error: Into<StdError> + Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = tonic::client::Grpc::with_interceptor(inner, interceptor);
            Self { inner }
        }
        #[doc = " Long-lived stream. The remote stream reader dials, the local stream writer writes."]
        pub async fn open_stream(
            &mut self,
            request: impl tonic::IntoRequest<super::StreamRequest>,
        ) -> Result<tonic::Response<tonic::codec::Streaming<super::StreamFrame>>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/rafthttp.RaftTransport/OpenStream");
            self.inner
                .server_streaming(request.into_request(), path, codec)
                .await
        }
        #[doc = " One-shot delivery used before a stream exists, and always for snapshot notifications."]
        pub async fn pipeline(
            &mut self,
            request: impl tonic::IntoRequest<super::PipelineRequest>,
        ) -> Result<tonic::Response<super::PipelineAck>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/rafthttp.RaftTransport/Pipeline");
            self.inner.unary(request.into_request(), path, codec).await
        }
        #[doc = " Bulk snapshot transfer. First chunk carries the header."]
        pub async fn send_snapshot(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::SnapshotChunk>,
        ) -> Result<tonic::Response<super::SnapshotAck>, tonic::Status> {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::new(
                    tonic::Code::Unknown,
                    format!("Service was not ready: {}", e.into()),
                )
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/rafthttp.RaftTransport/SendSnapshot");
            self.inner
                .client_streaming(request.into_streaming_request(), path, codec)
                .await
        }
    }
    impl<T: Clone> Clone for RaftTransportClient<T> {
        fn clone(&self) -> Self {
            Self {
                inner: self.inner.clone(),
            }
        }
    }
    impl<T> std::fmt::Debug for RaftTransportClient<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "RaftTransportClient {{ ... }}")
        }
    }
}
#[doc = r" Generated server implementations."]
pub mod raft_transport_server {
    #![allow(unused_variables, dead_code, missing_docs)]
    use tonic::codegen::*;
    #[doc = "Generated trait containing gRPC methods that should be implemented for use with RaftTransportServer."]
    #[async_trait]
    pub trait RaftTransport: Send + Sync + 'static {
        #[doc = "Server streaming response type for the OpenStream method."]
        type OpenStreamStream: futures_core::Stream<Item = Result<super::StreamFrame, tonic::Status>>
            + Send
            + Sync
            + 'static;
        #[doc = " Long-lived stream. The remote stream reader dials, the local stream writer writes."]
        async fn open_stream(
            &self,
            request: tonic::Request<super::StreamRequest>,
        ) -> Result<tonic::Response<Self::OpenStreamStream>, tonic::Status>;
        #[doc = " One-shot delivery used before a stream exists, and always for snapshot notifications."]
        async fn pipeline(
            &self,
            request: tonic::Request<super::PipelineRequest>,
        ) -> Result<tonic::Response<super::PipelineAck>, tonic::Status>;
        #[doc = " Bulk snapshot transfer. First chunk carries the header."]
        async fn send_snapshot(
            &self,
            request: tonic::Request<tonic::Streaming<super::SnapshotChunk>>,
        ) -> Result<tonic::Response<super::SnapshotAck>, tonic::Status>;
    }
    #[derive(Debug)]
    pub struct RaftTransportServer<T: RaftTransport> {
        inner: _Inner<T>,
    }
    struct _Inner<T>(Arc<T>, Option<tonic::Interceptor>);
    impl<T: RaftTransport> RaftTransportServer<T> {
        pub fn new(inner: T) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, None);
            Self { inner }
        }
        pub fn with_interceptor(inner: T, interceptor: impl Into<tonic::Interceptor>) -> Self {
            let inner = Arc::new(inner);
            let inner = _Inner(inner, Some(interceptor.into()));
            Self { inner }
        }
    }
    impl<T, B> Service<http::Request<B>> for RaftTransportServer<T>
    where
        T: RaftTransport,
        B: HttpBody + Send + Sync + 'static,
        B::Error: Into<StdError> + Send + 'static,
    {
        type Response = http::Response<tonic::body::BoxBody>;
        type Error = Never;
        type Future = BoxFuture<Self::Response, Self::Error>;
        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
        fn call(&mut self, req: http::Request<B>) -> Self::Future {
            let inner = self.inner.clone();
            match req.uri().path() {
                "/rafthttp.RaftTransport/OpenStream" => {
                    #[allow(non_camel_case_types)]
                    struct OpenStreamSvc<T: RaftTransport>(pub Arc<T>);
                    impl<T: RaftTransport>
                        tonic::server::ServerStreamingService<super::StreamRequest>
                        for OpenStreamSvc<T>
                    {
                        type Response = super::StreamFrame;
                        type ResponseStream = T::OpenStreamStream;
                        type Future =
                            BoxFuture<tonic::Response<Self::ResponseStream>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::StreamRequest>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).open_stream(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1;
                        let inner = inner.0;
                        let method = OpenStreamSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.server_streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/rafthttp.RaftTransport/Pipeline" => {
                    #[allow(non_camel_case_types)]
                    struct PipelineSvc<T: RaftTransport>(pub Arc<T>);
                    impl<T: RaftTransport> tonic::server::UnaryService<super::PipelineRequest> for PipelineSvc<T> {
                        type Response = super::PipelineAck;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<super::PipelineRequest>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).pipeline(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1.clone();
                        let inner = inner.0;
                        let method = PipelineSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.unary(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                "/rafthttp.RaftTransport/SendSnapshot" => {
                    #[allow(non_camel_case_types)]
                    struct SendSnapshotSvc<T: RaftTransport>(pub Arc<T>);
                    impl<T: RaftTransport>
                        tonic::server::ClientStreamingService<super::SnapshotChunk>
                        for SendSnapshotSvc<T>
                    {
                        type Response = super::SnapshotAck;
                        type Future = BoxFuture<tonic::Response<Self::Response>, tonic::Status>;
                        fn call(
                            &mut self,
                            request: tonic::Request<tonic::Streaming<super::SnapshotChunk>>,
                        ) -> Self::Future {
                            let inner = self.0.clone();
                            let fut = async move { (*inner).send_snapshot(request).await };
                            Box::pin(fut)
                        }
                    }
                    let inner = self.inner.clone();
                    let fut = async move {
                        let interceptor = inner.1;
                        let inner = inner.0;
                        let method = SendSnapshotSvc(inner);
                        let codec = tonic::codec::ProstCodec::default();
                        let mut grpc = if let Some(interceptor) = interceptor {
                            tonic::server::Grpc::with_interceptor(codec, interceptor)
                        } else {
                            tonic::server::Grpc::new(codec)
                        };
                        let res = grpc.client_streaming(method, req).await;
                        Ok(res)
                    };
                    Box::pin(fut)
                }
                _ => Box::pin(async move {
                    Ok(http::Response::builder()
                        .status(200)
                        .header("grpc-status", "12")
                        .header("content-type", "application/grpc")
                        .body(tonic::body::BoxBody::empty())
                        .unwrap())
                }),
            }
        }
    }
    impl<T: RaftTransport> Clone for RaftTransportServer<T> {
        fn clone(&self) -> Self {
            let inner = self.inner.clone();
            Self { inner }
        }
    }
    impl<T: RaftTransport> Clone for _Inner<T> {
        fn clone(&self) -> Self {
            Self(self.0.clone(), self.1.clone())
        }
    }
    impl<T: std::fmt::Debug> std::fmt::Debug for _Inner<T> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }
    impl<T: RaftTransport> tonic::transport::NamedService for RaftTransportServer<T> {
        const NAME: &'static str = "rafthttp.RaftTransport";
    }
}
