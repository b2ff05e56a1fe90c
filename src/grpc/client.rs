//! The concrete gRPC backend: a `tonic` channel plus the protobuf codec.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use prost_reflect::ServiceDescriptor;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Response, Status};

use crate::config::{NativeTarget, TransportConfig};
use crate::connection::ConnectError;
use crate::types::*;

use super::codec::ProtoCodec;
use super::descriptor::a2a_service;
use super::{NativeClient, NativeConnector, NativeStream};

const SEND_MESSAGE: &str = "SendMessage";
const SEND_STREAMING_MESSAGE: &str = "SendStreamingMessage";
const GET_TASK: &str = "GetTask";
const LIST_TASKS: &str = "ListTasks";
const CANCEL_TASK: &str = "CancelTask";
const TASK_SUBSCRIPTION: &str = "TaskSubscription";
const CREATE_PUSH_CONFIG: &str = "CreateTaskPushNotificationConfig";
const GET_PUSH_CONFIG: &str = "GetTaskPushNotificationConfig";
const LIST_PUSH_CONFIGS: &str = "ListTaskPushNotificationConfig";
const DELETE_PUSH_CONFIG: &str = "DeleteTaskPushNotificationConfig";
const GET_AGENT_CARD: &str = "GetAgentCard";

/// Dials the agent named by a [`NativeTarget`].
#[derive(Debug, Clone)]
pub struct GrpcConnector {
    target: NativeTarget,
    config: TransportConfig,
}

impl GrpcConnector {
    pub fn new(target: NativeTarget, config: TransportConfig) -> Self {
        Self { target, config }
    }

    fn endpoint(&self) -> Result<Endpoint, ConnectError> {
        let uri = self.target.uri();
        let endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ConnectError::new(format!("invalid gRPC target {uri}: {e}")))?
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout);

        if self.target.loopback {
            return Ok(endpoint);
        }
        endpoint
            .tls_config(ClientTlsConfig::new().with_webpki_roots())
            .map_err(|e| ConnectError::new(format!("TLS setup for {uri} failed: {e}")))
    }
}

#[async_trait]
impl NativeConnector for GrpcConnector {
    type Client = GrpcClient;

    async fn connect(&self) -> Result<GrpcClient, ConnectError> {
        let service = a2a_service().map_err(|e| ConnectError::new(e.to_string()))?;
        let endpoint = self.endpoint()?;
        tracing::debug!(
            target_uri = %endpoint.uri(),
            tls = !self.target.loopback,
            "dialing gRPC agent"
        );
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ConnectError::new(format!("{}: {e}", self.target.authority)))?;
        Ok(GrpcClient::new(channel, service, &self.config))
    }
}

/// `a2a.v1.A2AService` client over a shared channel.
#[derive(Debug, Clone)]
pub struct GrpcClient {
    inner: tonic::client::Grpc<Channel>,
    service: ServiceDescriptor,
    static_metadata: Arc<Vec<(AsciiMetadataKey, AsciiMetadataValue)>>,
}

impl GrpcClient {
    pub fn new(channel: Channel, service: ServiceDescriptor, config: &TransportConfig) -> Self {
        let static_metadata = config
            .headers
            .iter()
            .filter_map(|(key, value)| {
                let key = AsciiMetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes()).ok()?;
                let value = AsciiMetadataValue::try_from(value.as_str()).ok()?;
                Some((key, value))
            })
            .collect();
        Self {
            inner: tonic::client::Grpc::new(channel),
            service,
            static_metadata: Arc::new(static_metadata),
        }
    }

    /// Path and codec for one method of the service.
    fn method<Req, Resp>(
        &self,
        name: &str,
    ) -> Result<(PathAndQuery, ProtoCodec<Req, Resp>), Status> {
        let service = self.service.full_name();
        let method = self
            .service
            .methods()
            .find(|m| m.name() == name)
            .ok_or_else(|| Status::unimplemented(format!("{service} has no method {name}")))?;
        let path = PathAndQuery::try_from(format!("/{service}/{name}"))
            .map_err(|e| Status::internal(format!("invalid path for {name}: {e}")))?;
        Ok((path, ProtoCodec::new(method.input(), method.output())))
    }

    async fn ready<T>(
        &self,
        mut request: Request<T>,
    ) -> Result<(tonic::client::Grpc<Channel>, Request<T>), Status> {
        let mut grpc = self.inner.clone();
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("service was not ready: {e}")))?;
        for (key, value) in self.static_metadata.iter() {
            request.metadata_mut().insert(key.clone(), value.clone());
        }
        Ok((grpc, request))
    }

    async fn unary<Req, Resp>(
        &self,
        request: Request<Req>,
        name: &str,
    ) -> Result<Response<Resp>, Status>
    where
        Req: Serialize + Send + Sync + 'static,
        Resp: DeserializeOwned + Send + Sync + 'static,
    {
        let (path, codec) = self.method::<Req, Resp>(name)?;
        let (mut grpc, request) = self.ready(request).await?;
        grpc.unary(request, path, codec).await
    }

    async fn server_streaming<Req>(
        &self,
        request: Request<Req>,
        name: &str,
    ) -> Result<Response<NativeStream>, Status>
    where
        Req: Serialize + Send + Sync + 'static,
    {
        let (path, codec) = self.method::<Req, StreamResponse>(name)?;
        let (mut grpc, request) = self.ready(request).await?;
        let response = grpc.server_streaming(request, path, codec).await?;
        Ok(response.map(|stream| stream.boxed()))
    }
}

#[async_trait]
impl NativeClient for GrpcClient {
    async fn send_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<Response<SendMessageResponse>, Status> {
        self.unary(request, SEND_MESSAGE).await
    }

    async fn send_streaming_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<Response<NativeStream>, Status> {
        self.server_streaming(request, SEND_STREAMING_MESSAGE).await
    }

    async fn get_task(&self, request: Request<GetTaskRequest>) -> Result<Response<Task>, Status> {
        self.unary(request, GET_TASK).await
    }

    async fn list_tasks(
        &self,
        request: Request<ListTasksRequest>,
    ) -> Result<Response<ListTasksResponse>, Status> {
        self.unary(request, LIST_TASKS).await
    }

    async fn cancel_task(
        &self,
        request: Request<CancelTaskRequest>,
    ) -> Result<Response<Task>, Status> {
        self.unary(request, CANCEL_TASK).await
    }

    async fn task_subscription(
        &self,
        request: Request<TaskSubscriptionRequest>,
    ) -> Result<Response<NativeStream>, Status> {
        self.server_streaming(request, TASK_SUBSCRIPTION).await
    }

    async fn create_task_push_notification_config(
        &self,
        request: Request<CreateTaskPushNotificationConfigRequest>,
    ) -> Result<Response<TaskPushNotificationConfig>, Status> {
        self.unary(request, CREATE_PUSH_CONFIG).await
    }

    async fn get_task_push_notification_config(
        &self,
        request: Request<GetTaskPushNotificationConfigRequest>,
    ) -> Result<Response<TaskPushNotificationConfig>, Status> {
        self.unary(request, GET_PUSH_CONFIG).await
    }

    async fn list_task_push_notification_config(
        &self,
        request: Request<ListTaskPushNotificationConfigRequest>,
    ) -> Result<Response<ListTaskPushNotificationConfigResponse>, Status> {
        self.unary(request, LIST_PUSH_CONFIGS).await
    }

    async fn delete_task_push_notification_config(
        &self,
        request: Request<DeleteTaskPushNotificationConfigRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.unary(request, DELETE_PUSH_CONFIG).await
    }

    async fn get_agent_card(
        &self,
        request: Request<GetAgentCardRequest>,
    ) -> Result<Response<AgentCard>, Status> {
        self.unary(request, GET_AGENT_CARD).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentEndpoint, Transport};

    fn connector(address: &str) -> GrpcConnector {
        let endpoint = AgentEndpoint::new(address, Transport::Native).unwrap();
        GrpcConnector::new(endpoint.native_target(), TransportConfig::default())
    }

    #[test]
    fn loopback_endpoint_is_plaintext() {
        let endpoint = connector("localhost:50051").endpoint().unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("http"));
    }

    #[test]
    fn remote_endpoint_uses_tls() {
        let endpoint = connector("agent.example.com:443").endpoint().unwrap();
        assert_eq!(endpoint.uri().scheme_str(), Some("https"));
    }

    #[tokio::test]
    async fn unreachable_agent_is_a_connect_error() {
        let err = connector("127.0.0.1:1").connect().await.unwrap_err();
        assert!(err.to_string().contains("127.0.0.1:1"));
    }
}
