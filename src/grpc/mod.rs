//! Native adapter: forwards the uniform operations to a gRPC agent.
//!
//! The agent speaks the uniform contract already, so requests and responses
//! pass through untouched; [`ProtoCodec`] only changes their encoding. The
//! rest of the work is attaching the caller's agent headers as gRPC metadata
//! and relaying server streams.

mod client;
mod codec;
pub mod descriptor;

pub use client::{GrpcClient, GrpcConnector};
pub use codec::ProtoCodec;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use tonic::metadata::{AsciiMetadataKey, AsciiMetadataValue};
use tonic::{Request, Response, Status};
use tracing::{debug, warn};

use crate::connection::{ConnectError, LazyConnection};
use crate::error::{GatewayError, GatewayResult};
use crate::headers::CallContext;
use crate::service::{relay, A2AService, EventStream};
use crate::types::*;

/// Server-streaming response body as delivered by a [`NativeClient`].
pub type NativeStream = BoxStream<'static, Result<StreamResponse, Status>>;

/// A client for `a2a.v1.A2AService`.
///
/// [`GrpcClient`] is the real one; tests substitute their own.
#[async_trait]
pub trait NativeClient: Send + Sync + 'static {
    async fn send_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<Response<SendMessageResponse>, Status>;

    async fn send_streaming_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<Response<NativeStream>, Status>;

    async fn get_task(&self, request: Request<GetTaskRequest>) -> Result<Response<Task>, Status>;

    async fn list_tasks(
        &self,
        request: Request<ListTasksRequest>,
    ) -> Result<Response<ListTasksResponse>, Status>;

    async fn cancel_task(&self, request: Request<CancelTaskRequest>)
        -> Result<Response<Task>, Status>;

    async fn task_subscription(
        &self,
        request: Request<TaskSubscriptionRequest>,
    ) -> Result<Response<NativeStream>, Status>;

    async fn create_task_push_notification_config(
        &self,
        request: Request<CreateTaskPushNotificationConfigRequest>,
    ) -> Result<Response<TaskPushNotificationConfig>, Status>;

    async fn get_task_push_notification_config(
        &self,
        request: Request<GetTaskPushNotificationConfigRequest>,
    ) -> Result<Response<TaskPushNotificationConfig>, Status>;

    async fn list_task_push_notification_config(
        &self,
        request: Request<ListTaskPushNotificationConfigRequest>,
    ) -> Result<Response<ListTaskPushNotificationConfigResponse>, Status>;

    async fn delete_task_push_notification_config(
        &self,
        request: Request<DeleteTaskPushNotificationConfigRequest>,
    ) -> Result<Response<Empty>, Status>;

    async fn get_agent_card(
        &self,
        request: Request<GetAgentCardRequest>,
    ) -> Result<Response<AgentCard>, Status>;
}

/// Produces the [`NativeClient`] a [`GrpcProxy`] uses. Called at most once
/// per successful connection.
#[async_trait]
pub trait NativeConnector: Send + Sync + 'static {
    type Client: NativeClient;

    async fn connect(&self) -> Result<Self::Client, ConnectError>;
}

/// [`A2AService`] backed by a gRPC agent.
pub struct GrpcProxy<K: NativeConnector> {
    connector: Arc<K>,
    conn: LazyConnection<K::Client>,
}

impl<K: NativeConnector> std::fmt::Debug for GrpcProxy<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrpcProxy").finish_non_exhaustive()
    }
}

impl<K: NativeConnector> GrpcProxy<K> {
    pub fn new(connector: K) -> Self {
        Self {
            connector: Arc::new(connector),
            conn: LazyConnection::new(),
        }
    }

    async fn client(&self) -> GatewayResult<Arc<K::Client>> {
        let connector = Arc::clone(&self.connector);
        let client = self
            .conn
            .get_or_connect(|| async move { connector.connect().await })
            .await?;
        Ok(client)
    }
}

/// Wraps `message` in a request carrying the caller's agent headers as
/// metadata.
pub fn outbound<T>(ctx: &CallContext, message: T) -> Request<T> {
    let mut request = Request::new(message);
    let Some(headers) = ctx.agent_headers() else {
        return request;
    };
    for (key, value) in headers {
        let name = match AsciiMetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                warn!(header = %key, "skipping agent header with an invalid metadata key");
                continue;
            }
        };
        let value = match AsciiMetadataValue::try_from(value.as_str()) {
            Ok(value) => value,
            Err(_) => {
                warn!(header = %key, "skipping agent header with an invalid metadata value");
                continue;
            }
        };
        request.metadata_mut().append(name, value);
    }
    request
}

fn stream_events(label: &'static str, response: Response<NativeStream>) -> EventStream {
    relay(
        label,
        response.into_inner(),
        |event| Ok(event),
        |status| Some(GatewayError::from(status)),
    )
}

#[async_trait]
impl<K: NativeConnector> A2AService for GrpcProxy<K> {
    async fn send_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<SendMessageResponse> {
        let client = self.client().await?;
        let response = client.send_message(outbound(ctx, req)).await?;
        Ok(response.into_inner())
    }

    async fn send_streaming_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<EventStream> {
        let client = self.client().await?;
        let response = client.send_streaming_message(outbound(ctx, req)).await?;
        debug!("native message stream opened");
        Ok(stream_events("SendStreamingMessage", response))
    }

    async fn get_task(&self, ctx: &CallContext, req: GetTaskRequest) -> GatewayResult<Task> {
        let client = self.client().await?;
        Ok(client.get_task(outbound(ctx, req)).await?.into_inner())
    }

    async fn list_tasks(
        &self,
        ctx: &CallContext,
        req: ListTasksRequest,
    ) -> GatewayResult<ListTasksResponse> {
        let client = self.client().await?;
        Ok(client.list_tasks(outbound(ctx, req)).await?.into_inner())
    }

    async fn cancel_task(&self, ctx: &CallContext, req: CancelTaskRequest) -> GatewayResult<Task> {
        let client = self.client().await?;
        Ok(client.cancel_task(outbound(ctx, req)).await?.into_inner())
    }

    async fn task_subscription(
        &self,
        ctx: &CallContext,
        req: TaskSubscriptionRequest,
    ) -> GatewayResult<EventStream> {
        let client = self.client().await?;
        let response = client.task_subscription(outbound(ctx, req)).await?;
        debug!("native task subscription opened");
        Ok(stream_events("TaskSubscription", response))
    }

    async fn create_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: CreateTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig> {
        let client = self.client().await?;
        let response = client
            .create_task_push_notification_config(outbound(ctx, req))
            .await?;
        Ok(response.into_inner())
    }

    async fn get_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: GetTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig> {
        let client = self.client().await?;
        let response = client
            .get_task_push_notification_config(outbound(ctx, req))
            .await?;
        Ok(response.into_inner())
    }

    async fn list_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: ListTaskPushNotificationConfigRequest,
    ) -> GatewayResult<ListTaskPushNotificationConfigResponse> {
        let client = self.client().await?;
        let response = client
            .list_task_push_notification_config(outbound(ctx, req))
            .await?;
        Ok(response.into_inner())
    }

    async fn delete_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: DeleteTaskPushNotificationConfigRequest,
    ) -> GatewayResult<Empty> {
        let client = self.client().await?;
        let response = client
            .delete_task_push_notification_config(outbound(ctx, req))
            .await?;
        Ok(response.into_inner())
    }

    async fn get_agent_card(
        &self,
        ctx: &CallContext,
        req: GetAgentCardRequest,
    ) -> GatewayResult<AgentCard> {
        let client = self.client().await?;
        Ok(client.get_agent_card(outbound(ctx, req)).await?.into_inner())
    }
}
