//! Dialect adapter: serves the uniform operations from an A2A JSON-RPC agent.
//!
//! Each unary operation converts the request into JSON-RPC params, calls the
//! agent, and converts the result back. Conversion failures on the way in are
//! the caller's fault (`invalid_argument`); on the way out they are ours
//! (`internal`). Errors reported by the agent go through
//! [`translate_backend_error`].

pub mod card_resolver;
pub mod client;
pub mod convert;
pub mod error;
pub mod sse;
pub mod transport;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::TransportConfig;
use crate::connection::{ConnectError, LazyConnection};
use crate::error::{translate_backend_error, Code, GatewayError, GatewayResult};
use crate::headers::CallContext;
use crate::service::{relay, A2AService, EventStream};
use crate::types::*;

use self::client::A2AClient;
use self::convert::ConversionError;
use self::error::A2AError;
use self::sse::SseStream;

/// [`A2AService`] backed by a JSON-RPC agent.
#[derive(Debug)]
pub struct JsonRpcProxy {
    endpoint: String,
    config: TransportConfig,
    client: LazyConnection<A2AClient>,
}

impl JsonRpcProxy {
    /// Proxy for the agent at `endpoint`, a full `http(s)://` URL.
    pub fn new(endpoint: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            client: LazyConnection::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn client(&self) -> GatewayResult<Arc<A2AClient>> {
        let endpoint = self.endpoint.clone();
        let config = self.config.clone();
        let client = self
            .client
            .get_or_connect(|| async move {
                A2AClient::connect(&endpoint, &config).map_err(|e| ConnectError::new(e.to_string()))
            })
            .await?;
        Ok(client)
    }
}

fn invalid_request(err: ConversionError) -> GatewayError {
    GatewayError::invalid_argument(err.to_string())
}

fn invalid_response(err: ConversionError) -> GatewayError {
    GatewayError::internal(format!("failed to convert agent response: {err}"))
}

fn backend(err: A2AError) -> GatewayError {
    translate_backend_error(err)
        .unwrap_or_else(|| GatewayError::new(Code::Unknown, "agent closed the call without a result"))
}

fn stream_events(label: &'static str, upstream: SseStream) -> EventStream {
    relay(
        label,
        upstream,
        |event| convert::stream_response(event).map_err(invalid_response),
        translate_backend_error,
    )
}

#[async_trait]
impl A2AService for JsonRpcProxy {
    async fn send_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<SendMessageResponse> {
        let params = convert::send_message_params(req).map_err(invalid_request)?;
        let client = self.client().await?;
        let result = client.send_message(ctx, &params).await.map_err(backend)?;
        convert::send_message_response(result).map_err(invalid_response)
    }

    async fn send_streaming_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<EventStream> {
        let params = convert::send_message_params(req).map_err(invalid_request)?;
        let client = self.client().await?;
        let upstream = client
            .send_message_stream(ctx, &params)
            .await
            .map_err(backend)?;
        debug!(endpoint = %self.endpoint, "message stream opened");
        Ok(stream_events("message/stream", upstream))
    }

    async fn get_task(&self, ctx: &CallContext, req: GetTaskRequest) -> GatewayResult<Task> {
        let params = convert::get_task_params(req).map_err(invalid_request)?;
        let client = self.client().await?;
        let task = client.get_task(ctx, &params).await.map_err(backend)?;
        convert::task_from_dialect(task).map_err(invalid_response)
    }

    async fn list_tasks(
        &self,
        _ctx: &CallContext,
        _req: ListTasksRequest,
    ) -> GatewayResult<ListTasksResponse> {
        Err(GatewayError::unimplemented(
            "ListTasks is not supported by JSON-RPC agents",
        ))
    }

    async fn cancel_task(&self, ctx: &CallContext, req: CancelTaskRequest) -> GatewayResult<Task> {
        let params = convert::task_id_params(&req.name).map_err(invalid_request)?;
        let client = self.client().await?;
        let task = client.cancel_task(ctx, &params).await.map_err(backend)?;
        convert::task_from_dialect(task).map_err(invalid_response)
    }

    async fn task_subscription(
        &self,
        ctx: &CallContext,
        req: TaskSubscriptionRequest,
    ) -> GatewayResult<EventStream> {
        let params = convert::task_id_params(&req.name).map_err(invalid_request)?;
        let client = self.client().await?;
        let upstream = client.resubscribe(ctx, &params).await.map_err(backend)?;
        debug!(endpoint = %self.endpoint, task_id = %params.id, "task subscription opened");
        Ok(stream_events("tasks/resubscribe", upstream))
    }

    async fn create_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: CreateTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig> {
        let params = convert::set_push_config_params(req).map_err(invalid_request)?;
        let client = self.client().await?;
        let config = client
            .set_task_push_config(ctx, &params)
            .await
            .map_err(backend)?;
        let requested = params.push_notification_config.id.as_deref();
        Ok(convert::push_config_from_dialect(config, requested))
    }

    async fn get_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: GetTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig> {
        let params = convert::get_push_config_params(&req.name).map_err(invalid_request)?;
        let client = self.client().await?;
        let config = client
            .get_task_push_config(ctx, &params)
            .await
            .map_err(backend)?;
        let requested = params.push_notification_config_id.as_deref();
        Ok(convert::push_config_from_dialect(config, requested))
    }

    async fn list_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: ListTaskPushNotificationConfigRequest,
    ) -> GatewayResult<ListTaskPushNotificationConfigResponse> {
        let params = convert::task_id_params(&req.parent).map_err(invalid_request)?;
        let client = self.client().await?;
        let configs = client
            .list_task_push_configs(ctx, &params)
            .await
            .map_err(backend)?;
        Ok(convert::push_config_list(configs))
    }

    async fn delete_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: DeleteTaskPushNotificationConfigRequest,
    ) -> GatewayResult<Empty> {
        let params = convert::delete_push_config_params(&req.name).map_err(invalid_request)?;
        let client = self.client().await?;
        client
            .delete_task_push_config(ctx, &params)
            .await
            .map_err(backend)?;
        Ok(Empty {})
    }

    async fn get_agent_card(
        &self,
        ctx: &CallContext,
        _req: GetAgentCardRequest,
    ) -> GatewayResult<AgentCard> {
        let client = self.client().await?;
        let card = client.get_agent_card(ctx).await.map_err(backend)?;
        convert::agent_card_from_dialect(card).map_err(invalid_response)
    }
}
