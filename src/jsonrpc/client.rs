//! Typed JSON-RPC client for A2A agents.
//!
//! One method per A2A v0.3 JSON-RPC method the gateway forwards. Every call
//! runs the registered [`CallInterceptor`]s first, so per-call metadata such
//! as caller-supplied agent headers reaches the agent as HTTP headers.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::TransportConfig;
use crate::headers::CallContext;

use super::card_resolver::CardResolver;
use super::error::{A2AError, A2AResult};
use super::sse::SseStream;
use super::transport::{CallMeta, JsonRpcTransport, Transport};
use super::types::{
    AgentCard, DeleteTaskPushNotificationConfigParams, GetTaskPushNotificationConfigParams,
    JsonRpcId, JsonRpcRequest, JsonRpcResponse, MessageSendParams, SendMessageResponse, Task,
    TaskIdParams, TaskPushNotificationConfig, TaskQueryParams,
};

pub const SEND_MESSAGE: &str = "message/send";
pub const SEND_STREAMING_MESSAGE: &str = "message/stream";
pub const GET_TASK: &str = "tasks/get";
pub const CANCEL_TASK: &str = "tasks/cancel";
pub const RESUBSCRIBE: &str = "tasks/resubscribe";
pub const SET_PUSH_CONFIG: &str = "tasks/pushNotificationConfig/set";
pub const GET_PUSH_CONFIG: &str = "tasks/pushNotificationConfig/get";
pub const LIST_PUSH_CONFIGS: &str = "tasks/pushNotificationConfig/list";
pub const DELETE_PUSH_CONFIG: &str = "tasks/pushNotificationConfig/delete";
pub const GET_EXTENDED_CARD: &str = "agent/getAuthenticatedExtendedCard";

/// Label interceptors see for the well-known card fetch, which is a plain GET.
pub const WELL_KNOWN_CARD: &str = ".well-known/agent-card.json";

/// Hook run before every outbound call.
pub trait CallInterceptor: Send + Sync {
    fn before(&self, ctx: &CallContext, method: &str, meta: &mut CallMeta);
}

/// Appends the caller's agent header bundle to the call metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentHeadersInterceptor;

impl CallInterceptor for AgentHeadersInterceptor {
    fn before(&self, ctx: &CallContext, _method: &str, meta: &mut CallMeta) {
        if let Some(headers) = ctx.agent_headers() {
            for (key, value) in headers {
                meta.append(key.clone(), value.clone());
            }
        }
    }
}

/// Client for a single JSON-RPC agent endpoint.
pub struct A2AClient {
    transport: Box<dyn Transport>,
    cards: CardResolver,
    interceptors: Vec<Box<dyn CallInterceptor>>,
}

impl std::fmt::Debug for A2AClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("A2AClient")
            .field("card_base", &self.cards.base())
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}

impl A2AClient {
    /// Client for `endpoint` (a full URL such as `http://localhost:8080/jsonrpc`)
    /// with the agent headers interceptor installed.
    pub fn connect(endpoint: &str, config: &TransportConfig) -> A2AResult<Self> {
        let transport = JsonRpcTransport::with_config(endpoint, config)?;
        let cards = CardResolver::for_endpoint(transport.http_client().clone(), endpoint)?;
        Ok(Self::with_transport(Box::new(transport), cards).with_interceptor(AgentHeadersInterceptor))
    }

    /// Client over a custom transport, with no interceptors.
    pub fn with_transport(transport: Box<dyn Transport>, cards: CardResolver) -> Self {
        Self {
            transport,
            cards,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: impl CallInterceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    fn meta(&self, ctx: &CallContext, method: &str) -> CallMeta {
        let mut meta = CallMeta::new();
        for interceptor in &self.interceptors {
            interceptor.before(ctx, method, &mut meta);
        }
        meta
    }

    async fn call<R: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        method: &str,
        params: &impl Serialize,
    ) -> A2AResult<R> {
        let request = build_request(method, params)?;
        let meta = self.meta(ctx, method);
        let response = self.transport.send(&request, &meta).await?;
        parse_result(response)
    }

    async fn stream(
        &self,
        ctx: &CallContext,
        method: &str,
        params: &impl Serialize,
    ) -> A2AResult<SseStream> {
        let request = build_request(method, params)?;
        let meta = self.meta(ctx, method);
        self.transport.send_stream(&request, &meta).await
    }

    // ──────────────────────────────────────────────────
    // A2A JSON-RPC methods
    // ──────────────────────────────────────────────────

    /// `message/send`
    pub async fn send_message(
        &self,
        ctx: &CallContext,
        params: &MessageSendParams,
    ) -> A2AResult<SendMessageResponse> {
        self.call(ctx, SEND_MESSAGE, params).await
    }

    /// `message/stream`
    pub async fn send_message_stream(
        &self,
        ctx: &CallContext,
        params: &MessageSendParams,
    ) -> A2AResult<SseStream> {
        self.stream(ctx, SEND_STREAMING_MESSAGE, params).await
    }

    /// `tasks/get`
    pub async fn get_task(&self, ctx: &CallContext, params: &TaskQueryParams) -> A2AResult<Task> {
        self.call(ctx, GET_TASK, params).await
    }

    /// `tasks/cancel`
    pub async fn cancel_task(&self, ctx: &CallContext, params: &TaskIdParams) -> A2AResult<Task> {
        self.call(ctx, CANCEL_TASK, params).await
    }

    /// `tasks/resubscribe`: reattach to a running task's event stream.
    pub async fn resubscribe(
        &self,
        ctx: &CallContext,
        params: &TaskIdParams,
    ) -> A2AResult<SseStream> {
        self.stream(ctx, RESUBSCRIBE, params).await
    }

    /// `tasks/pushNotificationConfig/set`
    pub async fn set_task_push_config(
        &self,
        ctx: &CallContext,
        params: &TaskPushNotificationConfig,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.call(ctx, SET_PUSH_CONFIG, params).await
    }

    /// `tasks/pushNotificationConfig/get`
    pub async fn get_task_push_config(
        &self,
        ctx: &CallContext,
        params: &GetTaskPushNotificationConfigParams,
    ) -> A2AResult<TaskPushNotificationConfig> {
        self.call(ctx, GET_PUSH_CONFIG, params).await
    }

    /// `tasks/pushNotificationConfig/list`
    pub async fn list_task_push_configs(
        &self,
        ctx: &CallContext,
        params: &TaskIdParams,
    ) -> A2AResult<Vec<TaskPushNotificationConfig>> {
        self.call(ctx, LIST_PUSH_CONFIGS, params).await
    }

    /// `tasks/pushNotificationConfig/delete`
    pub async fn delete_task_push_config(
        &self,
        ctx: &CallContext,
        params: &DeleteTaskPushNotificationConfigParams,
    ) -> A2AResult<()> {
        self.call(ctx, DELETE_PUSH_CONFIG, params).await
    }

    /// Fetch the agent card from the well-known URI.
    ///
    /// If the public card advertises an authenticated extended card, that
    /// card is fetched with `agent/getAuthenticatedExtendedCard` and returned
    /// instead.
    pub async fn get_agent_card(&self, ctx: &CallContext) -> A2AResult<AgentCard> {
        let meta = self.meta(ctx, WELL_KNOWN_CARD);
        let card = self.cards.resolve(&meta).await?;
        if !card.supports_authenticated_extended_card.unwrap_or(false) {
            return Ok(card);
        }
        self.call(ctx, GET_EXTENDED_CARD, &serde_json::json!({})).await
    }
}

// ──────────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────────

/// Build a JSON-RPC request with a random UUID ID.
fn build_request(method: &str, params: &impl Serialize) -> A2AResult<JsonRpcRequest> {
    let params_value = serde_json::to_value(params)
        .map_err(|e| A2AError::Transport(format!("failed to serialize request params: {e}")))?;

    Ok(JsonRpcRequest::new(
        JsonRpcId::String(uuid::Uuid::new_v4().to_string()),
        method,
        Some(params_value),
    ))
}

/// Parse the `result` field from a JSON-RPC response into the expected type.
///
/// A missing `result` is read as `null`, which is what methods without a
/// result (such as push config deletion) return.
fn parse_result<T: DeserializeOwned>(response: JsonRpcResponse) -> A2AResult<T> {
    if let Some(error) = response.error {
        return Err(error.into());
    }

    let result = response.result.unwrap_or(serde_json::Value::Null);

    serde_json::from_value(result)
        .map_err(|e| A2AError::InvalidJson(format!("failed to deserialize response result: {e}")))
}
