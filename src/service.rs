//! The unified service facade.
//!
//! [`A2AService`] is the single surface the server dispatches to. Exactly one
//! implementation is chosen at startup from the configured transport and
//! kept for the life of the process: [`GrpcProxy`] for native agents,
//! [`JsonRpcProxy`] for JSON-RPC agents.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::{debug, error};

use crate::config::{AgentEndpoint, Transport, TransportConfig};
use crate::error::{GatewayError, GatewayResult};
use crate::grpc::{GrpcConnector, GrpcProxy};
use crate::headers::CallContext;
use crate::jsonrpc::JsonRpcProxy;
use crate::types::*;

/// Events relayed from a streaming operation, in the order the agent sent them.
pub type EventStream = BoxStream<'static, GatewayResult<StreamResponse>>;

/// The A2A operation set, expressed in the uniform contract types.
///
/// Every operation receives the caller's [`CallContext`], whose agent header
/// bundle is forwarded to the agent with the outbound call.
#[async_trait]
pub trait A2AService: Send + Sync {
    async fn send_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<SendMessageResponse>;

    /// Opens a streaming send. Errors that occur before the first event is
    /// produced are returned here; later ones arrive as the last stream item.
    async fn send_streaming_message(
        &self,
        ctx: &CallContext,
        req: SendMessageRequest,
    ) -> GatewayResult<EventStream>;

    async fn get_task(&self, ctx: &CallContext, req: GetTaskRequest) -> GatewayResult<Task>;

    async fn list_tasks(
        &self,
        ctx: &CallContext,
        req: ListTasksRequest,
    ) -> GatewayResult<ListTasksResponse>;

    async fn cancel_task(&self, ctx: &CallContext, req: CancelTaskRequest) -> GatewayResult<Task>;

    /// Reattaches to the event stream of a running task.
    async fn task_subscription(
        &self,
        ctx: &CallContext,
        req: TaskSubscriptionRequest,
    ) -> GatewayResult<EventStream>;

    async fn create_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: CreateTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig>;

    async fn get_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: GetTaskPushNotificationConfigRequest,
    ) -> GatewayResult<TaskPushNotificationConfig>;

    async fn list_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: ListTaskPushNotificationConfigRequest,
    ) -> GatewayResult<ListTaskPushNotificationConfigResponse>;

    async fn delete_task_push_notification_config(
        &self,
        ctx: &CallContext,
        req: DeleteTaskPushNotificationConfigRequest,
    ) -> GatewayResult<Empty>;

    async fn get_agent_card(
        &self,
        ctx: &CallContext,
        req: GetAgentCardRequest,
    ) -> GatewayResult<AgentCard>;
}

/// Builds the facade for `endpoint`. No connection is made until the first
/// call.
pub fn connect_service(endpoint: &AgentEndpoint, config: TransportConfig) -> Arc<dyn A2AService> {
    debug!(agent = %endpoint, "selecting backend adapter");
    match endpoint.transport() {
        Transport::Native => {
            let connector = GrpcConnector::new(endpoint.native_target(), config);
            Arc::new(GrpcProxy::new(connector))
        }
        Transport::Dialect => Arc::new(JsonRpcProxy::new(endpoint.address(), config)),
    }
}

/// Relays `upstream` one element at a time.
///
/// The upstream is only polled when the consumer polls the relay. Each
/// element goes through `convert`; upstream errors go through `map_err`,
/// where `None` means the agent ended the stream cleanly. The first failure
/// is yielded once and ends the relay. Dropping the relay drops `upstream`.
pub(crate) fn relay<S, T, E, C, M>(
    label: &'static str,
    upstream: S,
    convert: C,
    map_err: M,
) -> EventStream
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    C: Fn(T) -> GatewayResult<StreamResponse> + Send + 'static,
    M: Fn(E) -> Option<GatewayError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut upstream = std::pin::pin!(upstream);
        let mut relayed = 0usize;
        while let Some(item) = upstream.next().await {
            let event = match item {
                Ok(element) => convert(element),
                Err(err) => match map_err(err) {
                    Some(err) => Err(err),
                    None => break,
                },
            };
            match event {
                Ok(event) => {
                    relayed += 1;
                    yield Ok(event);
                }
                Err(err) => {
                    error!(stream = label, relayed, error = %err, "stream relay failed");
                    yield Err(err);
                    break;
                }
            }
        }
        debug!(stream = label, relayed, "stream relay finished");
    };
    stream.boxed()
}
