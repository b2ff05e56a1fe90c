//! HTTP front end: the A2A service over the Connect protocol, plus an
//! optional static web app.
//!
//! # Routes
//!
//! - `POST /a2a.v1.A2AService/{Method}`: one route per [`A2AService`]
//!   operation. Unary methods take and return JSON; `SendStreamingMessage`
//!   and `TaskSubscription` answer with a stream of Connect envelopes.
//! - everything else: files from the configured app directory, falling back
//!   to its `index.html`.
//!
//! Every service request passes through [`agent_headers_layer`], so handlers
//! always find a [`CallContext`] in the request extensions.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path as RoutePath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{middleware, Extension, Json, Router};
use bytes::{BufMut, BytesMut};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::{Code, GatewayError, GatewayResult};
use crate::headers::{agent_headers_layer, CallContext};
use crate::service::{connect_service, A2AService, EventStream};
use crate::types::*;

/// Path prefix of every service method.
pub const SERVICE_PATH: &str = "/a2a.v1.A2AService";

/// Content type of Connect streaming requests and responses.
pub const CONNECT_STREAM_CONTENT_TYPE: &str = "application/connect+json";

const FLAG_COMPRESSED: u8 = 0x01;
const FLAG_END_STREAM: u8 = 0x02;

#[derive(Clone)]
struct AppState {
    service: Arc<dyn A2AService>,
}

/// Router exposing `service` under [`SERVICE_PATH`].
pub fn service_router(service: Arc<dyn A2AService>) -> Router {
    Router::new()
        .route(&format!("{SERVICE_PATH}/{{method}}"), post(handle_call))
        .route_layer(middleware::from_fn(agent_headers_layer))
        .with_state(AppState { service })
}

/// The full application: service routes, request tracing, optional CORS and
/// the static app fallback.
pub fn app(service: Arc<dyn A2AService>, static_dir: Option<&Path>, cors: bool) -> Router {
    let mut router = service_router(service);
    if let Some(dir) = static_dir {
        let index = ServeFile::new(dir.join("index.html"));
        router = router.fallback_service(ServeDir::new(dir).fallback(index));
    }
    if cors {
        router = router.layer(CorsLayer::permissive());
    }
    router.layer(TraceLayer::new_for_http())
}

/// The gateway process: one facade, one listener.
pub struct GatewayServer {
    config: GatewayConfig,
    service: Arc<dyn A2AService>,
}

impl GatewayServer {
    /// Server whose facade is selected from `config.endpoint`.
    pub fn new(config: GatewayConfig) -> Self {
        let service = connect_service(&config.endpoint, config.transport.clone());
        Self { config, service }
    }

    /// Server over an already-built facade.
    pub fn with_service(config: GatewayConfig, service: Arc<dyn A2AService>) -> Self {
        Self { config, service }
    }

    pub fn router(&self) -> Router {
        app(
            Arc::clone(&self.service),
            self.config.static_dir.as_deref(),
            self.config.cors,
        )
    }

    /// Binds `0.0.0.0:{port}` and serves until Ctrl+C.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            address = %addr,
            agent = %self.config.endpoint,
            app_dir = ?self.config.static_dir,
            "gateway listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C; shutting down");
        return;
    }
    info!("shutdown signal received");
}

// ---- dispatch ----

async fn handle_call(
    State(state): State<AppState>,
    RoutePath(method): RoutePath<String>,
    Extension(ctx): Extension<CallContext>,
    body: Bytes,
) -> Response {
    debug!(method = %method, "dispatching call");
    let service = state.service.as_ref();

    macro_rules! unary {
        ($request:ty, $op:ident) => {
            match decode_unary::<$request>(&body) {
                Ok(req) => unary_response(service.$op(&ctx, req).await),
                Err(err) => error_response(&err),
            }
        };
    }

    macro_rules! streaming {
        ($request:ty, $op:ident) => {
            match decode_stream_request::<$request>(&body) {
                Ok(req) => stream_response(service.$op(&ctx, req).await),
                Err(err) => stream_response(Err(err)),
            }
        };
    }

    match method.as_str() {
        "SendMessage" => unary!(SendMessageRequest, send_message),
        "SendStreamingMessage" => streaming!(SendMessageRequest, send_streaming_message),
        "GetTask" => unary!(GetTaskRequest, get_task),
        "ListTasks" => unary!(ListTasksRequest, list_tasks),
        "CancelTask" => unary!(CancelTaskRequest, cancel_task),
        "TaskSubscription" => streaming!(TaskSubscriptionRequest, task_subscription),
        "CreateTaskPushNotificationConfig" => unary!(
            CreateTaskPushNotificationConfigRequest,
            create_task_push_notification_config
        ),
        "GetTaskPushNotificationConfig" => unary!(
            GetTaskPushNotificationConfigRequest,
            get_task_push_notification_config
        ),
        "ListTaskPushNotificationConfig" => unary!(
            ListTaskPushNotificationConfigRequest,
            list_task_push_notification_config
        ),
        "DeleteTaskPushNotificationConfig" => unary!(
            DeleteTaskPushNotificationConfigRequest,
            delete_task_push_notification_config
        ),
        "GetAgentCard" => unary!(GetAgentCardRequest, get_agent_card),
        other => {
            warn!(method = %other, "unknown service method");
            error_response(&GatewayError::unimplemented(format!(
                "a2a.v1.A2AService/{other} is not implemented"
            )))
        }
    }
}

// ---- unary ----

fn decode_unary<T: DeserializeOwned>(body: &[u8]) -> GatewayResult<T> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body)
        .map_err(|e| GatewayError::invalid_argument(format!("invalid request body: {e}")))
}

fn unary_response<T: Serialize>(result: GatewayResult<T>) -> Response {
    match result {
        Ok(message) => Json(message).into_response(),
        Err(err) => error_response(&err),
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl<'a> From<&'a GatewayError> for ErrorBody<'a> {
    fn from(err: &'a GatewayError) -> Self {
        Self {
            code: err.code.as_str(),
            message: &err.message,
        }
    }
}

fn error_response(err: &GatewayError) -> Response {
    let status =
        StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if err.code == Code::Internal || err.code == Code::Unknown {
        warn!(code = %err.code, message = %err.message, "call failed");
    } else {
        debug!(code = %err.code, message = %err.message, "call failed");
    }
    (status, Json(ErrorBody::from(err))).into_response()
}

// ---- streaming ----

/// Accepts exactly one enveloped message or, for convenience, a bare JSON body.
fn decode_stream_request<T: DeserializeOwned>(body: &[u8]) -> GatewayResult<T> {
    match body.first() {
        Some(&flags) if flags == 0 || flags == FLAG_COMPRESSED => {
            if flags & FLAG_COMPRESSED != 0 {
                return Err(GatewayError::unimplemented(
                    "compressed request messages are not supported",
                ));
            }
            let header = body
                .get(1..5)
                .ok_or_else(|| GatewayError::invalid_argument("truncated envelope header"))?;
            let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
            let rest = &body[5..];
            if rest.len() < len {
                return Err(GatewayError::invalid_argument("truncated envelope message"));
            }
            let (message, trailing) = rest.split_at(len);
            if !trailing.is_empty() {
                return Err(GatewayError::invalid_argument(format!(
                    "{} unexpected bytes after the request message",
                    trailing.len()
                )));
            }
            decode_unary(message)
        }
        _ => decode_unary(body),
    }
}

fn envelope(flags: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(5 + payload.len());
    buf.put_u8(flags);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

#[derive(Serialize)]
struct EndStream<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody<'a>>,
}

fn end_stream(error: Option<&GatewayError>) -> Bytes {
    let end = EndStream {
        error: error.map(ErrorBody::from),
    };
    let payload = serde_json::to_vec(&end).unwrap_or_else(|_| b"{}".to_vec());
    envelope(FLAG_END_STREAM, &payload)
}

/// Frames `events` as Connect envelopes. A failure to open the stream is
/// still a `200` whose only envelope is the end-stream error.
fn stream_response(events: GatewayResult<EventStream>) -> Response {
    let body = async_stream::stream! {
        let mut failure = None;
        match events {
            Err(err) => failure = Some(err),
            Ok(mut events) => {
                while let Some(event) = events.next().await {
                    let encoded = event.and_then(|event| {
                        serde_json::to_vec(&event).map_err(|e| {
                            GatewayError::internal(format!("failed to encode event: {e}"))
                        })
                    });
                    match encoded {
                        Ok(json) => {
                            yield Ok::<_, Infallible>(envelope(0, &json));
                        }
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
            }
        }
        yield Ok(end_stream(failure.as_ref()));
    };

    let mut response = Response::new(Body::from_stream(body));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(CONNECT_STREAM_CONTENT_TYPE),
    );
    response
}
