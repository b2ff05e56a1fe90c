//! Shared test utilities: a mock JSON-RPC agent and a fake gRPC client.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use a2a_gateway::connection::ConnectError;
use a2a_gateway::grpc::{NativeClient, NativeConnector, NativeStream};
use a2a_gateway::types::*;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, StreamExt};
use serde_json::{json, Value};
use tonic::metadata::MetadataMap;
use tonic::{Request, Status};

// ===========================================================================
// Mock JSON-RPC agent
// ===========================================================================

/// One request the mock agent received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub params: Value,
    pub headers: HeaderMap,
}

#[derive(Debug, Default)]
pub struct AgentLog {
    calls: Mutex<Vec<RecordedCall>>,
}

impl AgentLog {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.method).collect()
    }

    pub fn last(&self) -> RecordedCall {
        self.calls().pop().expect("agent received no calls")
    }

    fn record(&self, method: &str, params: Value, headers: HeaderMap) {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.to_string(),
            params,
            headers,
        });
    }
}

pub struct MockAgent {
    /// JSON-RPC endpoint, e.g. `http://127.0.0.1:41234/jsonrpc`.
    pub url: String,
    pub log: Arc<AgentLog>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Start a mock JSON-RPC agent on a random port.
pub async fn start_mock_agent() -> MockAgent {
    let log = Arc::new(AgentLog::default());
    let app = Router::new()
        .route("/jsonrpc", post(handle_rpc))
        .route("/.well-known/agent-card.json", get(handle_card))
        .with_state(Arc::clone(&log));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockAgent {
        url: format!("http://{addr}/jsonrpc"),
        log,
        _handle: handle,
    }
}

pub fn dialect_task(id: &str, state: &str) -> Value {
    json!({
        "kind": "task",
        "id": id,
        "contextId": "ctx-1",
        "status": {"state": state, "timestamp": "2025-01-01T00:00:00Z"},
        "history": [{
            "kind": "message",
            "messageId": "m-1",
            "role": "user",
            "parts": [{"kind": "text", "text": "hello"}]
        }]
    })
}

fn dialect_message(id: &str) -> Value {
    json!({
        "kind": "message",
        "messageId": id,
        "role": "agent",
        "parts": [{"kind": "text", "text": id}]
    })
}

/// Config id `anon` comes back without an `id`, as some agents send it.
fn dialect_push_config(task_id: &str, config_id: &str) -> Value {
    let mut config = json!({
        "taskId": task_id,
        "pushNotificationConfig": {
            "id": config_id,
            "url": "https://hooks.example.com/a2a",
            "token": "secret"
        }
    });
    if config_id == "anon" {
        config["pushNotificationConfig"]
            .as_object_mut()
            .unwrap()
            .remove("id");
    }
    config
}

fn rpc_result(id: &Value, result: Value) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
}

fn rpc_error(id: &Value, code: i64, message: &str) -> Response {
    Json(json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}}))
        .into_response()
}

/// Three message events, then the `[DONE]` sentinel.
fn event_stream(id: &Value) -> Response {
    let mut body = String::new();
    for event in ["e1", "e2", "e3"] {
        let frame = json!({"jsonrpc": "2.0", "id": id, "result": dialect_message(event)});
        body.push_str(&format!("data: {frame}\n\n"));
    }
    body.push_str("data: [DONE]\n\n");
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn handle_rpc(
    State(log): State<Arc<AgentLog>>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let id = request["id"].clone();
    let method = request["method"].as_str().unwrap_or_default().to_string();
    let params = request["params"].clone();
    log.record(&method, params.clone(), headers);

    let task_id = params["id"].as_str().unwrap_or_default();
    match method.as_str() {
        "message/send" => rpc_result(&id, dialect_task("task-1", "submitted")),
        "message/stream" => event_stream(&id),
        "tasks/get" if task_id == "missing" => rpc_error(&id, -32001, "Task not found"),
        "tasks/get" => rpc_result(&id, dialect_task(task_id, "working")),
        "tasks/cancel" => rpc_result(&id, dialect_task(task_id, "canceled")),
        "tasks/resubscribe" if task_id == "missing" => rpc_error(&id, -32001, "Task not found"),
        "tasks/resubscribe" => event_stream(&id),
        "tasks/pushNotificationConfig/set" => rpc_result(&id, params),
        "tasks/pushNotificationConfig/get" => rpc_result(
            &id,
            dialect_push_config(
                task_id,
                params["pushNotificationConfigId"].as_str().unwrap_or_default(),
            ),
        ),
        "tasks/pushNotificationConfig/list" => rpc_result(
            &id,
            json!([
                dialect_push_config(task_id, "cfg-1"),
                dialect_push_config(task_id, "cfg-2")
            ]),
        ),
        "tasks/pushNotificationConfig/delete" => rpc_result(&id, Value::Null),
        other => rpc_error(&id, -32601, &format!("Method not found: {other}")),
    }
}

async fn handle_card(State(log): State<Arc<AgentLog>>, headers: HeaderMap) -> Json<Value> {
    log.record("card", Value::Null, headers);
    Json(json!({
        "name": "Mock Agent",
        "description": "Answers with canned data",
        "url": "http://127.0.0.1/jsonrpc",
        "version": "1.2.3",
        "protocolVersion": "0.3.0",
        "preferredTransport": "JSONRPC",
        "capabilities": {"streaming": true, "pushNotifications": true},
        "defaultInputModes": ["text/plain"],
        "defaultOutputModes": ["text/plain"],
        "skills": [{
            "id": "echo",
            "name": "Echo",
            "description": "Echoes input",
            "tags": ["test"]
        }]
    }))
}

// ===========================================================================
// Fake native agent
// ===========================================================================

/// Shared record of what the fake gRPC client was asked to do.
#[derive(Debug, Default)]
pub struct NativeLog {
    metadata: Mutex<Vec<MetadataMap>>,
    requests: Mutex<Vec<Value>>,
}

impl NativeLog {
    pub fn metadata(&self) -> Vec<MetadataMap> {
        self.metadata.lock().unwrap().clone()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }

    fn record<T: serde::Serialize>(&self, request: Request<T>) -> T {
        let (metadata, _, message) = request.into_parts();
        self.metadata.lock().unwrap().push(metadata);
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(&message).unwrap());
        message
    }
}

pub fn native_task(name: &str) -> Task {
    Task {
        id: name.trim_start_matches("tasks/").to_string(),
        context_id: "ctx-1".into(),
        status: Some(TaskStatus {
            state: TaskState::Working,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn native_events(ids: &[&str]) -> Vec<Result<StreamResponse, Status>> {
    ids.iter()
        .map(|id| Ok(StreamResponse::Message(Message::text(*id, Role::Agent, *id))))
        .collect()
}

/// Canned `a2a.v1.A2AService` client.
///
/// `tasks/missing` is not found everywhere. `TaskSubscription` on
/// `tasks/broken` fails after one event.
#[derive(Debug, Clone)]
pub struct FakeNativeClient {
    log: Arc<NativeLog>,
}

fn check_name(name: &str) -> Result<(), Status> {
    if name == "tasks/missing" {
        return Err(Status::not_found(format!("{name} does not exist")));
    }
    Ok(())
}

#[async_trait]
impl NativeClient for FakeNativeClient {
    async fn send_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<tonic::Response<SendMessageResponse>, Status> {
        let req = self.log.record(request);
        let mut reply = Message::text("reply-1", Role::Agent, "pong");
        reply.context_id = req.message.map(|m| m.context_id).unwrap_or_default();
        Ok(tonic::Response::new(SendMessageResponse::Message(reply)))
    }

    async fn send_streaming_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<tonic::Response<NativeStream>, Status> {
        self.log.record(request);
        let events = stream::iter(native_events(&["e1", "e2", "e3"])).boxed();
        Ok(tonic::Response::new(events))
    }

    async fn get_task(
        &self,
        request: Request<GetTaskRequest>,
    ) -> Result<tonic::Response<Task>, Status> {
        let req = self.log.record(request);
        check_name(&req.name)?;
        Ok(tonic::Response::new(native_task(&req.name)))
    }

    async fn list_tasks(
        &self,
        request: Request<ListTasksRequest>,
    ) -> Result<tonic::Response<ListTasksResponse>, Status> {
        self.log.record(request);
        Ok(tonic::Response::new(ListTasksResponse {
            tasks: vec![native_task("tasks/t1"), native_task("tasks/t2")],
            next_page_token: "next".into(),
        }))
    }

    async fn cancel_task(
        &self,
        request: Request<CancelTaskRequest>,
    ) -> Result<tonic::Response<Task>, Status> {
        let req = self.log.record(request);
        check_name(&req.name)?;
        let mut task = native_task(&req.name);
        task.status = Some(TaskStatus {
            state: TaskState::Cancelled,
            ..Default::default()
        });
        Ok(tonic::Response::new(task))
    }

    async fn task_subscription(
        &self,
        request: Request<TaskSubscriptionRequest>,
    ) -> Result<tonic::Response<NativeStream>, Status> {
        let req = self.log.record(request);
        check_name(&req.name)?;
        let mut events = native_events(&["e1"]);
        if req.name == "tasks/broken" {
            events.push(Err(Status::internal("agent crashed")));
        }
        events.extend(native_events(&["e2"]));
        Ok(tonic::Response::new(stream::iter(events).boxed()))
    }

    async fn create_task_push_notification_config(
        &self,
        request: Request<CreateTaskPushNotificationConfigRequest>,
    ) -> Result<tonic::Response<TaskPushNotificationConfig>, Status> {
        let req = self.log.record(request);
        Ok(tonic::Response::new(TaskPushNotificationConfig {
            name: format!("{}/pushNotificationConfigs/{}", req.parent, req.config_id),
            push_notification_config: req.config.and_then(|c| c.push_notification_config),
        }))
    }

    async fn get_task_push_notification_config(
        &self,
        request: Request<GetTaskPushNotificationConfigRequest>,
    ) -> Result<tonic::Response<TaskPushNotificationConfig>, Status> {
        let req = self.log.record(request);
        Ok(tonic::Response::new(TaskPushNotificationConfig {
            name: req.name,
            push_notification_config: None,
        }))
    }

    async fn list_task_push_notification_config(
        &self,
        request: Request<ListTaskPushNotificationConfigRequest>,
    ) -> Result<tonic::Response<ListTaskPushNotificationConfigResponse>, Status> {
        self.log.record(request);
        Ok(tonic::Response::new(ListTaskPushNotificationConfigResponse::default()))
    }

    async fn delete_task_push_notification_config(
        &self,
        request: Request<DeleteTaskPushNotificationConfigRequest>,
    ) -> Result<tonic::Response<Empty>, Status> {
        self.log.record(request);
        Ok(tonic::Response::new(Empty {}))
    }

    async fn get_agent_card(
        &self,
        request: Request<GetAgentCardRequest>,
    ) -> Result<tonic::Response<AgentCard>, Status> {
        self.log.record(request);
        Ok(tonic::Response::new(AgentCard {
            name: "Native Agent".into(),
            version: "2.0.0".into(),
            ..Default::default()
        }))
    }
}

/// Connector that counts its attempts and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeConnector {
    pub attempts: Arc<AtomicUsize>,
    pub log: Arc<NativeLog>,
    fail: Arc<std::sync::atomic::AtomicBool>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let connector = Self::default();
        connector.set_failing(true);
        connector
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NativeConnector for FakeConnector {
    type Client = FakeNativeClient;

    async fn connect(&self) -> Result<FakeNativeClient, ConnectError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        // Long enough for concurrent callers to pile up behind this attempt.
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail.load(Ordering::SeqCst) {
            return Err(ConnectError::new("connection refused"));
        }
        Ok(FakeNativeClient {
            log: Arc::clone(&self.log),
        })
    }
}

/// Text of a message event, for comparing relayed streams.
pub fn event_text(event: &StreamResponse) -> String {
    match event {
        StreamResponse::Message(message) => message.message_id.clone(),
        other => panic!("unexpected event {other:?}"),
    }
}

pub fn user_message(text: &str) -> SendMessageRequest {
    SendMessageRequest {
        message: Some(Message {
            context_id: "ctx-1".into(),
            ..Message::text("msg-1", Role::User, text)
        }),
        ..Default::default()
    }
}

pub fn header_bundle(entries: &[(&str, &str)]) -> a2a_gateway::HeaderBundle {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
