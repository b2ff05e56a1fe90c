//! Native adapter against a real tonic server.
//!
//! The server decodes with hand-written `prost` messages numbered like
//! `a2a.proto`, so these tests pin the bytes the gateway puts on the wire.

mod common;

use std::sync::{Arc, Mutex};

use a2a_gateway::grpc::{GrpcConnector, GrpcProxy};
use a2a_gateway::types::{GetTaskRequest, SendMessageRequest, TaskState};
use a2a_gateway::{A2AService, AgentEndpoint, CallContext, Code, Transport, TransportConfig};
use common::{event_text, header_bundle, user_message};
use futures::stream::{self, BoxStream, StreamExt};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::codegen::*;
use tonic::Status;

mod pb {
    #[derive(Clone, PartialEq, prost::Message)]
    pub struct GetTaskRequest {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(int32, tag = "2")]
        pub history_length: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct TaskStatus {
        #[prost(int32, tag = "1")]
        pub state: i32,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Task {
        #[prost(string, tag = "1")]
        pub id: String,
        #[prost(string, tag = "2")]
        pub context_id: String,
        #[prost(message, optional, tag = "3")]
        pub status: Option<TaskStatus>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Part {
        #[prost(oneof = "part::Part", tags = "1")]
        pub part: Option<part::Part>,
    }

    pub mod part {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Part {
            #[prost(string, tag = "1")]
            Text(String),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Message {
        #[prost(string, tag = "1")]
        pub message_id: String,
        #[prost(string, tag = "2")]
        pub context_id: String,
        #[prost(string, tag = "3")]
        pub task_id: String,
        #[prost(int32, tag = "4")]
        pub role: i32,
        #[prost(message, repeated, tag = "5")]
        pub content: Vec<Part>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct SendMessageRequest {
        #[prost(message, optional, tag = "1")]
        pub request: Option<Message>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct StreamResponse {
        #[prost(oneof = "stream_response::Payload", tags = "1, 2")]
        pub payload: Option<stream_response::Payload>,
    }

    pub mod stream_response {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Payload {
            #[prost(message, tag = "1")]
            Task(super::Task),
            #[prost(message, tag = "2")]
            Msg(super::Message),
        }
    }

    pub const TASK_STATE_WORKING: i32 = 2;
    pub const ROLE_USER: i32 = 1;
    pub const ROLE_AGENT: i32 = 2;
}

/// What the agent received.
#[derive(Debug, Default)]
struct Seen {
    names: Vec<String>,
    tenants: Vec<Option<String>>,
    messages: Vec<pb::Message>,
}

#[derive(Clone, Default)]
struct AgentServer {
    seen: Arc<Mutex<Seen>>,
}

impl AgentServer {
    fn get_task(&self, request: tonic::Request<pb::GetTaskRequest>) -> Result<pb::Task, Status> {
        let tenant = request
            .metadata()
            .get("tenant")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let name = request.into_inner().name;
        {
            let mut seen = self.seen.lock().unwrap();
            seen.names.push(name.clone());
            seen.tenants.push(tenant);
        }
        match name.strip_prefix("tasks/") {
            Some("missing") => Err(Status::not_found("tasks/missing does not exist")),
            Some(id) => Ok(pb::Task {
                id: id.to_string(),
                context_id: "ctx-1".into(),
                status: Some(pb::TaskStatus {
                    state: pb::TASK_STATE_WORKING,
                }),
            }),
            None => Err(Status::invalid_argument(format!("bad name {name}"))),
        }
    }

    fn send_streaming_message(
        &self,
        request: tonic::Request<pb::SendMessageRequest>,
    ) -> BoxStream<'static, Result<pb::StreamResponse, Status>> {
        if let Some(message) = request.into_inner().request {
            self.seen.lock().unwrap().messages.push(message);
        }
        let events = ["e1", "e2", "e3"].map(|id| {
            Ok(pb::StreamResponse {
                payload: Some(pb::stream_response::Payload::Msg(pb::Message {
                    message_id: id.into(),
                    context_id: "ctx-1".into(),
                    role: pb::ROLE_AGENT,
                    content: vec![pb::Part {
                        part: Some(pb::part::Part::Text(id.into())),
                    }],
                    ..Default::default()
                })),
            })
        });
        stream::iter(events).boxed()
    }
}

impl tonic::server::NamedService for AgentServer {
    const NAME: &'static str = "a2a.v1.A2AService";
}

struct GetTaskSvc(AgentServer);

impl tonic::server::UnaryService<pb::GetTaskRequest> for GetTaskSvc {
    type Response = pb::Task;
    type Future = BoxFuture<tonic::Response<pb::Task>, Status>;

    fn call(&mut self, request: tonic::Request<pb::GetTaskRequest>) -> Self::Future {
        let result = self.0.get_task(request).map(tonic::Response::new);
        Box::pin(async move { result })
    }
}

struct StreamSvc(AgentServer);

impl tonic::server::ServerStreamingService<pb::SendMessageRequest> for StreamSvc {
    type Response = pb::StreamResponse;
    type ResponseStream = BoxStream<'static, Result<pb::StreamResponse, Status>>;
    type Future = BoxFuture<tonic::Response<Self::ResponseStream>, Status>;

    fn call(&mut self, request: tonic::Request<pb::SendMessageRequest>) -> Self::Future {
        let events = self.0.send_streaming_message(request);
        Box::pin(async move { Ok(tonic::Response::new(events)) })
    }
}

impl<B> Service<http::Request<B>> for AgentServer
where
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<tonic::body::BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let server = self.clone();
        match req.uri().path() {
            "/a2a.v1.A2AService/GetTask" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                Ok(grpc.unary(GetTaskSvc(server), req).await)
            }),
            "/a2a.v1.A2AService/SendStreamingMessage" => Box::pin(async move {
                let mut grpc = tonic::server::Grpc::new(tonic::codec::ProstCodec::default());
                Ok(grpc.server_streaming(StreamSvc(server), req).await)
            }),
            _ => Box::pin(async move {
                let mut response = http::Response::new(empty_body());
                let headers = response.headers_mut();
                headers.insert(
                    tonic::Status::GRPC_STATUS,
                    (tonic::Code::Unimplemented as i32).into(),
                );
                headers.insert(
                    http::header::CONTENT_TYPE,
                    tonic::metadata::GRPC_CONTENT_TYPE,
                );
                Ok(response)
            }),
        }
    }
}

async fn start_agent() -> (GrpcProxy<GrpcConnector>, Arc<Mutex<Seen>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = AgentServer::default();
    let seen = server.seen.clone();
    tokio::spawn(
        tonic::transport::Server::builder()
            .add_service(server)
            .serve_with_incoming(TcpListenerStream::new(listener)),
    );

    let endpoint = AgentEndpoint::new(&addr.to_string(), Transport::Native).unwrap();
    let connector = GrpcConnector::new(endpoint.native_target(), TransportConfig::default());
    (GrpcProxy::new(connector), seen)
}

fn get(name: &str) -> GetTaskRequest {
    GetTaskRequest {
        name: name.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn unary_call_round_trips_protobuf() {
    let (proxy, seen) = start_agent().await;

    let task = proxy
        .get_task(&CallContext::new(), get("tasks/t1"))
        .await
        .unwrap();
    assert_eq!(task.id, "t1");
    assert_eq!(task.context_id, "ctx-1");
    assert_eq!(task.status.unwrap().state, TaskState::Working);
    assert_eq!(seen.lock().unwrap().names, vec!["tasks/t1"]);
}

#[tokio::test]
async fn agent_headers_arrive_as_metadata() {
    let (proxy, seen) = start_agent().await;

    let ctx = CallContext::new().with_agent_headers(Some(header_bundle(&[("tenant", "acme")])));
    proxy.get_task(&ctx, get("tasks/t1")).await.unwrap();
    proxy
        .get_task(&CallContext::new(), get("tasks/t2"))
        .await
        .unwrap();

    assert_eq!(
        seen.lock().unwrap().tenants,
        vec![Some("acme".to_string()), None]
    );
}

#[tokio::test]
async fn not_found_status_passes_through() {
    let (proxy, _) = start_agent().await;

    let err = proxy
        .get_task(&CallContext::new(), get("tasks/missing"))
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::NotFound);
    assert_eq!(err.message, "tasks/missing does not exist");
}

#[tokio::test]
async fn server_stream_is_relayed_in_order() {
    let (proxy, seen) = start_agent().await;

    let request: SendMessageRequest = user_message("go");
    let events: Vec<_> = proxy
        .send_streaming_message(&CallContext::new(), request)
        .await
        .unwrap()
        .collect()
        .await;
    let ids: Vec<_> = events
        .iter()
        .map(|event| event_text(event.as_ref().unwrap()))
        .collect();
    assert_eq!(ids, vec!["e1", "e2", "e3"]);

    let seen = seen.lock().unwrap();
    let message = &seen.messages[0];
    assert_eq!(message.message_id, "msg-1");
    assert_eq!(message.context_id, "ctx-1");
    assert_eq!(message.role, pb::ROLE_USER);
    assert_eq!(
        message.content[0].part,
        Some(pb::part::Part::Text("go".into()))
    );
}

#[tokio::test]
async fn unknown_method_on_the_agent_is_unimplemented() {
    let (proxy, _) = start_agent().await;

    let err = proxy
        .cancel_task(
            &CallContext::new(),
            a2a_gateway::types::CancelTaskRequest {
                name: "tasks/t1".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, Code::Unimplemented);
}
