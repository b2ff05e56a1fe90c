//! # a2a-gateway: one A2A surface in front of gRPC or JSON-RPC agents
//!
//! The gateway exposes the A2A operation set over the Connect protocol and
//! forwards each call to a single configured agent. The agent may speak
//! either of the two A2A transports:
//!
//! - **gRPC** (`a2a.v1.A2AService`): requests and responses are forwarded
//!   unchanged by [`grpc::GrpcProxy`].
//! - **JSON-RPC 2.0** (A2A v0.3, SSE streaming): requests are converted to
//!   JSON-RPC params and results converted back by [`jsonrpc::JsonRpcProxy`].
//!
//! Callers see the same operations, message shapes and error codes either
//! way. Both adapters implement [`A2AService`]; [`connect_service`] picks one
//! from the configured [`AgentEndpoint`].
//!
//! ## Agent headers
//!
//! A caller may send `X-A2A-Agent-Headers: {"tenant":"acme"}` with any call.
//! Each entry is forwarded to the agent as gRPC metadata or an HTTP header.
//!
//! ## Quick start
//!
//! ```no_run
//! use a2a_gateway::{AgentEndpoint, GatewayConfig, GatewayServer, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = AgentEndpoint::new("http://localhost:8080/jsonrpc", Transport::Dialect)?;
//!     let config = GatewayConfig::new(endpoint);
//!     GatewayServer::new(config).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`service`]: the [`A2AService`] facade and stream relaying
//! - [`grpc`]: native adapter, `tonic` client and connector
//! - [`jsonrpc`]: dialect adapter, JSON-RPC client, SSE decoding, conversion
//! - [`server`]: axum router speaking Connect, static app serving
//! - [`headers`]: `X-A2A-Agent-Headers` extraction and [`CallContext`]
//! - [`connection`]: lazily established, shared backend connections
//! - [`error`]: canonical [`Code`]s and backend error translation
//! - [`types`]: the uniform contract types
//! - [`config`]: addresses, transports and timeouts

pub mod config;
pub mod connection;
pub mod error;
pub mod grpc;
pub mod headers;
pub mod jsonrpc;
pub mod server;
pub mod service;
pub mod types;

pub use config::{AgentEndpoint, ConfigError, GatewayConfig, Transport, TransportConfig};
pub use error::{Code, GatewayError, GatewayResult};
pub use headers::{CallContext, HeaderBundle, AGENT_HEADERS_HEADER};
pub use server::GatewayServer;
pub use service::{connect_service, A2AService, EventStream};
