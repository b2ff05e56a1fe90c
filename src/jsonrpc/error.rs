//! JSON-RPC backend error model: standard JSON-RPC codes, the A2A-specific
//! codes, and the client/transport failures seen while talking to an agent.

use super::types::JsonRpcError;

// ---------------------------------------------------------------------------
// Standard JSON-RPC 2.0 error codes
// ---------------------------------------------------------------------------

/// Invalid JSON was received by the server.
pub const PARSE_ERROR: i64 = -32700;

/// The JSON sent is not a valid Request object.
pub const INVALID_REQUEST: i64 = -32600;

/// The method does not exist / is not available.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Invalid method parameter(s).
pub const INVALID_PARAMS: i64 = -32602;

/// Internal JSON-RPC error.
pub const INTERNAL_ERROR: i64 = -32603;

// ---------------------------------------------------------------------------
// A2A-specific error codes
// ---------------------------------------------------------------------------

/// The requested task was not found.
pub const TASK_NOT_FOUND: i64 = -32001;

/// The task cannot be canceled in its current state.
pub const TASK_NOT_CANCELABLE: i64 = -32002;

/// Push notifications are not supported by this agent.
pub const PUSH_NOTIFICATION_NOT_SUPPORTED: i64 = -32003;

/// The requested operation is not supported.
pub const UNSUPPORTED_OPERATION: i64 = -32004;

/// The content type is not supported.
pub const CONTENT_TYPE_NOT_SUPPORTED: i64 = -32005;

/// The agent returned an invalid response.
pub const INVALID_AGENT_RESPONSE: i64 = -32006;

/// Authenticated extended card is not configured.
pub const AUTHENTICATED_EXTENDED_CARD_NOT_CONFIGURED: i64 = -32007;

/// The caller is not authenticated.
pub const UNAUTHENTICATED: i64 = -31401;

/// The caller is authenticated but not allowed to perform the call.
pub const UNAUTHORIZED: i64 = -31403;

// ---------------------------------------------------------------------------
// A2AError enum
// ---------------------------------------------------------------------------

/// Every failure the JSON-RPC client can report.
///
/// Protocol errors arrive as [`A2AError::JsonRpc`] with the agent's code;
/// the remaining variants are produced locally by the transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum A2AError {
    /// A JSON-RPC error response was received from the remote agent.
    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
        /// Optional structured error data.
        data: Option<serde_json::Value>,
    },

    /// Transport-level error (connection failed, request failed, etc.).
    #[error("Transport error: {0}")]
    Transport(String),

    /// Request or stream timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// HTTP error with status code and response body.
    #[error("HTTP {status}: {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Invalid JSON received from remote (parse or deserialization failure).
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The agent signalled the end of an event stream.
    ///
    /// Not a failure: stream consumers treat it as clean closure.
    #[error("end of stream")]
    EndOfStream,
}

/// Convenience result type for JSON-RPC client operations.
pub type A2AResult<T> = Result<T, A2AError>;

impl A2AError {
    /// Create a [`A2AError::JsonRpc`] with a code, message and no data.
    pub fn json_rpc(code: i64, message: impl Into<String>) -> Self {
        Self::JsonRpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Returns the JSON-RPC error code for this error.
    ///
    /// Locally produced transport failures report -32603 (internal error).
    pub fn code(&self) -> i64 {
        match self {
            A2AError::JsonRpc { code, .. } => *code,
            A2AError::Http { status: 401, .. } => UNAUTHENTICATED,
            A2AError::Http { status: 403, .. } => UNAUTHORIZED,
            A2AError::Transport(_)
            | A2AError::Timeout(_)
            | A2AError::Http { .. }
            | A2AError::InvalidJson(_)
            | A2AError::EndOfStream => INTERNAL_ERROR,
        }
    }
}

impl From<JsonRpcError> for A2AError {
    fn from(err: JsonRpcError) -> Self {
        A2AError::JsonRpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}
