//! Gateway error types: the canonical code taxonomy every operation reports
//! in, and the translation of JSON-RPC backend failures into it.

use std::fmt;

use crate::connection::ConnectError;
use crate::jsonrpc::error::{
    A2AError, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, TASK_NOT_FOUND, UNAUTHENTICATED,
    UNAUTHORIZED,
};

/// Canonical error codes (the gRPC / Connect code set, minus `OK`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Code {
    Canceled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

impl Code {
    /// Connect wire name, e.g. `"invalid_argument"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::Canceled => "canceled",
            Code::Unknown => "unknown",
            Code::InvalidArgument => "invalid_argument",
            Code::DeadlineExceeded => "deadline_exceeded",
            Code::NotFound => "not_found",
            Code::AlreadyExists => "already_exists",
            Code::PermissionDenied => "permission_denied",
            Code::ResourceExhausted => "resource_exhausted",
            Code::FailedPrecondition => "failed_precondition",
            Code::Aborted => "aborted",
            Code::OutOfRange => "out_of_range",
            Code::Unimplemented => "unimplemented",
            Code::Internal => "internal",
            Code::Unavailable => "unavailable",
            Code::DataLoss => "data_loss",
            Code::Unauthenticated => "unauthenticated",
        }
    }

    /// HTTP status used for unary error responses.
    pub fn http_status(&self) -> u16 {
        match self {
            Code::Canceled => 499,
            Code::Unknown => 500,
            Code::InvalidArgument => 400,
            Code::DeadlineExceeded => 504,
            Code::NotFound => 404,
            Code::AlreadyExists => 409,
            Code::PermissionDenied => 403,
            Code::ResourceExhausted => 429,
            Code::FailedPrecondition => 400,
            Code::Aborted => 409,
            Code::OutOfRange => 400,
            Code::Unimplemented => 501,
            Code::Internal => 500,
            Code::Unavailable => 503,
            Code::DataLoss => 500,
            Code::Unauthenticated => 401,
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tonic::Code> for Code {
    fn from(code: tonic::Code) -> Self {
        match code {
            tonic::Code::Cancelled => Code::Canceled,
            tonic::Code::InvalidArgument => Code::InvalidArgument,
            tonic::Code::DeadlineExceeded => Code::DeadlineExceeded,
            tonic::Code::NotFound => Code::NotFound,
            tonic::Code::AlreadyExists => Code::AlreadyExists,
            tonic::Code::PermissionDenied => Code::PermissionDenied,
            tonic::Code::ResourceExhausted => Code::ResourceExhausted,
            tonic::Code::FailedPrecondition => Code::FailedPrecondition,
            tonic::Code::Aborted => Code::Aborted,
            tonic::Code::OutOfRange => Code::OutOfRange,
            tonic::Code::Unimplemented => Code::Unimplemented,
            tonic::Code::Internal => Code::Internal,
            tonic::Code::Unavailable => Code::Unavailable,
            tonic::Code::DataLoss => Code::DataLoss,
            tonic::Code::Unauthenticated => Code::Unauthenticated,
            // An OK status never reaches an error path.
            tonic::Code::Ok | tonic::Code::Unknown => Code::Unknown,
        }
    }
}

/// The single error type of the gateway facade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct GatewayError {
    pub code: Code,
    pub message: String,
}

/// Convenience result type for facade operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }
}

/// gRPC statuses pass through with their code and message.
impl From<tonic::Status> for GatewayError {
    fn from(status: tonic::Status) -> Self {
        Self::new(status.code().into(), status.message())
    }
}

/// Failing to reach the agent is always `unavailable`.
impl From<ConnectError> for GatewayError {
    fn from(err: ConnectError) -> Self {
        Self::unavailable(err.to_string())
    }
}

/// Maps a JSON-RPC backend failure to its canonical code.
///
/// Returns `None` for the end-of-stream signal, which is clean termination
/// rather than an error.
pub fn translate_backend_error(err: A2AError) -> Option<GatewayError> {
    if matches!(err, A2AError::EndOfStream) {
        return None;
    }
    let code = match err.code() {
        TASK_NOT_FOUND => Code::NotFound,
        INVALID_REQUEST | INVALID_PARAMS => Code::InvalidArgument,
        METHOD_NOT_FOUND => Code::Unimplemented,
        UNAUTHENTICATED => Code::Unauthenticated,
        UNAUTHORIZED => Code::PermissionDenied,
        _ => Code::Unknown,
    };
    Some(GatewayError::new(code, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jsonrpc::error::{INTERNAL_ERROR, TASK_NOT_CANCELABLE};

    fn translated(err: A2AError) -> Code {
        translate_backend_error(err).expect("an error").code
    }

    #[test]
    fn translation_table() {
        assert_eq!(translated(A2AError::json_rpc(TASK_NOT_FOUND, "gone")), Code::NotFound);
        assert_eq!(
            translated(A2AError::json_rpc(INVALID_REQUEST, "bad")),
            Code::InvalidArgument
        );
        assert_eq!(
            translated(A2AError::json_rpc(INVALID_PARAMS, "bad")),
            Code::InvalidArgument
        );
        assert_eq!(
            translated(A2AError::json_rpc(METHOD_NOT_FOUND, "nope")),
            Code::Unimplemented
        );
        assert_eq!(
            translated(A2AError::json_rpc(UNAUTHENTICATED, "who")),
            Code::Unauthenticated
        );
        assert_eq!(
            translated(A2AError::json_rpc(UNAUTHORIZED, "no")),
            Code::PermissionDenied
        );
    }

    #[test]
    fn http_auth_failures_translate() {
        let err = A2AError::Http {
            status: 401,
            body: String::new(),
        };
        assert_eq!(translated(err), Code::Unauthenticated);
        let err = A2AError::Http {
            status: 403,
            body: String::new(),
        };
        assert_eq!(translated(err), Code::PermissionDenied);
    }

    #[test]
    fn everything_else_is_unknown() {
        assert_eq!(
            translated(A2AError::json_rpc(TASK_NOT_CANCELABLE, "done")),
            Code::Unknown
        );
        assert_eq!(
            translated(A2AError::json_rpc(INTERNAL_ERROR, "boom")),
            Code::Unknown
        );
        assert_eq!(
            translated(A2AError::Transport("reset".into())),
            Code::Unknown
        );
        assert_eq!(
            translated(A2AError::Http {
                status: 502,
                body: "bad gateway".into()
            }),
            Code::Unknown
        );
    }

    #[test]
    fn end_of_stream_is_not_an_error() {
        assert!(translate_backend_error(A2AError::EndOfStream).is_none());
    }

    #[test]
    fn grpc_status_passes_through() {
        let err = GatewayError::from(tonic::Status::not_found("task t1"));
        assert_eq!(err.code, Code::NotFound);
        assert_eq!(err.message, "task t1");

        let err = GatewayError::from(tonic::Status::resource_exhausted("slow down"));
        assert_eq!(err.code, Code::ResourceExhausted);
    }

    #[test]
    fn connect_failure_is_unavailable() {
        let err = GatewayError::from(ConnectError::new("connection refused"));
        assert_eq!(err.code, Code::Unavailable);
        assert!(err.message.contains("connection refused"));
    }

    #[test]
    fn wire_names_and_statuses() {
        assert_eq!(Code::InvalidArgument.as_str(), "invalid_argument");
        assert_eq!(Code::Unimplemented.http_status(), 501);
        assert_eq!(Code::Unavailable.http_status(), 503);
        assert_eq!(Code::NotFound.to_string(), "not_found");
    }
}
