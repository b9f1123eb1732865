//! # Client errors
//!
//! [`ClientError`] is the error of every facade operation. Failures of the bound client reach it
//! through a single translation point, [`ClientError::from_call`], which maps the well-known
//! status codes to dedicated variants and otherwise keeps the original status as the source,
//! with the calling method's name in front of its message.
use crate::{client::CallError, registry::SerializeError};
use tonic::Code;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Cannot call '{method}', '{service}' is not configured.")]
    NotConfigured {
        method: String,
        service: crate::ServiceKind,
    },
    #[error("{method}: not found: {message}")]
    NotFound { method: String, message: String },
    #[error(
        "{method}: authentication failed, check the API key, token and tenant id of the client: {message}"
    )]
    Unauthenticated { method: String, message: String },
    #[error("{method}: invalid etag, the resource was modified concurrently: {message}")]
    EtagMismatch { method: String, message: String },
    #[error("{method}: invalid argument: {message}")]
    InvalidArgument { method: String, message: String },
    #[error("{method}: {message}")]
    Remote {
        method: String,
        message: String,
        #[source]
        source: tonic::Status,
    },
    #[error("{method}: failed to send request: '{source}'")]
    Request {
        method: String,
        #[source]
        source: crate::grpc::client::GrpcRequestError,
    },
    #[error("{method}: invalid request: '{reason}'")]
    InvalidRequest { method: String, reason: String },
    #[error("Method '{method}' is missing from the schemas of '{service}'")]
    MethodNotFound {
        method: String,
        service: crate::ServiceKind,
    },
    #[error(transparent)]
    Schema(#[from] SerializeError),
}

impl ClientError {
    /// Translates a failure of the bound client for the facade method `method`.
    pub fn from_call(method: &str, error: CallError) -> Self {
        let method = method.to_string();
        match error {
            CallError::NotConfigured { method, service } => {
                ClientError::NotConfigured { method, service }
            }
            CallError::Request(source) => ClientError::Request { method, source },
            CallError::Status(status) => Self::from_status(method, status),
        }
    }

    /// Translates a status received while consuming a response stream.
    pub fn from_status(method: String, status: tonic::Status) -> Self {
        let message = status.message().to_string();
        match status.code() {
            Code::NotFound => ClientError::NotFound { method, message },
            Code::Unauthenticated => ClientError::Unauthenticated { method, message },
            Code::FailedPrecondition => ClientError::EtagMismatch { method, message },
            Code::InvalidArgument => ClientError::InvalidArgument { method, message },
            _ => ClientError::Remote {
                method,
                message,
                source: status,
            },
        }
    }

    /// The status code behind the error, when the server answered.
    pub fn code(&self) -> Option<Code> {
        match self {
            ClientError::NotFound { .. } => Some(Code::NotFound),
            ClientError::Unauthenticated { .. } => Some(Code::Unauthenticated),
            ClientError::EtagMismatch { .. } => Some(Code::FailedPrecondition),
            ClientError::InvalidArgument { .. } => Some(Code::InvalidArgument),
            ClientError::Remote { source, .. } => Some(source.code()),
            _ => None,
        }
    }
}
