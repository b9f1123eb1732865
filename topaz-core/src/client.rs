//! # Service clients
//!
//! Every logical service of a client (the five directory services and the authorizer) is bound
//! to one [`ServiceClient`] at construction:
//!
//! * **[`RemoteClient`]**: The service is configured. Calls go over its [`crate::transport::Transport`].
//! * **[`NullProxy`]**: The service is not configured. Every call fails with
//!   [`CallError::NotConfigured`] and no connection is ever attempted.
//!
//! The facades only see the trait, so tests swap in recording fakes through
//! [`crate::Directory::from_clients`] and [`crate::Authorizer::from_client`].
mod null;
mod remote;

pub use null::NullProxy;
pub use remote::RemoteClient;

use crate::{grpc::client::GrpcRequestError, transport::Transport};
use futures_util::stream::BoxStream;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

/// A stream of response messages, as returned by streaming calls.
pub type MessageStream = BoxStream<'static, Result<DynamicMessage, tonic::Status>>;

/// The logical services a client may be configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Reader,
    Writer,
    Importer,
    Exporter,
    Model,
    Authorizer,
}

impl ServiceKind {
    /// The directory services, in the order they are resolved.
    pub const DIRECTORY: [ServiceKind; 5] = [
        ServiceKind::Reader,
        ServiceKind::Writer,
        ServiceKind::Importer,
        ServiceKind::Exporter,
        ServiceKind::Model,
    ];

    /// Fully qualified name of the gRPC service.
    pub fn proto_name(self) -> &'static str {
        match self {
            ServiceKind::Reader => "aserto.directory.reader.v3.Reader",
            ServiceKind::Writer => "aserto.directory.writer.v3.Writer",
            ServiceKind::Importer => "aserto.directory.importer.v3.Importer",
            ServiceKind::Exporter => "aserto.directory.exporter.v3.Exporter",
            ServiceKind::Model => "aserto.directory.model.v3.Model",
            ServiceKind::Authorizer => "aserto.authorizer.v2.Authorizer",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ServiceKind::Reader => "Reader",
            ServiceKind::Writer => "Writer",
            ServiceKind::Importer => "Importer",
            ServiceKind::Exporter => "Exporter",
            ServiceKind::Model => "Model",
            ServiceKind::Authorizer => "Authorizer",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-call settings. A header set here replaces a transport-level header of the same name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub headers: BTreeMap<String, String>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Errors produced below the facades, before any translation.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Cannot call '{method}', '{service}' is not configured.")]
    NotConfigured { method: String, service: ServiceKind },
    #[error(transparent)]
    Request(#[from] GrpcRequestError),
    #[error(transparent)]
    Status(#[from] tonic::Status),
}

/// The name callers know a method by: the RPC name in lower camel case (`GetObjects` -> `getObjects`).
pub fn method_name(method: &MethodDescriptor) -> String {
    let name = method.name();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// The calls a facade issues against one gRPC service.
#[tonic::async_trait]
pub trait ServiceClient: Send + Sync + fmt::Debug {
    /// Fails fast when the service cannot take calls at all.
    ///
    /// Facades check this before validating the request, so an unconfigured service reports
    /// itself even for malformed input.
    fn check_ready(&self, _method: &MethodDescriptor) -> Result<(), CallError> {
        Ok(())
    }

    /// The transport this client issues calls on, if any.
    fn transport(&self) -> Option<&Arc<Transport>> {
        None
    }

    async fn unary(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        options: CallOptions,
    ) -> Result<DynamicMessage, CallError>;

    async fn server_streaming(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        options: CallOptions,
    ) -> Result<MessageStream, CallError>;

    async fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        options: CallOptions,
    ) -> Result<DynamicMessage, CallError>;

    async fn bidi_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        options: CallOptions,
    ) -> Result<MessageStream, CallError>;
}
