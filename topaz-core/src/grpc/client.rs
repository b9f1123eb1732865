//! # Generic gRPC Client
//!
//! This module wraps a standard `tonic` client to provide a generic interface for
//! gRPC communication. It is agnostic to the specific Protobuf messages being exchanged.
//!
//! ## How it works
//!
//! The [`GrpcClient`] utilizes the [`super::codec::DynamicCodec`] to handle serialization.
//! It does not need to know the structure of the data it is sending; it waits for the service
//! to be ready and hands the `DynamicMessage` and the output `MessageDescriptor` to the codec.
//!
//! ## Features
//!
//! * **Dynamic Pathing**: Constructs the HTTP/2 path (e.g., `/package.Service/Method`) at runtime.
//! * **Call Options**: Applies per-call headers and the call deadline from [`CallOptions`].
//! * **Access Patterns**: Provides specific methods for Unary, Server Streaming, Client Streaming,
//!   and Bidirectional Streaming calls.
use super::codec::DynamicCodec;
use crate::{BoxError, client::CallOptions, transport::TransportService};
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::{
    Streaming,
    client::GrpcService,
    metadata::{
        MetadataKey, MetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid gRPC path '{0}'")]
    InvalidPath(String),
    #[error("Invalid metadata (header) key '{key}': '{source}'")]
    InvalidMetadataKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid metadata (header) value for key '{key}': '{source}'")]
    InvalidMetadataValue {
        key: String,
        source: InvalidMetadataValue,
    },
}

/// A generic client issuing calls for any method of the bundled schemas.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = TransportService> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    /// * `Ok(Ok(DynamicMessage))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send request or connect.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        payload: DynamicMessage,
        options: &CallOptions,
    ) -> Result<Result<DynamicMessage, tonic::Status>, GrpcRequestError> {
        self.ready().await?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(payload, options)?;

        match self.client.unary(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Server Streaming gRPC call (Single Request -> Stream of Responses).
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Streaming))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send request or connect.
    pub async fn server_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload: DynamicMessage,
        options: &CallOptions,
    ) -> Result<Result<Streaming<DynamicMessage>, tonic::Status>, GrpcRequestError> {
        self.ready().await?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(payload, options)?;

        match self.client.server_streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Client Streaming gRPC call (Stream of Requests -> Single Response).
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(DynamicMessage))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send request or connect.
    pub async fn client_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload_stream: impl Stream<Item = DynamicMessage> + Send + 'static,
        options: &CallOptions,
    ) -> Result<Result<DynamicMessage, tonic::Status>, GrpcRequestError> {
        self.ready().await?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(payload_stream, options)?;

        match self.client.client_streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Bidirectional Streaming gRPC call (Stream of Requests -> Stream of Responses).
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Streaming))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send request or connect.
    pub async fn bidirectional_streaming(
        &mut self,
        method: &MethodDescriptor,
        payload_stream: impl Stream<Item = DynamicMessage> + Send + 'static,
        options: &CallOptions,
    ) -> Result<Result<Streaming<DynamicMessage>, tonic::Status>, GrpcRequestError> {
        self.ready().await?;

        let codec = DynamicCodec::new(method.output());
        let path = http_path(method)?;
        let request = build_request(payload_stream, options)?;

        match self.client.streaming(request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    async fn ready(&mut self) -> Result<(), GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, GrpcRequestError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path).map_err(|_| GrpcRequestError::InvalidPath(path))
}

fn build_request<T>(
    payload: T,
    options: &CallOptions,
) -> Result<tonic::Request<T>, GrpcRequestError> {
    let mut request = tonic::Request::new(payload);
    for (k, v) in &options.headers {
        let key = MetadataKey::from_str(&k.to_ascii_lowercase()).map_err(|source| {
            GrpcRequestError::InvalidMetadataKey {
                key: k.clone(),
                source,
            }
        })?;
        let val = MetadataValue::from_str(v).map_err(|source| {
            GrpcRequestError::InvalidMetadataValue {
                key: k.clone(),
                source,
            }
        })?;
        request.metadata_mut().insert(key, val);
    }
    if let Some(timeout) = options.timeout {
        request.set_timeout(timeout);
    }
    Ok(request)
}
