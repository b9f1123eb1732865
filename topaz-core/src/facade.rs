//! The machinery shared by the [`crate::Directory`] and [`crate::Authorizer`] facades.
//!
//! A [`ServiceFacade`] pairs one gRPC service schema with the [`ServiceClient`] bound to it and
//! runs every call through the same steps: readiness check, request building, the call itself,
//! response serialization and error translation.
use crate::{
    client::{CallOptions, ServiceClient, ServiceKind, method_name},
    config::ConfigError,
    error::ClientError,
    registry::MessageRegistry,
    transport::Transport,
};
use futures_util::{StreamExt, stream::BoxStream};
use prost_reflect::{
    DescriptorPool, DeserializeOptions, DynamicMessage, MethodDescriptor, ServiceDescriptor,
};
use serde_json::Value;
use std::sync::Arc;

/// A stream of response messages whose errors are already translated.
pub type ResponseStream = BoxStream<'static, Result<DynamicMessage, ClientError>>;

#[derive(Debug, Clone)]
pub(crate) struct ServiceFacade {
    kind: ServiceKind,
    client: Arc<dyn ServiceClient>,
    service: ServiceDescriptor,
    registry: Arc<MessageRegistry>,
}

impl ServiceFacade {
    pub(crate) fn new(
        kind: ServiceKind,
        client: Arc<dyn ServiceClient>,
        pool: &DescriptorPool,
        registry: Arc<MessageRegistry>,
    ) -> Result<Self, ConfigError> {
        let service = pool
            .get_service_by_name(kind.proto_name())
            .ok_or(ConfigError::MissingService(kind.proto_name()))?;

        Ok(Self {
            kind,
            client,
            service,
            registry,
        })
    }

    pub(crate) fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    pub(crate) fn transport(&self) -> Option<Arc<Transport>> {
        self.client.transport().cloned()
    }

    pub(crate) fn method(&self, rpc: &str) -> Result<MethodDescriptor, ClientError> {
        self.service
            .methods()
            .find(|m| m.name() == rpc)
            .ok_or_else(|| ClientError::MethodNotFound {
                method: rpc.to_string(),
                service: self.kind,
            })
    }

    /// Looks a method up by its RPC name and checks that the bound client can take it.
    ///
    /// The readiness check comes first so an unconfigured service reports itself
    /// before the request is even looked at.
    pub(crate) fn prepare(&self, rpc: &str) -> Result<MethodDescriptor, ClientError> {
        let method = self.method(rpc)?;

        self.client
            .check_ready(&method)
            .map_err(|e| ClientError::from_call(&method_name(&method), e))?;

        Ok(method)
    }

    /// Builds the request message of `method` from its proto3 JSON form.
    ///
    /// Unknown fields are ignored and `null` stands for an empty request.
    pub(crate) fn request(
        &self,
        method: &MethodDescriptor,
        body: Value,
    ) -> Result<DynamicMessage, ClientError> {
        let body = match body {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let options = DeserializeOptions::new().deny_unknown_fields(false);

        DynamicMessage::deserialize_with_options(method.input(), body, &options).map_err(|e| {
            ClientError::InvalidRequest {
                method: method_name(method),
                reason: e.to_string(),
            }
        })
    }

    /// Performs a unary call and returns the raw response.
    pub(crate) async fn call(
        &self,
        rpc: &str,
        body: Value,
        options: CallOptions,
    ) -> Result<DynamicMessage, ClientError> {
        let method = self.prepare(rpc)?;
        let request = self.request(&method, body)?;
        let name = method_name(&method);

        self.client
            .unary(method, request, options)
            .await
            .map_err(|e| ClientError::from_call(&name, e))
    }

    /// Performs a unary call and serializes the response.
    pub(crate) async fn unary(
        &self,
        rpc: &str,
        body: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        let response = self.call(rpc, body, options).await?;
        Ok(self.registry.serialize(&response)?)
    }

    pub(crate) async fn server_streaming(
        &self,
        rpc: &str,
        body: Value,
        options: CallOptions,
    ) -> Result<ResponseStream, ClientError> {
        let method = self.prepare(rpc)?;
        let request = self.request(&method, body)?;
        let name = method_name(&method);

        let responses = self
            .client
            .server_streaming(method, request, options)
            .await
            .map_err(|e| ClientError::from_call(&name, e))?;

        Ok(translate_statuses(name, responses))
    }

    pub(crate) async fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: Vec<DynamicMessage>,
        options: CallOptions,
    ) -> Result<DynamicMessage, ClientError> {
        let name = method_name(&method);

        self.client
            .client_streaming(method, futures_util::stream::iter(requests).boxed(), options)
            .await
            .map_err(|e| ClientError::from_call(&name, e))
    }

    pub(crate) async fn bidi_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        options: CallOptions,
    ) -> Result<ResponseStream, ClientError> {
        let name = method_name(&method);

        let responses = self
            .client
            .bidi_streaming(method, requests, options)
            .await
            .map_err(|e| ClientError::from_call(&name, e))?;

        Ok(translate_statuses(name, responses))
    }
}

fn translate_statuses(method: String, responses: crate::client::MessageStream) -> ResponseStream {
    responses
        .map(move |item| item.map_err(|status| ClientError::from_status(method.clone(), status)))
        .boxed()
}
