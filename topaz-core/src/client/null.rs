use super::{CallError, CallOptions, MessageStream, ServiceClient, ServiceKind, method_name};
use futures_util::stream::BoxStream;
use prost_reflect::{DynamicMessage, MethodDescriptor};

/// Stands in for a service that is not configured. Every call fails without any I/O.
#[derive(Debug, Clone, Copy)]
pub struct NullProxy {
    service: ServiceKind,
}

impl NullProxy {
    pub fn new(service: ServiceKind) -> Self {
        Self { service }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    fn reject(&self, method: &MethodDescriptor) -> CallError {
        CallError::NotConfigured {
            method: method_name(method),
            service: self.service,
        }
    }
}

#[tonic::async_trait]
impl ServiceClient for NullProxy {
    fn check_ready(&self, method: &MethodDescriptor) -> Result<(), CallError> {
        Err(self.reject(method))
    }

    async fn unary(
        &self,
        method: MethodDescriptor,
        _request: DynamicMessage,
        _options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        Err(self.reject(&method))
    }

    async fn server_streaming(
        &self,
        method: MethodDescriptor,
        _request: DynamicMessage,
        _options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        Err(self.reject(&method))
    }

    async fn client_streaming(
        &self,
        method: MethodDescriptor,
        _requests: BoxStream<'static, DynamicMessage>,
        _options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        Err(self.reject(&method))
    }

    async fn bidi_streaming(
        &self,
        method: MethodDescriptor,
        _requests: BoxStream<'static, DynamicMessage>,
        _options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        Err(self.reject(&method))
    }
}
