use super::{CallError, CallOptions, MessageStream, ServiceClient, ServiceKind};
use crate::{grpc::client::GrpcClient, trace::MessageObserver, transport::Transport};
use futures_util::{StreamExt, stream::BoxStream};
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::sync::Arc;

/// Issues calls over a [`Transport`], reporting every message to the transport's observer.
#[derive(Debug, Clone)]
pub struct RemoteClient {
    service: ServiceKind,
    transport: Arc<Transport>,
}

impl RemoteClient {
    pub fn new(service: ServiceKind, transport: Arc<Transport>) -> Self {
        Self { service, transport }
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    fn grpc(&self) -> GrpcClient {
        GrpcClient::new(self.transport.service())
    }

    fn observer(&self) -> Option<Arc<dyn MessageObserver>> {
        self.transport.observer().cloned()
    }

    fn observe_requests(
        &self,
        method: &MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
    ) -> BoxStream<'static, DynamicMessage> {
        match self.observer() {
            Some(observer) => {
                let method = method.clone();
                requests
                    .inspect(move |message| observer.on_request(&method, message))
                    .boxed()
            }
            None => requests,
        }
    }

    fn observe_responses(
        &self,
        method: &MethodDescriptor,
        responses: tonic::Streaming<DynamicMessage>,
    ) -> MessageStream {
        match self.observer() {
            Some(observer) => {
                let method = method.clone();
                responses
                    .inspect(move |item| match item {
                        Ok(message) => observer.on_response(&method, message),
                        Err(status) => observer.on_error(&method, status),
                    })
                    .boxed()
            }
            None => responses.boxed(),
        }
    }

    fn observe_result(
        &self,
        method: &MethodDescriptor,
        result: Result<DynamicMessage, tonic::Status>,
    ) -> Result<DynamicMessage, CallError> {
        if let Some(observer) = self.transport.observer() {
            match &result {
                Ok(message) => observer.on_response(method, message),
                Err(status) => observer.on_error(method, status),
            }
        }
        Ok(result?)
    }

    fn observe_status(&self, method: &MethodDescriptor, status: tonic::Status) -> CallError {
        if let Some(observer) = self.transport.observer() {
            observer.on_error(method, &status);
        }
        CallError::Status(status)
    }
}

#[tonic::async_trait]
impl ServiceClient for RemoteClient {
    fn transport(&self) -> Option<&Arc<Transport>> {
        Some(&self.transport)
    }

    async fn unary(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        tracing::trace!(method = %method.full_name(), "unary call");
        if let Some(observer) = self.transport.observer() {
            observer.on_request(&method, &request);
        }

        let result = self.grpc().unary(&method, request, &options).await?;
        self.observe_result(&method, result)
    }

    async fn server_streaming(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        tracing::trace!(method = %method.full_name(), "server streaming call");
        if let Some(observer) = self.transport.observer() {
            observer.on_request(&method, &request);
        }

        match self.grpc().server_streaming(&method, request, &options).await? {
            Ok(responses) => Ok(self.observe_responses(&method, responses)),
            Err(status) => Err(self.observe_status(&method, status)),
        }
    }

    async fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        tracing::trace!(method = %method.full_name(), "client streaming call");
        let requests = self.observe_requests(&method, requests);

        let result = self
            .grpc()
            .client_streaming(&method, requests, &options)
            .await?;
        self.observe_result(&method, result)
    }

    async fn bidi_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        tracing::trace!(method = %method.full_name(), "bidirectional streaming call");
        let requests = self.observe_requests(&method, requests);

        match self
            .grpc()
            .bidirectional_streaming(&method, requests, &options)
            .await?
        {
            Ok(responses) => Ok(self.observe_responses(&method, responses)),
            Err(status) => Err(self.observe_status(&method, status)),
        }
    }
}
