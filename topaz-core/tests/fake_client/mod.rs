use futures_util::{StreamExt, stream::BoxStream};
use serde_json::Value;
use std::{collections::HashMap, sync::Mutex};
use topaz_core::{
    CallOptions, MessageRegistry,
    client::{CallError, MessageStream, ServiceClient},
    prost_reflect::{DynamicMessage, MethodDescriptor},
};

/// A request seen by the [`FakeClient`], serialized with implicit defaults.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: String,
    pub request: Value,
}

/// A service client answering from canned JSON responses and recording every request.
#[derive(Debug)]
pub struct FakeClient {
    registry: MessageRegistry,
    responses: Mutex<HashMap<String, Vec<Value>>>,
    failure: Mutex<Option<tonic::Status>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            registry: MessageRegistry::builtin().unwrap(),
            responses: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers calls to the RPC `rpc` with `responses`, one message each.
    pub fn respond(&self, rpc: &str, responses: Vec<Value>) {
        self.responses
            .lock()
            .unwrap()
            .insert(rpc.to_string(), responses);
    }

    /// Fails every call with `status`.
    pub fn fail(&self, status: tonic::Status) {
        *self.failure.lock().unwrap() = Some(status);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &MethodDescriptor, request: &DynamicMessage) {
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.name().to_string(),
            request: self.registry.serialize(request).unwrap(),
        });
    }

    fn answer(&self, method: &MethodDescriptor) -> Result<Vec<DynamicMessage>, CallError> {
        if let Some(status) = self.failure.lock().unwrap().clone() {
            return Err(CallError::Status(status));
        }

        let responses = self
            .responses
            .lock()
            .unwrap()
            .get(method.name())
            .cloned()
            .unwrap_or_else(|| vec![serde_json::json!({})]);

        Ok(responses
            .into_iter()
            .map(|body| DynamicMessage::deserialize(method.output(), body).unwrap())
            .collect())
    }

    fn stream(&self, method: &MethodDescriptor) -> Result<MessageStream, CallError> {
        let messages = self.answer(method)?;
        Ok(futures_util::stream::iter(messages.into_iter().map(Ok)).boxed())
    }

    fn single(&self, method: &MethodDescriptor) -> Result<DynamicMessage, CallError> {
        Ok(self
            .answer(method)?
            .into_iter()
            .next()
            .unwrap_or_else(|| DynamicMessage::new(method.output())))
    }
}

#[tonic::async_trait]
impl ServiceClient for FakeClient {
    async fn unary(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        _options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        self.record(&method, &request);
        self.single(&method)
    }

    async fn server_streaming(
        &self,
        method: MethodDescriptor,
        request: DynamicMessage,
        _options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        self.record(&method, &request);
        self.stream(&method)
    }

    async fn client_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        _options: CallOptions,
    ) -> Result<DynamicMessage, CallError> {
        for request in requests.collect::<Vec<_>>().await {
            self.record(&method, &request);
        }
        self.single(&method)
    }

    async fn bidi_streaming(
        &self,
        method: MethodDescriptor,
        requests: BoxStream<'static, DynamicMessage>,
        _options: CallOptions,
    ) -> Result<MessageStream, CallError> {
        for request in requests.collect::<Vec<_>>().await {
            self.record(&method, &request);
        }
        self.stream(&method)
    }
}
