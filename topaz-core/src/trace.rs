//! # Message tracing
//!
//! A [`MessageObserver`] is handed every message a transport sends or receives. It is injected
//! explicitly at construction ([`crate::Directory::with_observer`],
//! [`crate::Authorizer::with_observer`]), so two clients in the same process can trace
//! independently. Observers must not alter the messages.
use prost::Message;
use prost_reflect::{DynamicMessage, MethodDescriptor, ReflectMessage};
use std::fmt::Debug;

/// Receives a summary of every message exchanged over a transport.
pub trait MessageObserver: Send + Sync + Debug {
    fn on_request(&self, method: &MethodDescriptor, message: &DynamicMessage);

    fn on_response(&self, method: &MethodDescriptor, message: &DynamicMessage);

    fn on_error(&self, _method: &MethodDescriptor, _status: &tonic::Status) {}
}

/// Logs message summaries through `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MessageObserver for TracingObserver {
    fn on_request(&self, method: &MethodDescriptor, message: &DynamicMessage) {
        tracing::debug!(
            method = %method.full_name(),
            message_type = %message.descriptor().full_name(),
            bytes = message.encoded_len(),
            "sending message"
        );
    }

    fn on_response(&self, method: &MethodDescriptor, message: &DynamicMessage) {
        tracing::debug!(
            method = %method.full_name(),
            message_type = %message.descriptor().full_name(),
            bytes = message.encoded_len(),
            "received message"
        );
    }

    fn on_error(&self, method: &MethodDescriptor, status: &tonic::Status) {
        tracing::debug!(
            method = %method.full_name(),
            code = ?status.code(),
            message = %status.message(),
            "received error status"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn logs_message_summaries() {
        let pool = topaz_proto::descriptor_pool().unwrap();
        let method = pool
            .get_service_by_name("aserto.directory.reader.v3.Reader")
            .unwrap()
            .methods()
            .find(|m| m.name() == "GetObject")
            .unwrap();
        let request = DynamicMessage::new(method.input());
        let response = DynamicMessage::new(method.output());

        TracingObserver.on_request(&method, &request);
        TracingObserver.on_response(&method, &response);

        assert!(logs_contain("sending message"));
        assert!(logs_contain("received message"));
        assert!(logs_contain("aserto.directory.reader.v3.GetObjectResponse"));
    }
}
