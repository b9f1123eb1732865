use super::Directory;
use crate::{CallOptions, ClientError, facade::ResponseStream};
use futures_util::{StreamExt, stream::BoxStream};
use prost_reflect::DynamicMessage;
use serde_json::{Map, Value};

/// What an import request does with its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOpCode {
    Set,
    Delete,
    /// Deletes an object together with every relation it takes part in.
    DeleteWithRelations,
}

impl ImportOpCode {
    fn wire_name(self) -> &'static str {
        match self {
            ImportOpCode::Set => "OPCODE_SET",
            ImportOpCode::Delete => "OPCODE_DELETE",
            ImportOpCode::DeleteWithRelations => "OPCODE_DELETE_WITH_RELATIONS",
        }
    }
}

/// The payload of an import request, in the proto3 JSON mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportMsg {
    Object(Value),
    Relation(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub op_code: ImportOpCode,
    pub msg: ImportMsg,
}

impl ImportRequest {
    pub fn set_object(object: Value) -> Self {
        Self {
            op_code: ImportOpCode::Set,
            msg: ImportMsg::Object(object),
        }
    }

    pub fn set_relation(relation: Value) -> Self {
        Self {
            op_code: ImportOpCode::Set,
            msg: ImportMsg::Relation(relation),
        }
    }

    /// The wire request, in the proto3 JSON mapping.
    pub fn to_json(&self) -> Value {
        let (key, payload) = match &self.msg {
            ImportMsg::Object(object) => ("object", object),
            ImportMsg::Relation(relation) => ("relation", relation),
        };

        let mut request = Map::new();
        request.insert("opCode".to_string(), Value::from(self.op_code.wire_name()));
        request.insert(key.to_string(), payload.clone());
        Value::Object(request)
    }
}

impl Directory {
    /// Converts typed import requests into the wire messages of the `Import` call.
    ///
    /// Every request is validated before the stream is returned.
    pub fn create_import_requests(
        &self,
        requests: impl IntoIterator<Item = ImportRequest>,
    ) -> Result<BoxStream<'static, DynamicMessage>, ClientError> {
        let method = self.importer.method("Import")?;
        let messages = requests
            .into_iter()
            .map(|request| self.importer.request(&method, request.to_json()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(futures_util::stream::iter(messages).boxed())
    }

    /// Streams `requests` to the importer and returns its counters and statuses as they arrive.
    pub async fn import(
        &self,
        requests: impl IntoIterator<Item = ImportRequest>,
        options: CallOptions,
    ) -> Result<ResponseStream, ClientError> {
        let method = self.importer.prepare("Import")?;
        let messages = self.create_import_requests(requests)?;

        self.importer.bidi_streaming(method, messages, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_wire_json() {
        let request = ImportRequest {
            op_code: ImportOpCode::DeleteWithRelations,
            msg: ImportMsg::Object(json!({"type": "user", "id": "rick"})),
        };

        assert_eq!(
            request.to_json(),
            json!({
                "opCode": "OPCODE_DELETE_WITH_RELATIONS",
                "object": {"type": "user", "id": "rick"}
            })
        );
    }

    #[test]
    fn set_relation_uses_relation_key() {
        let request = ImportRequest::set_relation(json!({"relation": "member"}));

        assert_eq!(
            request.to_json(),
            json!({"opCode": "OPCODE_SET", "relation": {"relation": "member"}})
        );
    }
}
