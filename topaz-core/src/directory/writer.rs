use super::Directory;
use crate::{CallOptions, ClientError};
use serde_json::Value;

/// Server-assigned fields that are never sent back, in both JSON spellings.
const SERVER_TIMESTAMPS: [&str; 4] = ["createdAt", "updatedAt", "created_at", "updated_at"];

impl Directory {
    /// Creates or updates an object. Caller-held timestamps are dropped from `object`.
    pub async fn set_object(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.writer
            .unary("SetObject", without_timestamps(request, "object"), options)
            .await
    }

    pub async fn delete_object(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.writer.unary("DeleteObject", request, options).await
    }

    /// Creates or updates a relation. Caller-held timestamps are dropped from `relation`.
    pub async fn set_relation(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.writer
            .unary("SetRelation", without_timestamps(request, "relation"), options)
            .await
    }

    pub async fn delete_relation(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.writer.unary("DeleteRelation", request, options).await
    }
}

pub(crate) fn without_timestamps(mut request: Value, key: &str) -> Value {
    if let Some(entity) = request.get_mut(key).and_then(Value::as_object_mut) {
        for field in SERVER_TIMESTAMPS {
            entity.remove(field);
        }
    }
    request
}
