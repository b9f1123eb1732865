use super::Directory;
use crate::{CallOptions, ClientError, client::method_name, registry::MessageRegistry};
use futures_util::TryStreamExt;
use prost::bytes::Bytes;
use prost_reflect::{DynamicMessage, ReflectMessage, Value as ProtoValue};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// One message of the `GetManifest` stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ManifestChunk {
    Metadata {
        updated_at: Option<String>,
        etag: String,
    },
    Body(Vec<u8>),
    Model(Value),
}

impl ManifestChunk {
    /// Reads the chunk carried by a `GetManifestResponse`, `None` when it carries nothing.
    pub fn from_response(
        registry: &MessageRegistry,
        response: &DynamicMessage,
    ) -> Result<Option<Self>, ClientError> {
        if let Some(metadata) = message_field(response, "metadata") {
            let metadata = registry.serialize(&metadata)?;
            return Ok(Some(ManifestChunk::Metadata {
                updated_at: metadata
                    .get("updatedAt")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                etag: metadata
                    .get("etag")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }));
        }

        if let Some(body) = message_field(response, "body") {
            let data = body
                .get_field_by_name("data")
                .and_then(|data| data.as_bytes().map(|b| b.to_vec()))
                .unwrap_or_default();
            return Ok(Some(ManifestChunk::Body(data)));
        }

        if let Some(model) = message_field(response, "model") {
            return Ok(Some(ManifestChunk::Model(registry.serialize(&model)?)));
        }

        Ok(None)
    }
}

fn message_field(message: &DynamicMessage, name: &str) -> Option<DynamicMessage> {
    if !message.has_field_by_name(name) {
        return None;
    }
    message
        .get_field_by_name(name)
        .and_then(|value| value.as_message().cloned())
}

/// A manifest as read back from the model service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// The manifest text, decoded as UTF-8 with invalid sequences replaced.
    pub body: String,
    /// The model compiled from the manifest, `{}` when the server sent none.
    pub model: Value,
    pub updated_at: Option<String>,
    pub etag: Option<String>,
}

impl Manifest {
    /// Folds a chunk sequence: body bytes are concatenated in arrival order, the first model
    /// and the first metadata chunks win.
    pub fn fold(chunks: impl IntoIterator<Item = ManifestChunk>) -> Self {
        let mut body = Vec::new();
        let mut model = None;
        let mut metadata = None;

        for chunk in chunks {
            match chunk {
                ManifestChunk::Body(data) => body.extend_from_slice(&data),
                ManifestChunk::Model(value) => {
                    model.get_or_insert(value);
                }
                ManifestChunk::Metadata { updated_at, etag } => {
                    metadata.get_or_insert((updated_at, etag));
                }
            }
        }

        let (updated_at, etag) = match metadata {
            Some((updated_at, etag)) => (updated_at, Some(etag)),
            None => (None, None),
        };

        Manifest {
            body: String::from_utf8_lossy(&body).into_owned(),
            model: model.unwrap_or_else(|| Value::Object(Map::new())),
            updated_at,
            etag,
        }
    }
}

impl Directory {
    /// Reads the whole manifest stream and folds it into one [`Manifest`].
    pub async fn get_manifest(&self, options: CallOptions) -> Result<Manifest, ClientError> {
        let responses: Vec<DynamicMessage> = self
            .model
            .server_streaming("GetManifest", json!({}), options)
            .await?
            .try_collect()
            .await?;

        let mut chunks = Vec::with_capacity(responses.len());
        for response in &responses {
            if let Some(chunk) = ManifestChunk::from_response(self.registry(), response)? {
                chunks.push(chunk);
            }
        }

        Ok(Manifest::fold(chunks))
    }

    /// Replaces the manifest. The whole text is sent as a single body chunk.
    pub async fn set_manifest(&self, body: &str, options: CallOptions) -> Result<Value, ClientError> {
        let method = self.model.prepare("SetManifest")?;
        let invalid = |reason: String| ClientError::InvalidRequest {
            method: method_name(&method),
            reason,
        };

        let mut request = DynamicMessage::new(method.input());
        let body_descriptor = request
            .descriptor()
            .get_field_by_name("body")
            .and_then(|field| field.kind().as_message().cloned())
            .ok_or_else(|| invalid("request has no 'body' message field".to_string()))?;

        let mut chunk = DynamicMessage::new(body_descriptor);
        chunk
            .try_set_field_by_name("data", ProtoValue::Bytes(Bytes::from(body.to_owned())))
            .map_err(|e| invalid(e.to_string()))?;
        request
            .try_set_field_by_name("body", ProtoValue::Message(chunk))
            .map_err(|e| invalid(e.to_string()))?;

        let response = self
            .model
            .client_streaming(method, vec![request], options)
            .await?;
        Ok(self.registry().serialize(&response)?)
    }

    pub async fn delete_manifest(&self, options: CallOptions) -> Result<Value, ClientError> {
        self.model.unary("DeleteManifest", json!({}), options).await
    }
}
