use super::Directory;
use crate::{CallOptions, ClientError};
use serde_json::{Value, json};

/// Page size used by list operations when the request has a `page` without a size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

impl Directory {
    /// Checks whether a subject has a relation or permission on an object.
    pub async fn check(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader.unary("Check", request, options).await
    }

    /// Runs several checks in one call.
    pub async fn checks(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader.unary("Checks", request, options).await
    }

    /// Gets one object, optionally with its relations.
    pub async fn object(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader
            .unary("GetObject", with_default_page_size(request), options)
            .await
    }

    /// Lists the objects of a type.
    pub async fn objects(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader
            .unary("GetObjects", with_default_page_size(request), options)
            .await
    }

    /// Gets several objects by identifier.
    pub async fn object_many(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.reader.unary("GetObjectMany", request, options).await
    }

    pub async fn relation(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader.unary("GetRelation", request, options).await
    }

    pub async fn relations(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Value, ClientError> {
        self.reader
            .unary("GetRelations", with_default_page_size(request), options)
            .await
    }

    /// Returns the objects reachable from an object through a relation or permission.
    pub async fn graph(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.reader.unary("GetGraph", request, options).await
    }
}

/// Sets `page.size` to [`DEFAULT_PAGE_SIZE`] when `page` is present but its size is absent or null.
///
/// An explicit size, `0` included, is kept. A request without `page` is left alone.
pub(crate) fn with_default_page_size(mut request: Value) -> Value {
    if let Some(page) = request.get_mut("page").and_then(Value::as_object_mut) {
        if page.get("size").is_none_or(Value::is_null) {
            page.insert("size".to_string(), json!(DEFAULT_PAGE_SIZE));
        }
    }
    request
}
