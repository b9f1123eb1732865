//! # Authorizer client
//!
//! [`Authorizer`] fronts the Topaz authorizer (`aserto.authorizer.v2.Authorizer`). Unlike the
//! directory services, the authorizer is always usable: without a URL it targets
//! [`DEFAULT_AUTHORIZER_URL`].
use crate::{
    CallOptions, ClientError,
    client::{RemoteClient, ServiceClient, ServiceKind},
    config::{AuthorizerConfig, ConfigError, ConfigResolver, DEFAULT_AUTHORIZER_URL},
    facade::ServiceFacade,
    registry::MessageRegistry,
    trace::MessageObserver,
    transport::{Transport, TransportFactory},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The decision tree of a policy path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTree {
    pub path: Value,
    pub path_root: String,
}

/// Client of the Topaz authorizer.
#[derive(Debug, Clone)]
pub struct Authorizer {
    authorizer: ServiceFacade,
}

impl Authorizer {
    /// Builds an authorizer client. No connection is attempted until the first call.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: &AuthorizerConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    pub fn with_observer(
        config: &AuthorizerConfig,
        observer: Arc<dyn MessageObserver>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(observer))
    }

    fn build(
        config: &AuthorizerConfig,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Result<Self, ConfigError> {
        let registry = MessageRegistry::with_schemas(&config.base.additional_schemas)?;
        let resolver = ConfigResolver::new(&config.base, DEFAULT_AUTHORIZER_URL)?;

        let effective = resolver.resolve_or_default(config.authorizer.as_ref())?;

        let transport = TransportFactory::new(None, observer)?.build(effective)?;
        tracing::debug!(url = %transport.url(), "authorizer configured");
        let client: Arc<dyn ServiceClient> =
            Arc::new(RemoteClient::new(ServiceKind::Authorizer, transport));

        Self::assemble(registry, client)
    }

    /// Builds an authorizer client over a caller-provided service client.
    pub fn from_client(client: Arc<dyn ServiceClient>) -> Result<Self, ConfigError> {
        Self::assemble(MessageRegistry::builtin()?, client)
    }

    fn assemble(
        registry: MessageRegistry,
        client: Arc<dyn ServiceClient>,
    ) -> Result<Self, ConfigError> {
        let pool = topaz_proto::descriptor_pool()?;
        let authorizer =
            ServiceFacade::new(ServiceKind::Authorizer, client, &pool, Arc::new(registry))?;

        Ok(Self { authorizer })
    }

    pub fn transport(&self) -> Option<Arc<Transport>> {
        self.authorizer.transport()
    }

    pub fn registry(&self) -> &MessageRegistry {
        self.authorizer.registry()
    }

    /// Evaluates decisions. `policyInstance.instanceLabel` is always set to `policyInstance.name`.
    pub async fn is(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.authorizer
            .unary("Is", with_instance_label(request), options)
            .await
    }

    /// Whether the first decision of [`Authorizer::is`] allows access. `false` without decisions.
    pub async fn allowed(&self, request: Value, options: CallOptions) -> Result<bool, ClientError> {
        let response = self.is(request, options).await?;

        Ok(response
            .pointer("/decisions/0/is")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Runs a query and returns its result document, `{}` when there is none.
    pub async fn query(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        let mut response = self.authorizer.unary("Query", request, options).await?;

        Ok(response
            .get_mut("response")
            .map(Value::take)
            .unwrap_or_else(empty_object))
    }

    pub async fn decision_tree(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<DecisionTree, ClientError> {
        let mut response = self
            .authorizer
            .unary("DecisionTree", request, options)
            .await?;

        Ok(DecisionTree {
            path: response
                .get_mut("path")
                .map(Value::take)
                .unwrap_or_else(empty_object),
            path_root: response
                .get("pathRoot")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Lists the policy modules loaded in the authorizer.
    pub async fn list_policies(
        &self,
        request: Value,
        options: CallOptions,
    ) -> Result<Vec<Value>, ClientError> {
        let mut response = self
            .authorizer
            .unary("ListPolicies", request, options)
            .await?;

        Ok(match response.get_mut("result").map(Value::take) {
            Some(Value::Array(modules)) => modules,
            _ => Vec::new(),
        })
    }

    pub async fn get_policy(&self, request: Value, options: CallOptions) -> Result<Value, ClientError> {
        self.authorizer.unary("GetPolicy", request, options).await
    }

    /// Version information of the authorizer.
    pub async fn info(&self, options: CallOptions) -> Result<Value, ClientError> {
        self.authorizer
            .unary("Info", Value::Object(Map::new()), options)
            .await
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn with_instance_label(mut request: Value) -> Value {
    let Some(object) = request.as_object_mut() else {
        return request;
    };
    let instance = object
        .entry("policyInstance")
        .or_insert_with(empty_object);
    if let Some(instance) = instance.as_object_mut() {
        let name = instance.get("name").cloned().unwrap_or(Value::Null);
        instance.insert("instanceLabel".to_string(), name);
    }
    request
}
