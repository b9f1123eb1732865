//! # Directory client
//!
//! [`Directory`] fronts the five services of the Topaz directory. Each service is resolved on its
//! own at construction (see [`crate::config`]) and bound either to a remote client or to a
//! [`NullProxy`]; the binding never changes afterwards.
//!
//! The operations live in one submodule per service. Requests and results are
//! `serde_json::Value`s in the proto3 JSON mapping.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use topaz_core::{CallOptions, Directory, DirectoryConfig, config::ServiceConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DirectoryConfig {
//!     reader: Some(ServiceConfig {
//!         url: Some("https://localhost:9292".into()),
//!         ..Default::default()
//!     }),
//!     ..Default::default()
//! };
//! let directory = Directory::new(&config)?;
//!
//! let user = directory
//!     .object(json!({"objectType": "user", "objectId": "rick@the-citadel.com"}), CallOptions::default())
//!     .await?;
//!
//! // The writer is not configured: this fails without any network activity.
//! assert!(directory.set_object(json!({"object": user["result"]}), CallOptions::default()).await.is_err());
//! # Ok(())
//! # }
//! ```
mod exporter;
mod importer;
mod model;
mod reader;
mod writer;

pub use exporter::{ExportOption, ParseExportOptionError};
pub use importer::{ImportMsg, ImportOpCode, ImportRequest};
pub use model::{Manifest, ManifestChunk};
pub use reader::DEFAULT_PAGE_SIZE;

pub use crate::facade::ResponseStream;

use crate::{
    client::{NullProxy, RemoteClient, ServiceClient, ServiceKind},
    config::{ConfigError, ConfigResolver, DEFAULT_DIRECTORY_URL, DirectoryConfig},
    facade::ServiceFacade,
    registry::MessageRegistry,
    trace::MessageObserver,
    transport::{Transport, TransportFactory},
};
use std::sync::Arc;

/// Client of the Topaz directory.
#[derive(Debug, Clone)]
pub struct Directory {
    reader: ServiceFacade,
    writer: ServiceFacade,
    importer: ServiceFacade,
    exporter: ServiceFacade,
    model: ServiceFacade,
    registry: Arc<MessageRegistry>,
}

impl Directory {
    /// Builds a directory client. No connection is attempted until the first call.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(config: &DirectoryConfig) -> Result<Self, ConfigError> {
        Self::build(config, None)
    }

    /// Like [`Directory::new`], reporting every message exchanged to `observer`.
    pub fn with_observer(
        config: &DirectoryConfig,
        observer: Arc<dyn MessageObserver>,
    ) -> Result<Self, ConfigError> {
        Self::build(config, Some(observer))
    }

    fn build(
        config: &DirectoryConfig,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Result<Self, ConfigError> {
        let registry = MessageRegistry::with_schemas(&config.base.additional_schemas)?;
        let resolver = ConfigResolver::new(&config.base, DEFAULT_DIRECTORY_URL)?;
        let factory = TransportFactory::new(resolver.resolve(None)?, observer)?;

        let mut clients = Vec::with_capacity(ServiceKind::DIRECTORY.len());
        for kind in ServiceKind::DIRECTORY {
            let client: Arc<dyn ServiceClient> = match resolver.resolve(config.service(kind))? {
                Some(effective) => {
                    let transport = factory.build(effective)?;
                    tracing::debug!(service = %kind, url = %transport.url(), "service configured");
                    Arc::new(RemoteClient::new(kind, transport))
                }
                None => {
                    tracing::warn!(service = %kind, "service is not configured, its calls will fail");
                    Arc::new(NullProxy::new(kind))
                }
            };
            clients.push((kind, client));
        }

        Self::assemble(registry, |kind| {
            clients
                .iter()
                .find(|(k, _)| *k == kind)
                .map(|(_, client)| client.clone())
                .unwrap_or_else(|| Arc::new(NullProxy::new(kind)))
        })
    }

    /// Builds a directory client over caller-provided service clients, one per directory service.
    pub fn from_clients(
        clients: impl FnMut(ServiceKind) -> Arc<dyn ServiceClient>,
    ) -> Result<Self, ConfigError> {
        Self::assemble(MessageRegistry::builtin()?, clients)
    }

    fn assemble(
        registry: MessageRegistry,
        mut clients: impl FnMut(ServiceKind) -> Arc<dyn ServiceClient>,
    ) -> Result<Self, ConfigError> {
        let pool = topaz_proto::descriptor_pool()?;
        let registry = Arc::new(registry);
        let mut facade = |kind| ServiceFacade::new(kind, clients(kind), &pool, registry.clone());

        Ok(Self {
            reader: facade(ServiceKind::Reader)?,
            writer: facade(ServiceKind::Writer)?,
            importer: facade(ServiceKind::Importer)?,
            exporter: facade(ServiceKind::Exporter)?,
            model: facade(ServiceKind::Model)?,
            registry,
        })
    }

    /// The transport a service is bound to, `None` when it is not configured.
    pub fn transport(&self, kind: ServiceKind) -> Option<Arc<Transport>> {
        self.facade(kind).and_then(ServiceFacade::transport)
    }

    /// The registry responses are serialized with.
    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    fn facade(&self, kind: ServiceKind) -> Option<&ServiceFacade> {
        match kind {
            ServiceKind::Reader => Some(&self.reader),
            ServiceKind::Writer => Some(&self.writer),
            ServiceKind::Importer => Some(&self.importer),
            ServiceKind::Exporter => Some(&self.exporter),
            ServiceKind::Model => Some(&self.model),
            ServiceKind::Authorizer => None,
        }
    }
}
