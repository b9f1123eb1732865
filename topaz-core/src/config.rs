//! # Configuration
//!
//! A client is configured in two layers:
//!
//! 1. A [`BaseConfig`] shared by every service of the client.
//! 2. An optional [`ServiceConfig`] per logical service, overriding any subset of the base fields.
//!
//! Resolution happens once, at construction:
//!
//! * [`merge`] is the pure part. It decides whether a service is usable at all and applies the
//!   field precedence (local value first, then the base one).
//! * [`ConfigResolver`] adds the only I/O involved: reading CA bundles from disk. The base bundle
//!   is read once and shared; a service bundle is read only when its path differs from the base one.
//!
//! A service is usable when a URL is known, or when both an API key and a tenant id are known
//! (each one may come from either layer). Empty strings count as unset.
//!
//! ## Example
//!
//! ```rust
//! use topaz_core::config::{BaseConfig, ServiceConfig, merge};
//!
//! let base = BaseConfig {
//!     api_key: Some("B".into()),
//!     tenant_id: Some("T".into()),
//!     ..Default::default()
//! };
//! let writer = ServiceConfig {
//!     api_key: Some("A".into()),
//!     ..Default::default()
//! };
//!
//! let merged = merge(Some(&writer), &base).unwrap();
//! assert_eq!(merged.api_key.as_deref(), Some("A"));
//! assert_eq!(merged.tenant_id.as_deref(), Some("T"));
//! ```
use crate::{client::ServiceKind, transport::TransportError};
use prost_reflect::{DescriptorError, DescriptorPool};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Endpoint used by a directory service that is usable without an explicit URL.
pub const DEFAULT_DIRECTORY_URL: &str = "https://localhost:9292";
/// Endpoint used by the authorizer when no URL is configured.
pub const DEFAULT_AUTHORIZER_URL: &str = "https://localhost:8282";

pub const AUTHORIZATION_HEADER: &str = "authorization";
pub const TENANT_ID_HEADER: &str = "aserto-tenant-id";

/// Errors that can occur while building a client from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read CA certificate '{}': '{source}'", path.display())]
    ReadCaFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read configuration file '{}': '{source}'", path.display())]
    ReadConfigFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration file '{}': '{source}'", path.display())]
    ParseConfigFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode the built-in schemas: '{0}'")]
    Schemas(#[from] DescriptorError),
    #[error("Service '{0}' is missing from the built-in schemas")]
    MissingService(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Client-wide defaults, used as the fallback of every service.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
    /// Sent verbatim as the `authorization` header. Takes precedence over any API key.
    pub token: Option<String>,
    pub ca_file: Option<PathBuf>,
    /// Disables server certificate verification for every service of the client.
    pub insecure: bool,
    pub custom_headers: BTreeMap<String, String>,
    /// Extra schemas merged into the client's [`crate::MessageRegistry`].
    #[serde(skip)]
    pub additional_schemas: Vec<DescriptorPool>,
}

/// Per-service override of a [`BaseConfig`]. Unset fields are inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
    pub ca_file: Option<PathBuf>,
    pub custom_headers: BTreeMap<String, String>,
}

/// Configuration of a [`crate::Directory`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectoryConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    pub reader: Option<ServiceConfig>,
    pub writer: Option<ServiceConfig>,
    pub importer: Option<ServiceConfig>,
    pub exporter: Option<ServiceConfig>,
    pub model: Option<ServiceConfig>,
}

impl DirectoryConfig {
    /// Loads a configuration from a JSON file using the camelCase keys of the config structs.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }

    /// Returns the override of the given service, if any.
    pub fn service(&self, kind: ServiceKind) -> Option<&ServiceConfig> {
        match kind {
            ServiceKind::Reader => self.reader.as_ref(),
            ServiceKind::Writer => self.writer.as_ref(),
            ServiceKind::Importer => self.importer.as_ref(),
            ServiceKind::Exporter => self.exporter.as_ref(),
            ServiceKind::Model => self.model.as_ref(),
            ServiceKind::Authorizer => None,
        }
    }
}

/// Configuration of an [`crate::Authorizer`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthorizerConfig {
    #[serde(flatten)]
    pub base: BaseConfig,
    pub authorizer: Option<ServiceConfig>,
}

impl AuthorizerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        read_json(path)
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadConfigFile {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| ConfigError::ParseConfigFile {
        path: path.to_path_buf(),
        source,
    })
}

/// Result of merging a [`ServiceConfig`] over a [`BaseConfig`], before any file is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
    pub token: Option<String>,
    /// CA bundle path of the service, when it differs from the base one.
    pub ca_override: Option<PathBuf>,
    pub custom_headers: BTreeMap<String, String>,
}

/// Merges a service override over the base configuration.
///
/// Returns `None` when the result has neither a URL nor an API key and tenant id pair,
/// in which case the service must be bound to a [`crate::client::NullProxy`].
pub fn merge(local: Option<&ServiceConfig>, fallback: &BaseConfig) -> Option<MergedConfig> {
    Some(merge_layers(local, fallback)).filter(MergedConfig::is_usable)
}

fn merge_layers(local: Option<&ServiceConfig>, fallback: &BaseConfig) -> MergedConfig {
    let url = pick(local.and_then(|l| l.url.as_deref()), fallback.url.as_deref());
    let api_key = pick(
        local.and_then(|l| l.api_key.as_deref()),
        fallback.api_key.as_deref(),
    );
    let tenant_id = pick(
        local.and_then(|l| l.tenant_id.as_deref()),
        fallback.tenant_id.as_deref(),
    );

    let ca_override = local
        .and_then(|l| l.ca_file.clone())
        .filter(|path| fallback.ca_file.as_ref() != Some(path));

    let mut custom_headers = fallback.custom_headers.clone();
    if let Some(local) = local {
        custom_headers.extend(local.custom_headers.clone());
    }

    MergedConfig {
        url,
        api_key,
        tenant_id,
        token: non_empty(fallback.token.as_deref()).map(str::to_string),
        ca_override,
        custom_headers,
    }
}

impl MergedConfig {
    /// A URL, or an API key together with a tenant id.
    pub fn is_usable(&self) -> bool {
        self.url.is_some() || (self.api_key.is_some() && self.tenant_id.is_some())
    }
}

fn pick(local: Option<&str>, fallback: Option<&str>) -> Option<String> {
    non_empty(local)
        .or_else(|| non_empty(fallback))
        .map(str::to_string)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Credentials attached to every call made through a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub token: Option<String>,
    pub api_key: Option<String>,
    pub tenant_id: Option<String>,
}

impl Credentials {
    /// The credential headers, in the order they are applied.
    ///
    /// A token wins over an API key. The tenant header is independent of both.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(2);

        if let Some(token) = &self.token {
            headers.push((AUTHORIZATION_HEADER, token.clone()));
        } else if let Some(api_key) = &self.api_key {
            headers.push((AUTHORIZATION_HEADER, format!("basic {api_key}")));
        }

        if let Some(tenant_id) = &self.tenant_id {
            headers.push((TENANT_ID_HEADER, tenant_id.clone()));
        }

        headers
    }
}

/// TLS trust material of a transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsSettings {
    /// PEM bundle. When set, only its certificates are trusted.
    pub ca_certificate: Option<Arc<[u8]>>,
    pub insecure: bool,
}

/// Fully resolved parameters of one service's transport.
///
/// Two services with equal effective configurations share one transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
    pub url: String,
    pub credentials: Credentials,
    pub tls: TlsSettings,
    pub custom_headers: BTreeMap<String, String>,
}

/// Resolves service overrides against a base configuration.
#[derive(Debug, Clone)]
pub struct ConfigResolver<'a> {
    fallback: &'a BaseConfig,
    fallback_ca: Option<Arc<[u8]>>,
    default_url: &'a str,
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver, reading the base CA bundle if one is configured.
    pub fn new(fallback: &'a BaseConfig, default_url: &'a str) -> Result<Self, ConfigError> {
        let fallback_ca = fallback.ca_file.as_deref().map(read_ca_file).transpose()?;

        Ok(Self {
            fallback,
            fallback_ca,
            default_url,
        })
    }

    /// Resolves the effective configuration of a service.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(EffectiveConfig))` - The service is usable.
    /// * `Ok(None)` - The service has no usable endpoint.
    /// * `Err(ConfigError)` - The service CA bundle could not be read.
    pub fn resolve(
        &self,
        local: Option<&ServiceConfig>,
    ) -> Result<Option<EffectiveConfig>, ConfigError> {
        merge(local, self.fallback)
            .map(|merged| self.effective(merged))
            .transpose()
    }

    /// Resolves a service that is always usable: without an endpoint of its own it targets the
    /// default URL.
    pub fn resolve_or_default(
        &self,
        local: Option<&ServiceConfig>,
    ) -> Result<EffectiveConfig, ConfigError> {
        self.effective(merge_layers(local, self.fallback))
    }

    fn effective(&self, merged: MergedConfig) -> Result<EffectiveConfig, ConfigError> {
        let ca_certificate = match &merged.ca_override {
            Some(path) => Some(read_ca_file(path)?),
            None => self.fallback_ca.clone(),
        };

        Ok(EffectiveConfig {
            url: merged.url.unwrap_or_else(|| self.default_url.to_string()),
            credentials: Credentials {
                token: merged.token,
                api_key: merged.api_key,
                tenant_id: merged.tenant_id,
            },
            tls: TlsSettings {
                ca_certificate,
                insecure: self.fallback.insecure,
            },
            custom_headers: merged.custom_headers,
        })
    }
}

fn read_ca_file(path: &Path) -> Result<Arc<[u8]>, ConfigError> {
    std::fs::read(path)
        .map(Arc::from)
        .map_err(|source| ConfigError::ReadCaFile {
            path: path.to_path_buf(),
            source,
        })
}
