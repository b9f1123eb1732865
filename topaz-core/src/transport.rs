//! # Transports
//!
//! A [`Transport`] is one lazily connected gRPC channel to one resolved endpoint, wrapped in the
//! [`HeaderInterceptor`] that attaches credentials and custom headers to every call.
//!
//! The [`TransportFactory`] owns the base transport of a client. Services whose
//! [`EffectiveConfig`] equals the base one get the same `Arc<Transport>` back; any difference
//! (URL, credentials, TLS material or headers) yields a dedicated transport. Transports are built
//! once at construction and live as long as the client holding them.
//!
//! Building a transport performs no network I/O, but it must happen inside a Tokio runtime
//! because the channel spawns its background worker.
pub mod tls;

use crate::{config::EffectiveConfig, trace::MessageObserver};
use std::{fmt, sync::Arc};
use tonic::{
    Request, Status,
    metadata::{
        AsciiMetadataKey, AsciiMetadataValue,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    service::{Interceptor, interceptor::InterceptedService},
    transport::{Channel, Endpoint},
};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid URL '{0}': '{1}'")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Invalid header name '{key}': '{source}'")]
    InvalidHeaderKey {
        key: String,
        source: InvalidMetadataKey,
    },
    #[error("Invalid value for header '{key}': '{source}'")]
    InvalidHeaderValue {
        key: String,
        source: InvalidMetadataValue,
    },
    #[error("Invalid TLS settings: '{0}'")]
    Tls(#[from] tls::TlsError),
}

/// The service type calls are issued on.
pub type TransportService = InterceptedService<Channel, HeaderInterceptor>;

/// Attaches the credential headers and the custom headers to every outgoing request.
///
/// A custom header overrides a credential header of the same name. Headers the request already
/// carries, i.e. the per-call ones, are left untouched.
#[derive(Clone)]
pub struct HeaderInterceptor {
    headers: Arc<[(AsciiMetadataKey, AsciiMetadataValue)]>,
}

impl HeaderInterceptor {
    pub fn new(settings: &EffectiveConfig) -> Result<Self, TransportError> {
        let credentials = settings
            .credentials
            .headers()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value));
        let custom = settings
            .custom_headers
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()));

        let mut headers: Vec<(AsciiMetadataKey, AsciiMetadataValue)> = Vec::new();
        for (key, value) in credentials.chain(custom) {
            let (key, value) = parse_header(key, value)?;
            match headers.iter_mut().find(|(existing, _)| *existing == key) {
                Some(entry) => entry.1 = value,
                None => headers.push((key, value)),
            }
        }

        Ok(Self {
            headers: headers.into(),
        })
    }

    /// Names of the headers this interceptor sets, in application order.
    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(|(key, _)| key.as_str())
    }
}

impl fmt::Debug for HeaderInterceptor {
    // Header values carry secrets.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderInterceptor")
            .field("headers", &self.header_names().collect::<Vec<_>>())
            .finish()
    }
}

impl Interceptor for HeaderInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        let metadata = request.metadata_mut();
        for (key, value) in self.headers.iter() {
            if !metadata.contains_key(key) {
                metadata.insert(key.clone(), value.clone());
            }
        }
        Ok(request)
    }
}

fn parse_header(
    key: String,
    value: String,
) -> Result<(AsciiMetadataKey, AsciiMetadataValue), TransportError> {
    let parsed_key = AsciiMetadataKey::from_bytes(key.to_ascii_lowercase().as_bytes())
        .map_err(|source| TransportError::InvalidHeaderKey {
            key: key.clone(),
            source,
        })?;
    let parsed_value = AsciiMetadataValue::try_from(value.as_str())
        .map_err(|source| TransportError::InvalidHeaderValue { key, source })?;
    Ok((parsed_key, parsed_value))
}

/// A lazily connected channel bound to one [`EffectiveConfig`].
pub struct Transport {
    settings: EffectiveConfig,
    service: TransportService,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl Transport {
    /// Builds the channel for `settings`. No connection is attempted until the first call.
    pub fn connect(
        settings: EffectiveConfig,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Result<Self, TransportError> {
        let interceptor = HeaderInterceptor::new(&settings)?;

        let endpoint = Endpoint::from_shared(settings.url.clone())
            .map_err(|e| TransportError::InvalidUrl(settings.url.clone(), e))?;

        let channel = match endpoint.uri().scheme_str() {
            Some("https") => tls::connect_lazy(&endpoint, &settings.tls)?,
            _ => endpoint.connect_lazy(),
        };

        Ok(Self {
            settings,
            service: InterceptedService::new(channel, interceptor),
            observer,
        })
    }

    pub fn url(&self) -> &str {
        &self.settings.url
    }

    pub fn settings(&self) -> &EffectiveConfig {
        &self.settings
    }

    pub(crate) fn service(&self) -> TransportService {
        self.service.clone()
    }

    pub(crate) fn observer(&self) -> Option<&Arc<dyn MessageObserver>> {
        self.observer.as_ref()
    }
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.settings.url)
            .field("insecure", &self.settings.tls.insecure)
            .field("traced", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

/// Builds transports, reusing the base one whenever the effective configuration allows it.
#[derive(Debug)]
pub struct TransportFactory {
    base: Option<Arc<Transport>>,
    observer: Option<Arc<dyn MessageObserver>>,
}

impl TransportFactory {
    /// Creates the factory and, when the base configuration is usable on its own, the base transport.
    pub fn new(
        base: Option<EffectiveConfig>,
        observer: Option<Arc<dyn MessageObserver>>,
    ) -> Result<Self, TransportError> {
        let base = base
            .map(|settings| Transport::connect(settings, observer.clone()).map(Arc::new))
            .transpose()?;

        Ok(Self { base, observer })
    }

    pub fn base(&self) -> Option<&Arc<Transport>> {
        self.base.as_ref()
    }

    /// Whether `effective` can be served by the base transport.
    pub fn is_baseline(&self, effective: &EffectiveConfig) -> bool {
        self.base
            .as_ref()
            .is_some_and(|base| base.settings() == effective)
    }

    /// Returns the base transport for a baseline configuration, a new transport otherwise.
    pub fn build(&self, effective: EffectiveConfig) -> Result<Arc<Transport>, TransportError> {
        if let Some(base) = self.base.as_ref().filter(|_| self.is_baseline(&effective)) {
            tracing::debug!(url = %base.url(), "reusing base transport");
            return Ok(base.clone());
        }

        tracing::debug!(url = %effective.url, "building dedicated transport");
        Transport::connect(effective, self.observer.clone()).map(Arc::new)
    }
}
