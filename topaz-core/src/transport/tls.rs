//! # TLS connector
//!
//! `https://` endpoints are connected through a `rustls` connector plugged into
//! [`Endpoint::connect_with_connector_lazy`]. This gives full control over the trust settings:
//!
//! * With a CA bundle, only the certificates of the bundle are trusted.
//! * Without one, the Mozilla roots shipped by `webpki-roots` are trusted.
//! * With `insecure`, the server certificate is not verified at all. Handshake signatures are
//!   still checked.
//!
//! ALPN is pinned to `h2`.
use crate::{BoxError, config::TlsSettings};
use http::Uri;
use hyper_util::rt::TokioIo;
use rustls::{
    ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature},
    pki_types::{CertificateDer, ServerName, UnixTime, pem::PemObject},
};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_rustls::{TlsConnector, client::TlsStream};
use tonic::transport::{Channel, Endpoint};

const DEFAULT_HTTPS_PORT: u16 = 443;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("Invalid CA certificate: '{0}'")]
    InvalidCaCertificate(#[from] rustls::pki_types::pem::Error),
    #[error("The CA bundle does not contain any certificate")]
    EmptyCaBundle,
    #[error("Failed to build the TLS configuration: '{0}'")]
    Rustls(#[from] rustls::Error),
}

/// Creates a lazily connected channel that negotiates TLS with the given settings.
pub(crate) fn connect_lazy(
    endpoint: &Endpoint,
    settings: &TlsSettings,
) -> Result<Channel, TlsError> {
    let connector = TlsConnector::from(Arc::new(client_config(settings)?));

    Ok(endpoint.connect_with_connector_lazy(tower::service_fn(move |uri: Uri| {
        connect(connector.clone(), uri)
    })))
}

async fn connect(connector: TlsConnector, uri: Uri) -> Result<TokioIo<TlsStream<TcpStream>>, BoxError> {
    let host = uri
        .host()
        .ok_or("endpoint URL has no host")?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = uri.port_u16().unwrap_or(DEFAULT_HTTPS_PORT);

    let tcp = TcpStream::connect((host.as_str(), port)).await?;
    tcp.set_nodelay(true)?;

    let server_name = ServerName::try_from(host)?;
    let stream = connector.connect(server_name, tcp).await?;

    Ok(TokioIo::new(stream))
}

pub(crate) fn client_config(settings: &TlsSettings) -> Result<ClientConfig, TlsError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder =
        ClientConfig::builder_with_provider(provider.clone()).with_safe_default_protocol_versions()?;

    let mut config = if settings.insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification(provider)))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(trust_anchors(settings.ca_certificate.as_deref())?)
            .with_no_client_auth()
    };

    config.alpn_protocols = vec![b"h2".to_vec()];
    Ok(config)
}

fn trust_anchors(ca_certificate: Option<&[u8]>) -> Result<RootCertStore, TlsError> {
    let mut roots = RootCertStore::empty();

    match ca_certificate {
        Some(pem) => {
            for cert in CertificateDer::pem_slice_iter(pem) {
                roots.add(cert?)?;
            }
            if roots.is_empty() {
                return Err(TlsError::EmptyCaBundle);
            }
        }
        None => roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }

    Ok(roots)
}

/// Accepts any server certificate, used when the client is configured as `insecure`.
#[derive(Debug)]
struct SkipServerVerification(Arc<CryptoProvider>);

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}
