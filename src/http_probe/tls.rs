//! Certificate chain capture and verification.
//!
//! The HTTP transport accepts any certificate. The chain the server presents is
//! captured by [`CapturingVerifier`] and evaluated afterwards with
//! [`evaluate_chain`], so an invalid certificate shows up in the result instead
//! of failing the request.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::client::{Resumption, WebPkiServerVerifier};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error as RustlsError, RootCertStore, SignatureScheme};
use tokio::net::TcpStream;
use tokio::time::error::Elapsed;
use tokio_rustls::TlsConnector;
use tracing::debug;
use x509_parser::parse_x509_certificate;

use crate::error::CheckError;

/// Certificates presented by the peer, leaf first.
#[derive(Debug, Clone)]
pub struct PeerChain {
    pub certificates: Vec<CertificateDer<'static>>,
    pub handshake_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TlsReport {
    pub valid: bool,
    pub expiry_seconds: f64,
    pub errors: Vec<String>,
}

impl TlsReport {
    /// Report for targets that are not HTTPS.
    pub fn skipped() -> Self {
        Self {
            valid: true,
            expiry_seconds: 0.0,
            errors: Vec::new(),
        }
    }
}

pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Verifier backed by the bundled Mozilla root set.
pub fn web_pki_verifier(
    provider: Arc<CryptoProvider>,
) -> Result<Arc<WebPkiServerVerifier>, CheckError> {
    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider)
        .build()
        .map_err(|e| CheckError::InvalidRequest {
            message: format!("failed to build certificate verifier: {e}"),
        })
}

/// Accepts every server certificate and keeps the first chain it sees.
/// Handshake signatures are still checked so the session is a real one.
#[derive(Debug)]
pub struct CapturingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    captured: Mutex<Option<PeerChain>>,
}

impl CapturingVerifier {
    pub fn new(inner: Arc<WebPkiServerVerifier>) -> Self {
        Self {
            inner,
            captured: Mutex::new(None),
        }
    }

    /// Take the captured chain, if a handshake has happened.
    pub fn take(&self) -> Option<PeerChain> {
        self.captured
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }
}

impl ServerCertVerifier for CapturingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        let mut slot = self.captured.lock().unwrap_or_else(|e| e.into_inner());
        // Redirects may trigger further handshakes; only the target's counts.
        if slot.is_none() {
            let mut certificates = Vec::with_capacity(intermediates.len() + 1);
            certificates.push(end_entity.clone().into_owned());
            certificates.extend(intermediates.iter().map(|c| c.clone().into_owned()));

            let handshake_at = DateTime::from_timestamp(now.as_secs() as i64, 0)
                .unwrap_or_else(Utc::now);
            *slot = Some(PeerChain {
                certificates,
                handshake_at,
            });
        }
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Client configuration that hands certificate checking to `verifier`.
pub fn capturing_client_config(
    provider: Arc<CryptoProvider>,
    verifier: Arc<CapturingVerifier>,
) -> Result<ClientConfig, CheckError> {
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| CheckError::InvalidRequest {
            message: format!("failed to configure TLS: {e}"),
        })?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}

pub(crate) async fn within<F: Future>(
    timeout: Option<Duration>,
    fut: F,
) -> Result<F::Output, Elapsed> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut).await,
        None => Ok(fut.await),
    }
}

/// Open a dedicated TCP+TLS connection to `addr` and read the peer chain.
/// Session resumption is turned off so the server always sends its chain in
/// full. The connection is closed before returning.
pub async fn probe_peer_chain(
    addr: SocketAddr,
    host: &str,
    mut config: ClientConfig,
    timeout: Option<Duration>,
) -> Result<PeerChain, CheckError> {
    config.resumption = Resumption::disabled();

    let failed = |message: String| CheckError::TlsHandshakeFailed {
        host: host.to_string(),
        port: addr.port(),
        message,
    };
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| failed(format!("invalid server name: {e}")))?;

    let handshake_at = Utc::now();
    let stream = within(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| failed("TCP connection timed out".to_string()))?
        .map_err(|e| failed(e.to_string()))?;

    let connector = TlsConnector::from(Arc::new(config));
    let tls_stream = within(timeout, connector.connect(server_name, stream))
        .await
        .map_err(|_| failed("TLS handshake timed out".to_string()))?
        .map_err(|e| failed(e.to_string()))?;

    let (_, connection) = tls_stream.get_ref();
    let certificates: Vec<CertificateDer<'static>> = connection
        .peer_certificates()
        .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
        .unwrap_or_default();
    debug!(%addr, certificates = certificates.len(), "probe handshake complete");

    Ok(PeerChain {
        certificates,
        handshake_at,
    })
}

fn label(index: usize) -> String {
    match index {
        0 => "leaf certificate".to_string(),
        i => format!("intermediate certificate #{i}"),
    }
}

/// Verify a captured chain for `server_name`.
///
/// The leaf is verified against the name, with every other certificate of
/// the chain offered as an intermediate. On top of that every certificate must
/// be within its validity window at handshake time, including ones the path
/// to the root does not use.
pub fn evaluate_chain(
    verifier: &WebPkiServerVerifier,
    chain: &PeerChain,
    server_name: &ServerName<'_>,
) -> TlsReport {
    let Some((leaf, intermediates)) = chain.certificates.split_first() else {
        return TlsReport {
            valid: false,
            expiry_seconds: 0.0,
            errors: vec!["peer presented no certificates".to_string()],
        };
    };

    let mut errors = Vec::new();
    let at = chain.handshake_at.timestamp();
    let now = UnixTime::since_unix_epoch(Duration::from_secs(at.max(0) as u64));

    let leaf_verified = match verifier.verify_server_cert(leaf, intermediates, server_name, &[], now) {
        Ok(_) => true,
        Err(e) => {
            errors.push(format!("{}: {e}", label(0)));
            false
        }
    };

    let mut expiry_seconds = 0.0;
    for (index, der) in chain.certificates.iter().enumerate() {
        // A rejected leaf already carries its error.
        let leaf_reported = index == 0 && !leaf_verified;
        let cert = match parse_x509_certificate(der.as_ref()) {
            Ok((_, cert)) => cert,
            Err(_) if leaf_reported => continue,
            Err(e) => {
                errors.push(format!("{}: unparsable: {e}", label(index)));
                continue;
            }
        };

        let not_before = cert.validity().not_before.timestamp();
        let not_after = cert.validity().not_after.timestamp();
        if index == 0 {
            let handshake = chain.handshake_at.timestamp_millis() as f64 / 1000.0;
            expiry_seconds = not_after as f64 - handshake;
        }
        if leaf_reported {
            continue;
        }
        if at < not_before {
            errors.push(format!("{}: not valid before {}", label(index), cert.validity().not_before));
        } else if at > not_after {
            errors.push(format!("{}: expired at {}", label(index), cert.validity().not_after));
        }
    }

    TlsReport {
        valid: errors.is_empty(),
        expiry_seconds,
        errors,
    }
}
