//! Backend connector: TCP dial plus optional TLS, bounded by one deadline.
//!
//! Backend certificates are accepted without verification. The handshake
//! signatures are still checked against the presented key.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::http::Uri;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder, MaybeHttpsStream};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{self, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio::net::TcpStream;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Connection produced by [`TimedConnector`].
pub type BackendStream = MaybeHttpsStream<TokioIo<TcpStream>>;

/// Dials `http` and `https` URIs, failing when dial plus handshake exceed
/// the configured timeout.
#[derive(Clone)]
pub struct TimedConnector {
    inner: HttpsConnector<HttpConnector>,
    timeout: Duration,
}

impl TimedConnector {
    /// `keepalive` sets the TCP keep-alive probe interval on every socket.
    pub fn new(timeout: Duration, keepalive: Duration) -> Result<Self, rustls::Error> {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_keepalive(Some(keepalive));

        let inner = HttpsConnectorBuilder::new()
            .with_tls_config(insecure_tls_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        Ok(Self { inner, timeout })
    }
}

impl Service<Uri> for TimedConnector {
    type Response = BackendStream;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<BackendStream, BoxError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), BoxError>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connecting = self.inner.call(uri);
        let timeout = self.timeout;
        Box::pin(async move {
            match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result,
                Err(_) => Err(format!("connect timed out after {timeout:?}").into()),
            }
        })
    }
}

fn insecure_tls_config() -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(crypto::aws_lc_rs::default_provider());
    let config = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate(provider)))
        .with_no_client_auth();
    Ok(config)
}

/// Trusts every certificate chain and server name.
#[derive(Debug)]
struct AcceptAnyCertificate(Arc<CryptoProvider>);

impl ServerCertVerifier for AcceptAnyCertificate {
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
        let algorithms = &self.0.signature_verification_algorithms;
        crypto::verify_tls12_signature(message, cert, dss, algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        let algorithms = &self.0.signature_verification_algorithms;
        crypto::verify_tls13_signature(message, cert, dss, algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_aws_lc_provider() {
        assert!(TimedConnector::new(Duration::from_secs(1), Duration::from_secs(10)).is_ok());
    }

    #[tokio::test]
    async fn dial_to_unroutable_address_times_out() {
        let mut connector =
            TimedConnector::new(Duration::from_millis(100), Duration::from_secs(1)).unwrap();
        // TEST-NET-1, never answers.
        let uri: Uri = "http://192.0.2.1:81".parse().unwrap();

        let started = std::time::Instant::now();
        let result = connector.call(uri).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
