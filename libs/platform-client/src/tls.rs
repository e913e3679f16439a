//! TLS connector construction for the hyper transport.

use std::sync::Arc;
use std::time::Duration;

use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;

use crate::error::{TransportError, TransportErrorKind};

/// Crypto provider for TLS connections.
///
/// Uses the process-wide default when one is installed, otherwise a fresh
/// `aws-lc-rs` provider that is not installed globally.
#[must_use]
pub fn get_crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Build an HTTPS connector over `webpki` roots that also accepts plain `http`.
///
/// `tcp_keepalive` enables TCP keep-alive probes on every opened socket.
///
/// # Errors
///
/// Returns a `Tls` transport error if the crypto provider rejects the default
/// protocol versions.
pub fn build_connector(
    tcp_keepalive: Option<Duration>,
) -> Result<HttpsConnector<HttpConnector>, TransportError> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_keepalive(tcp_keepalive);
    http.set_nodelay(true);

    let connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_provider_and_webpki_roots(get_crypto_provider())
        .map_err(|e| TransportError::from_source(TransportErrorKind::Tls, e))?
        .https_or_http()
        .enable_all_versions()
        .wrap_connector(http);
    Ok(connector)
}
