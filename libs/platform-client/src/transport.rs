//! HTTP transport shared by every call of a client.
//!
//! [`Transport`] is the seam between the client and the network. The
//! production implementation, [`HyperTransport`], is a pooled hyper client
//! with rustls, a tower layer that applies the configured default headers,
//! a per-call timeout and body size ceilings in both directions.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, Request, Response, StatusCode, Uri};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tower::{Layer, Service, ServiceExt};

use crate::config::{ClientConfig, Host};
use crate::error::{TransportError, TransportErrorKind};
use crate::tls;

/// Ceiling for request and response bodies: 100 MiB.
pub const MAX_BODY_BYTES: usize = 100 * 1024 * 1024;

/// How long an idle pooled connection is kept before closing.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Maximum idle connections kept per host.
pub const POOL_MAX_IDLE_PER_HOST: usize = 32;

/// TCP keep-alive interval on pooled sockets.
pub const TCP_KEEPALIVE: Duration = Duration::from_secs(60);

/// `user-agent` sent when the configuration does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("platform-client/", env!("CARGO_PKG_VERSION"));

/// One outgoing exchange.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Absolute URI including scheme and host.
    pub uri: Uri,
    /// Per-call headers. These take precedence over transport defaults.
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Default headers the transport must not add to this request.
    pub suppressed_defaults: Vec<HeaderName>,
}

impl TransportRequest {
    #[must_use]
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            suppressed_defaults: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Keep the transport from filling in `name` from its defaults.
    #[must_use]
    pub fn suppress_default(mut self, name: HeaderName) -> Self {
        self.suppressed_defaults.push(name);
        self
    }
}

/// Fully-read response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TransportResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Sends requests on behalf of a client.
///
/// Implementations resolve with `Ok` for every HTTP status, including
/// failing ones; `Err` is reserved for exchanges that produced no response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one exchange and read the whole response body.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when no complete response was received.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Request extension listing defaults that must not be applied.
#[derive(Debug, Clone, Default)]
struct SuppressedDefaults(Vec<HeaderName>);

/// Tower layer that fills in default headers missing from a request.
#[derive(Clone)]
pub struct DefaultHeadersLayer {
    defaults: Arc<HeaderMap>,
}

impl DefaultHeadersLayer {
    #[must_use]
    pub fn new(defaults: HeaderMap) -> Self {
        Self {
            defaults: Arc::new(defaults),
        }
    }
}

impl<S> Layer<S> for DefaultHeadersLayer {
    type Service = DefaultHeadersService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DefaultHeadersService {
            inner,
            defaults: Arc::clone(&self.defaults),
        }
    }
}

/// Service produced by [`DefaultHeadersLayer`].
#[derive(Clone)]
pub struct DefaultHeadersService<S> {
    inner: S,
    defaults: Arc<HeaderMap>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for DefaultHeadersService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let suppressed = req
            .extensions_mut()
            .remove::<SuppressedDefaults>()
            .unwrap_or_default();
        for name in self.defaults.keys() {
            if req.headers().contains_key(name) || suppressed.0.contains(name) {
                continue;
            }
            for value in self.defaults.get_all(name) {
                req.headers_mut().append(name.clone(), value.clone());
            }
        }
        self.inner.call(req)
    }
}

type PooledClient = HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>;

/// Production transport over a pooled hyper client.
///
/// The configured timeout bounds the whole exchange, reading the response
/// body included, so it wraps [`Transport::send`] rather than sitting in the
/// tower stack as a `TimeoutLayer` that would stop at the response head.
/// Clones share the connection pool.
#[derive(Clone)]
pub struct HyperTransport {
    service: DefaultHeadersService<PooledClient>,
    timeout: Option<Duration>,
    max_body_bytes: usize,
}

impl HyperTransport {
    /// Build the transport bound to `config`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if a configured header is not valid HTTP,
    /// or `Tls` if the TLS connector cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut defaults = config.headers().to_header_map()?;
        if !defaults.contains_key(http::header::USER_AGENT) {
            defaults.insert(
                http::header::USER_AGENT,
                HeaderValue::from_static(DEFAULT_USER_AGENT),
            );
        }

        let pooled = config.host() == Host::Process;
        let connector = tls::build_connector(pooled.then_some(TCP_KEEPALIVE))?;

        let mut builder = HyperClient::builder(TokioExecutor::new());
        if pooled {
            // pool_idle_timeout only takes effect with a timer
            builder
                .pool_timer(TokioTimer::new())
                .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
                .pool_idle_timeout(POOL_IDLE_TIMEOUT);
        }
        let client: PooledClient = builder.build(connector);

        tracing::debug!(
            api_url = config.api_url(),
            host = ?config.host(),
            timeout_ms = config.timeout_ms(),
            "built hyper transport"
        );

        Ok(Self {
            service: DefaultHeadersLayer::new(defaults).layer(client),
            timeout: config.timeout(),
            max_body_bytes: MAX_BODY_BYTES,
        })
    }

    /// Override the body ceiling applied in both directions.
    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    async fn exchange(&self, req: Request<Full<Bytes>>) -> Result<TransportResponse, TransportError> {
        let response = self.service.clone().oneshot(req).await?;
        let (parts, body) = response.into_parts();
        let body = read_body_limited(body, self.max_body_bytes).await?;
        tracing::debug!(status = %parts.status, bytes = body.len(), "received response");
        Ok(TransportResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        if request.body.len() > self.max_body_bytes {
            return Err(TransportError::body_too_large("request", self.max_body_bytes));
        }

        let TransportRequest {
            method,
            uri,
            headers,
            body,
            suppressed_defaults,
        } = request;
        tracing::debug!(%method, %uri, bytes = body.len(), "sending request");

        let mut req = Request::new(Full::new(body));
        *req.method_mut() = method;
        *req.uri_mut() = uri;
        *req.headers_mut() = headers;
        req.extensions_mut()
            .insert(SuppressedDefaults(suppressed_defaults));

        match self.timeout {
            Some(after) => tokio::time::timeout(after, self.exchange(req))
                .await
                .map_err(|_| TransportError::timeout(after))?,
            None => self.exchange(req).await,
        }
    }
}

/// Collect a response body, failing once it exceeds `limit` bytes.
async fn read_body_limited<B>(body: B, limit: usize) -> Result<Bytes, TransportError>
where
    B: http_body::Body<Data = Bytes>,
    B::Error: Into<crate::error::BoxError>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(TransportError::body_too_large("response", limit))
        }
        Err(err) => Err(TransportError::from_source(TransportErrorKind::Other, err)),
    }
}
