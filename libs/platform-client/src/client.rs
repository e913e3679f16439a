use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use http::{Method, Uri};
use serde::de::DeserializeOwned;
use tracing::Instrument;

use crate::config::{ClientConfig, ClientProps, Environment, resolve};
use crate::error::{ClientError, RawFailure, TransportError, normalize};
use crate::headers;
use crate::operations::Operation;
use crate::transport::{HyperTransport, Transport, TransportRequest};

/// Typed client for the platform API.
///
/// Cloning is cheap: clones share the resolved configuration and the
/// transport, including its connection pool.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl Client {
    /// Build a client from `props`, using the process environment for defaults.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the configured headers are not valid HTTP
    /// or TLS cannot be initialised.
    pub fn new(props: &ClientProps) -> Result<Self, ClientError> {
        Self::with_environment(props, &Environment::from_process_env())
    }

    /// Build a client resolving `props` against an explicit environment.
    ///
    /// # Errors
    ///
    /// Same as [`Client::new`].
    pub fn with_environment(props: &ClientProps, env: &Environment) -> Result<Self, ClientError> {
        Self::from_config(resolve(props, env))
    }

    /// Build a client with the default hyper transport for `config`.
    ///
    /// # Errors
    ///
    /// Same as [`Client::new`].
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        let transport =
            HyperTransport::new(&config).map_err(|e| normalize(RawFailure::Transport(e)))?;
        if config.api_url().starts_with("http://") && config.headers().contains(headers::AUTHORIZATION)
        {
            tracing::warn!(
                api_url = config.api_url(),
                "credentials will be sent over plain http"
            );
        }
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client over a caller-provided transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Dispatch a declared operation.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the platform answers with an error
    /// payload and [`ClientError::Transport`] for every other failure.
    pub async fn call<Op: Operation>(&self, input: &Op::Input) -> Result<Op::Output, ClientError> {
        let span = tracing::debug_span!("platform_call", operation = Op::NAME, method = %Op::METHOD);
        async move {
            let request = self.operation_request::<Op>(input).map_err(normalize)?;
            let body = self.execute(request).await?;
            decode(&body)
        }
        .instrument(span)
        .await
    }

    fn operation_request<Op: Operation>(
        &self,
        input: &Op::Input,
    ) -> Result<TransportRequest, RawFailure> {
        let path = Op::path(input);
        let mut map = self.config_header_map()?;
        if Op::METHOD == Method::GET || Op::METHOD == Method::DELETE {
            let query = serde_urlencoded::to_string(input)
                .map_err(|e| RawFailure::Encode(Box::new(e)))?;
            return Ok(TransportRequest::new(Op::METHOD, self.endpoint(&path, &query)?)
                .with_headers(map));
        }

        let body = serde_json::to_vec(input).map_err(|e| RawFailure::Encode(Box::new(e)))?;
        map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(TransportRequest::new(Op::METHOD, self.endpoint(&path, "")?)
            .with_headers(map)
            .with_body(body))
    }

    /// Configured headers as the base of every per-call header map.
    fn config_header_map(&self) -> Result<HeaderMap, RawFailure> {
        self.config
            .headers()
            .to_header_map()
            .map_err(RawFailure::Transport)
    }

    /// Absolute URI for `path` on the configured base URL.
    pub(crate) fn endpoint(&self, path: &str, query: &str) -> Result<Uri, RawFailure> {
        let base = self.config.api_url().trim_end_matches('/');
        let url = if query.is_empty() {
            format!("{base}{path}")
        } else {
            format!("{base}{path}?{query}")
        };
        url.parse::<Uri>().map_err(|e| {
            RawFailure::Transport(TransportError::invalid_request(
                format!("invalid request URL '{url}'"),
                e,
            ))
        })
    }

    /// Send through the shared transport and return the body of a successful
    /// response. Failing statuses go through the normalizer.
    pub(crate) async fn execute(&self, request: TransportRequest) -> Result<Bytes, ClientError> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| normalize(RawFailure::Transport(e)))?;
        if !response.is_success() {
            return Err(normalize(RawFailure::Status {
                status: response.status,
                body: response.body,
            }));
        }
        tracing::debug!(status = %response.status, "platform call succeeded");
        Ok(response.body)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Decode a success body. An empty body reads as `{}`.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let body = if body.trim_ascii().is_empty() {
        b"{}".as_slice()
    } else {
        body
    };
    serde_json::from_slice(body).map_err(|e| normalize(RawFailure::Decode(e)))
}
