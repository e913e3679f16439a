//! Error taxonomy and the failure normalizer.
//!
//! Two failure sources exist: the remote API answering with an error payload,
//! and everything else (network, timeout, body limits, decoding). Both end up
//! as a [`ClientError`], and [`normalize`] is the only place that performs the
//! translation.

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Boxed error used as the preserved cause of transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Maximum number of body bytes kept when an error payload is not recognised.
pub const ERROR_BODY_PREVIEW_LIMIT: usize = 8 * 1024;

/// Error kinds declared by the platform API.
///
/// Kinds the client does not know are kept verbatim in [`ApiErrorKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ApiErrorKind {
    Unknown,
    Internal,
    Unauthorized,
    Forbidden,
    PayloadTooLarge,
    InvalidPayload,
    UnsupportedMediaType,
    MethodNotFound,
    ResourceNotFound,
    InvalidJsonSchema,
    InvalidDataFormat,
    InvalidIdentifier,
    RelationConflict,
    ReferenceConstraint,
    ReferenceNotFound,
    InvalidQuery,
    Runtime,
    AlreadyExists,
    RateLimited,
    PaymentRequired,
    QuotaExceeded,
    LimitExceeded,
    BreakingChanges,
    Other(String),
}

impl ApiErrorKind {
    /// Parse a remote-declared kind. Unrecognised names map to `Other`.
    #[must_use]
    pub fn parse(kind: &str) -> Self {
        match kind {
            "Unknown" => Self::Unknown,
            "Internal" => Self::Internal,
            "Unauthorized" => Self::Unauthorized,
            "Forbidden" => Self::Forbidden,
            "PayloadTooLarge" => Self::PayloadTooLarge,
            "InvalidPayload" => Self::InvalidPayload,
            "UnsupportedMediaType" => Self::UnsupportedMediaType,
            "MethodNotFound" => Self::MethodNotFound,
            "ResourceNotFound" => Self::ResourceNotFound,
            "InvalidJsonSchema" => Self::InvalidJsonSchema,
            "InvalidDataFormat" => Self::InvalidDataFormat,
            "InvalidIdentifier" => Self::InvalidIdentifier,
            "RelationConflict" => Self::RelationConflict,
            "ReferenceConstraint" => Self::ReferenceConstraint,
            "ReferenceNotFound" => Self::ReferenceNotFound,
            "InvalidQuery" => Self::InvalidQuery,
            "Runtime" => Self::Runtime,
            "AlreadyExists" => Self::AlreadyExists,
            "RateLimited" => Self::RateLimited,
            "PaymentRequired" => Self::PaymentRequired,
            "QuotaExceeded" => Self::QuotaExceeded,
            "LimitExceeded" => Self::LimitExceeded,
            "BreakingChanges" => Self::BreakingChanges,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Best-effort kind for a payload that only carries a numeric code.
    #[must_use]
    pub fn from_status(code: u16) -> Self {
        match code {
            400 => Self::InvalidPayload,
            401 => Self::Unauthorized,
            402 => Self::PaymentRequired,
            403 => Self::Forbidden,
            404 => Self::ResourceNotFound,
            405 => Self::MethodNotFound,
            409 => Self::AlreadyExists,
            413 => Self::PayloadTooLarge,
            415 => Self::UnsupportedMediaType,
            429 => Self::RateLimited,
            500 => Self::Internal,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unknown => "Unknown",
            Self::Internal => "Internal",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::InvalidPayload => "InvalidPayload",
            Self::UnsupportedMediaType => "UnsupportedMediaType",
            Self::MethodNotFound => "MethodNotFound",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::InvalidJsonSchema => "InvalidJsonSchema",
            Self::InvalidDataFormat => "InvalidDataFormat",
            Self::InvalidIdentifier => "InvalidIdentifier",
            Self::RelationConflict => "RelationConflict",
            Self::ReferenceConstraint => "ReferenceConstraint",
            Self::ReferenceNotFound => "ReferenceNotFound",
            Self::InvalidQuery => "InvalidQuery",
            Self::Runtime => "Runtime",
            Self::AlreadyExists => "AlreadyExists",
            Self::RateLimited => "RateLimited",
            Self::PaymentRequired => "PaymentRequired",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::LimitExceeded => "LimitExceeded",
            Self::BreakingChanges => "BreakingChanges",
            Self::Other(kind) => kind,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error returned by the platform API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Remote-declared kind.
    pub kind: ApiErrorKind,
    /// Remote-declared message, verbatim.
    pub message: String,
    /// Occurrence id assigned by the platform, when present.
    pub id: Option<String>,
    /// Numeric code from the payload, when present.
    pub code: Option<u16>,
    /// HTTP status of the response that carried the payload.
    pub status: Option<StatusCode>,
}

/// Classification of failures that did not come with an API error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum TransportErrorKind {
    /// The call exceeded the configured timeout
    Timeout,
    /// Connection could not be established
    Connect,
    /// Request or response body exceeded the size ceiling
    BodyTooLarge,
    /// Successful response could not be decoded
    Decode,
    /// Request could not be built (bad header, URL, or input encoding)
    InvalidRequest,
    /// TLS initialisation failed
    Tls,
    /// Failing status whose body is not an API error payload
    UnexpectedResponse,
    /// Any other failure
    Other,
}

impl TransportErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::BodyTooLarge => "body too large",
            Self::Decode => "decode",
            Self::InvalidRequest => "invalid request",
            Self::Tls => "tls",
            Self::UnexpectedResponse => "unexpected response",
            Self::Other => "transport",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of non-API origin. The original message is preserved.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
    status: Option<StatusCode>,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Wrap an arbitrary error, keeping its message and the error as source.
    pub fn from_source(kind: TransportErrorKind, source: impl Into<BoxError>) -> Self {
        let source = source.into();
        Self {
            kind,
            message: source.to_string(),
            status: None,
            source: Some(source),
        }
    }

    pub(crate) fn invalid_request(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            kind: TransportErrorKind::InvalidRequest,
            message: message.into(),
            status: None,
            source: Some(source.into()),
        }
    }

    pub(crate) fn timeout(after: Duration) -> Self {
        Self::new(
            TransportErrorKind::Timeout,
            format!("timeout of {}ms exceeded", after.as_millis()),
        )
    }

    pub(crate) fn body_too_large(direction: &str, limit: usize) -> Self {
        Self::new(
            TransportErrorKind::BodyTooLarge,
            format!("{direction} body larger than maxBodyLength limit of {limit} bytes"),
        )
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }
}

impl From<hyper_util::client::legacy::Error> for TransportError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        let kind = if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            TransportErrorKind::Other
        };
        Self::from_source(kind, err)
    }
}

/// The single error type surfaced by every client call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The platform replied with a structured error payload.
    #[error(transparent)]
    Api(ApiError),

    /// Network, timeout, body-limit, decoding or any other non-API failure.
    #[error(transparent)]
    Transport(TransportError),
}

/// Borrowed view of a [`ClientError`] kind for exhaustive matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind<'a> {
    Api(&'a ApiErrorKind),
    Transport(TransportErrorKind),
}

impl ClientError {
    /// `true` when the remote end produced a recognisable error payload.
    #[must_use]
    pub fn is_api_error(&self) -> bool {
        matches!(self, Self::Api(_))
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind<'_> {
        match self {
            Self::Api(err) => ErrorKind::Api(&err.kind),
            Self::Transport(err) => ErrorKind::Transport(err.kind),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Api(err) => &err.message,
            Self::Transport(err) => &err.message,
        }
    }

    /// HTTP status of the failing response, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(err) => err.status,
            Self::Transport(err) => err.status,
        }
    }

    #[must_use]
    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            Self::Transport(_) => None,
        }
    }
}

/// A failure as observed at a call site, before normalization.
#[derive(Debug)]
pub enum RawFailure {
    /// The remote end answered with a non-success status.
    Status { status: StatusCode, body: Bytes },
    /// No usable response: network, timeout, limits, request building.
    Transport(TransportError),
    /// A success response whose body did not match the expected shape.
    Decode(serde_json::Error),
    /// The call input could not be encoded.
    Encode(BoxError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadCode {
    Number(u16),
    Text(String),
    /// Any other JSON value, such as a float or an out-of-range number.
    Other(serde_json::Value),
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<PayloadCode>,
    id: Option<String>,
}

impl ErrorPayload {
    fn into_api_error(self, status: StatusCode) -> Option<ApiError> {
        let (kind, code) = match (self.kind, self.code) {
            (Some(kind), Some(PayloadCode::Number(code))) => (ApiErrorKind::parse(&kind), Some(code)),
            (Some(kind), _) => (ApiErrorKind::parse(&kind), None),
            (None, Some(PayloadCode::Text(code))) => (ApiErrorKind::parse(&code), None),
            (None, Some(PayloadCode::Number(code))) => (ApiErrorKind::from_status(code), Some(code)),
            (None, Some(PayloadCode::Other(code))) => {
                tracing::debug!(%code, "error payload carries a non-standard code");
                (ApiErrorKind::from_status(status.as_u16()), None)
            }
            (None, None) => return None,
        };
        Some(ApiError {
            kind,
            message: self.message,
            id: self.id,
            code,
            status: Some(status),
        })
    }
}

/// Convert any raw failure into the typed error hierarchy.
///
/// Failing responses whose body is an API error payload become
/// [`ClientError::Api`]; everything else becomes [`ClientError::Transport`].
#[must_use]
pub fn normalize(failure: RawFailure) -> ClientError {
    let err = match failure {
        RawFailure::Status { status, body } => match decode_api_error(status, &body) {
            Some(api) => ClientError::Api(api),
            None => ClientError::Transport(unexpected_response(status, &body)),
        },
        RawFailure::Transport(err) => ClientError::Transport(err),
        RawFailure::Decode(err) => {
            ClientError::Transport(TransportError::from_source(TransportErrorKind::Decode, err))
        }
        RawFailure::Encode(err) => ClientError::Transport(TransportError::from_source(
            TransportErrorKind::InvalidRequest,
            err,
        )),
    };
    tracing::debug!(error = %err, api_error = err.is_api_error(), "platform call failed");
    err
}

fn decode_api_error(status: StatusCode, body: &[u8]) -> Option<ApiError> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<ErrorPayload>(body)
        .ok()
        .and_then(|payload| payload.into_api_error(status))
}

fn unexpected_response(status: StatusCode, body: &[u8]) -> TransportError {
    let preview = &body[..body.len().min(ERROR_BODY_PREVIEW_LIMIT)];
    let message = if preview.is_empty() {
        format!("request failed with status {status}")
    } else {
        format!(
            "request failed with status {status}: {}",
            String::from_utf8_lossy(preview)
        )
    };
    TransportError::new(TransportErrorKind::UnexpectedResponse, message).with_status(status)
}
