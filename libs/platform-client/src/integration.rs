//! Lifecycle contract for hosted integrations.
//!
//! The hosting runtime calls [`IntegrationHooks::register`] when an
//! integration is installed. A failed credential check during registration
//! must surface as [`RuntimeError::AuthenticationFailed`] so the host can show
//! the user an actionable message instead of a generic failure.

use std::future::Future;

use async_trait::async_trait;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::Client;
use crate::error::{ApiErrorKind, ClientError, ErrorKind};
use crate::models::GetAccountInput;

/// Error returned by lifecycle hooks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    /// Credentials were rejected. The message is meant for the end user.
    #[error("{integration} authentication failed. Please check your access token.")]
    AuthenticationFailed {
        integration: String,
        /// Message of the rejected call, when one was received.
        reason: Option<String>,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0}")]
    Message(String),
}

impl RuntimeError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }
}

/// What the host passes to lifecycle hooks.
#[derive(Debug, Clone)]
pub struct RegisterContext {
    /// Client bound to the integration's platform credentials.
    pub client: Client,
    pub integration_id: Option<String>,
    pub webhook_url: Option<String>,
    /// Integration configuration as entered by the user.
    pub configuration: serde_json::Value,
}

/// Event delivered to a registered integration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Hooks a hosted integration implements.
#[async_trait]
pub trait IntegrationHooks: Send + Sync {
    /// Called once on installation. Implementations should verify their
    /// credentials here, typically through [`ensure_authenticated`].
    ///
    /// # Errors
    ///
    /// [`RuntimeError::AuthenticationFailed`] when credentials are rejected.
    async fn register(&self, ctx: &RegisterContext) -> Result<(), RuntimeError>;

    /// Called on uninstallation.
    ///
    /// # Errors
    ///
    /// Implementation defined; the default never fails.
    async fn unregister(&self, _ctx: &RegisterContext) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Called for each incoming event.
    ///
    /// # Errors
    ///
    /// Implementation defined; the default ignores the event.
    async fn handle(&self, _ctx: &RegisterContext, _event: &Event) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Run one authenticated probe call and classify the outcome.
///
/// `Ok(false)` and authorization failures (API kinds `Unauthorized` and
/// `Forbidden`, or HTTP 401/403) become [`RuntimeError::AuthenticationFailed`]
/// naming `integration`. Any other error is passed through as
/// [`RuntimeError::Client`].
///
/// # Errors
///
/// See above.
pub async fn ensure_authenticated<F>(integration: &str, probe: F) -> Result<(), RuntimeError>
where
    F: Future<Output = Result<bool, ClientError>>,
{
    let reason = match probe.await {
        Ok(true) => return Ok(()),
        Ok(false) => None,
        Err(err) if is_auth_failure(&err) => Some(err.message().to_owned()),
        Err(err) => return Err(RuntimeError::Client(err)),
    };
    tracing::warn!(integration, reason = ?reason, "integration authentication failed");
    Err(RuntimeError::AuthenticationFailed {
        integration: integration.to_owned(),
        reason,
    })
}

/// Check that `client` holds valid platform credentials.
///
/// # Errors
///
/// [`RuntimeError::AuthenticationFailed`] when the platform rejects the
/// credentials, [`RuntimeError::Client`] for any other failure.
pub async fn verify_platform_credentials(
    client: &Client,
    integration: &str,
) -> Result<(), RuntimeError> {
    ensure_authenticated(integration, async {
        client.get_account(&GetAccountInput).await.map(|_| true)
    })
    .await
}

fn is_auth_failure(err: &ClientError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Api(ApiErrorKind::Unauthorized | ApiErrorKind::Forbidden)
    ) || matches!(
        err.status(),
        Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    )
}
