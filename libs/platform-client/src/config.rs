//! Client configuration resolution.
//!
//! [`resolve`] merges caller [`ClientProps`] with environment defaults into an
//! immutable [`ClientConfig`]. Environment values are an explicit input
//! ([`Environment`]) so resolution stays deterministic and testable; the
//! process environment is only read by [`Environment::from_process_env`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::headers::{self, Headers};

/// Base URL used when neither the caller nor the environment supplies one.
pub const DEFAULT_API_URL: &str = "https://api.botpress.cloud";

/// Per-call timeout in milliseconds used when none is supplied.
pub const DEFAULT_TIMEOUT_MS: i64 = 60_000;

pub const API_URL_ENV: &str = "BP_API_URL";
pub const BOT_ID_ENV: &str = "BP_BOT_ID";
pub const INTEGRATION_ID_ENV: &str = "BP_INTEGRATION_ID";
pub const WORKSPACE_ID_ENV: &str = "BP_WORKSPACE_ID";
pub const TOKEN_ENV: &str = "BP_TOKEN";

const REDACTED: &str = "[REDACTED]";

/// Kind of host the client runs in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Host {
    /// Native process: environment defaults apply, connections are pooled
    #[default]
    Process,
    /// Browser-like host: credentials ride on the session, the host owns connection reuse
    Browser,
}

/// Defaults taken from the hosting environment.
///
/// `Debug` redacts the token.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvDefaults {
    pub api_url: Option<String>,
    pub bot_id: Option<String>,
    pub integration_id: Option<String>,
    pub workspace_id: Option<String>,
    pub token: Option<String>,
}

impl EnvDefaults {
    /// Read `BP_API_URL`, `BP_BOT_ID`, `BP_INTEGRATION_ID`, `BP_WORKSPACE_ID`
    /// and `BP_TOKEN`. Unset or empty variables are ignored.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            api_url: read_env(API_URL_ENV),
            bot_id: read_env(BOT_ID_ENV),
            integration_id: read_env(INTEGRATION_ID_ENV),
            workspace_id: read_env(WORKSPACE_ID_ENV),
            token: read_env(TOKEN_ENV),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl fmt::Debug for EnvDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvDefaults")
            .field("api_url", &self.api_url)
            .field("bot_id", &self.bot_id)
            .field("integration_id", &self.integration_id)
            .field("workspace_id", &self.workspace_id)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

/// Everything resolution needs to know about where the client runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    pub host: Host,
    pub defaults: EnvDefaults,
}

impl Environment {
    /// Process host with defaults read from the current process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self {
            host: Host::Process,
            defaults: EnvDefaults::from_process_env(),
        }
    }

    /// Process host without any environment defaults.
    #[must_use]
    pub fn isolated() -> Self {
        Self::default()
    }

    /// Browser-like host. Environment defaults never apply there.
    #[must_use]
    pub fn browser() -> Self {
        Self {
            host: Host::Browser,
            defaults: EnvDefaults::default(),
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: EnvDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

/// Caller-supplied client properties. Every field is optional.
///
/// `Debug` redacts the token.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientProps {
    pub integration_id: Option<String>,
    pub workspace_id: Option<String>,
    pub bot_id: Option<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
    /// Timeout in milliseconds. Not validated.
    pub timeout: Option<i64>,
    /// Extra headers; these win over computed headers on collision.
    pub headers: Option<Headers>,
}

impl ClientProps {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    #[must_use]
    pub fn with_integration_id(mut self, integration_id: impl Into<String>) -> Self {
        self.integration_id = Some(integration_id.into());
        self
    }

    #[must_use]
    pub fn with_workspace_id(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: i64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }
}

impl fmt::Debug for ClientProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProps")
            .field("integration_id", &self.integration_id)
            .field("workspace_id", &self.workspace_id)
            .field("bot_id", &self.bot_id)
            .field("token", &self.token.as_ref().map(|_| REDACTED))
            .field("api_url", &self.api_url)
            .field("timeout", &self.timeout)
            .field("headers", &self.headers)
            .finish()
    }
}

/// Resolved, read-only client configuration.
///
/// Only [`resolve`] constructs it and no method hands out mutable access, so
/// one value describes a client for its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    api_url: String,
    headers: Headers,
    with_credentials: bool,
    timeout_ms: i64,
    host: Host,
}

impl ClientConfig {
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    #[must_use]
    pub fn with_credentials(&self) -> bool {
        self.with_credentials
    }

    /// Timeout exactly as resolved, in milliseconds.
    #[must_use]
    pub fn timeout_ms(&self) -> i64 {
        self.timeout_ms
    }

    #[must_use]
    pub fn host(&self) -> Host {
        self.host
    }

    /// Timeout as applied by the transport.
    ///
    /// `0` means no timeout; a negative value expires immediately.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        match self.timeout_ms {
            0 => None,
            ms if ms < 0 => Some(Duration::ZERO),
            ms => Some(Duration::from_millis(ms.unsigned_abs())),
        }
    }
}

/// Resolve caller properties against the environment.
///
/// Precedence per field is: explicit prop, then environment default (process
/// hosts only), then the built-in default. Caller `headers` are merged last
/// and win over computed headers. Never fails; malformed values pass through.
#[must_use]
pub fn resolve(props: &ClientProps, env: &Environment) -> ClientConfig {
    let no_defaults = EnvDefaults::default();
    let defaults = match env.host {
        Host::Process => &env.defaults,
        Host::Browser => &no_defaults,
    };
    let pick = |explicit: Option<&String>, fallback: Option<&String>| explicit.or(fallback).cloned();

    let workspace_id = pick(props.workspace_id.as_ref(), defaults.workspace_id.as_ref());
    let bot_id = pick(props.bot_id.as_ref(), defaults.bot_id.as_ref());
    let integration_id = pick(props.integration_id.as_ref(), defaults.integration_id.as_ref());
    let token = pick(props.token.as_ref(), defaults.token.as_ref());
    let api_url = pick(props.api_url.as_ref(), defaults.api_url.as_ref());

    let mut computed = Headers::new();
    if let Some(workspace_id) = workspace_id {
        computed.insert(headers::WORKSPACE_ID, workspace_id);
    }
    if let Some(bot_id) = bot_id {
        computed.insert(headers::BOT_ID, bot_id);
    }
    if let Some(integration_id) = integration_id {
        computed.insert(headers::INTEGRATION_ID, integration_id);
    }
    if let Some(token) = token {
        computed.insert(headers::AUTHORIZATION, format!("Bearer {token}"));
    }
    if let Some(extra) = &props.headers {
        computed.merge(extra);
    }

    ClientConfig {
        api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
        headers: computed,
        with_credentials: env.host == Host::Browser,
        timeout_ms: props.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
        host: env.host,
    }
}
