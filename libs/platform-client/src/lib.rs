#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Typed client for the platform API
//!
//! This crate turns the platform's declared operations into typed async calls:
//! - Configuration resolved from caller props and environment defaults
//! - One long-lived hyper transport per client, with pooled keep-alive
//!   connections over rustls
//! - 100 MiB ceilings on request and response bodies
//! - A single error type that tells API error payloads apart from transport
//!   failures
//! - Raw binary file uploads outside the JSON dispatcher
//! - Lifecycle hooks for hosted integrations with a distinct authentication
//!   failure
//!
//! # Example
//!
//! ```ignore
//! use platform_client::{Client, ClientProps, CreateFileProps};
//! use platform_client::models::GetBotInput;
//!
//! let client = Client::new(&ClientProps::new().with_token(token).with_bot_id(bot_id))?;
//!
//! let bot = client.get_bot(&GetBotInput { id: bot_id.into() }).await?.bot;
//!
//! let uploaded = client
//!     .create_file(CreateFileProps::new("notes.txt", "hello").with_content_type("text/plain"))
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod files;
pub mod headers;
pub mod integration;
pub mod models;
pub mod operations;
mod tls;
pub mod transport;

pub use client::Client;
pub use config::{
    ClientConfig, ClientProps, DEFAULT_API_URL, DEFAULT_TIMEOUT_MS, EnvDefaults, Environment,
    Host, resolve,
};
pub use error::{
    ApiError, ApiErrorKind, ClientError, ErrorKind, RawFailure, TransportError,
    TransportErrorKind, normalize,
};
pub use files::{CreateFileProps, FileContent};
pub use headers::{HeaderValues, Headers};
pub use integration::{
    Event, IntegrationHooks, RegisterContext, RuntimeError, ensure_authenticated,
    verify_platform_credentials,
};
pub use operations::Operation;
pub use transport::{
    DefaultHeadersLayer, DefaultHeadersService, HyperTransport, MAX_BODY_BYTES, Transport,
    TransportRequest, TransportResponse,
};
