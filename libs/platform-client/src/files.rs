//! Raw binary upload.
//!
//! `create_file` bypasses the JSON dispatcher: the body is sent verbatim and
//! file metadata travels in headers.

use std::collections::BTreeSet;

use bytes::Bytes;
use http::Method;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use tracing::Instrument;

use crate::client::{Client, decode};
use crate::error::{ClientError, RawFailure, normalize};
use crate::headers::{self, HeaderValues, Headers};
use crate::models::CreateFileResponse;
use crate::transport::TransportRequest;

/// Path of the upload endpoint.
pub const UPLOAD_PATH: &str = "/v1/files";

/// Upload payload: raw bytes or UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Bytes(Bytes),
    Text(String),
}

impl FileContent {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes.len(),
            Self::Text(text) => text.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Text(text) => Bytes::from(text),
        }
    }
}

impl From<Bytes> for FileContent {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for FileContent {
    fn from(bytes: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(bytes))
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Input of [`Client::create_file`].
///
/// Identity fields override the configured identity headers for this call
/// only; when unset, the configured values are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFileProps {
    pub filename: String,
    pub content: FileContent,
    /// Sent verbatim. When unset no content type is sent at all.
    pub content_type: Option<String>,
    /// Sent verbatim. When unset the transport derives it from the body.
    pub content_length: Option<u64>,
    pub bot_id: Option<String>,
    pub integration_id: Option<String>,
    pub user_id: Option<String>,
    pub tags: BTreeSet<String>,
    pub access_policies: BTreeSet<String>,
}

impl CreateFileProps {
    #[must_use]
    pub fn new(filename: impl Into<String>, content: impl Into<FileContent>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: None,
            content_length: None,
            bot_id: None,
            integration_id: None,
            user_id: None,
            tags: BTreeSet::new(),
            access_policies: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    #[must_use]
    pub fn with_content_length(mut self, content_length: u64) -> Self {
        self.content_length = Some(content_length);
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
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_access_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.access_policies = policies.into_iter().map(Into::into).collect();
        self
    }
}

impl Client {
    /// Upload a file as a raw request body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Api`] when the platform rejects the upload and
    /// [`ClientError::Transport`] for every other failure, including bodies
    /// above the transport ceiling.
    pub async fn create_file(
        &self,
        props: CreateFileProps,
    ) -> Result<CreateFileResponse, ClientError> {
        let span = tracing::debug_span!(
            "platform_call",
            operation = "createFile",
            method = %Method::POST,
            filename = %props.filename,
        );
        async move {
            let request = self.upload_request(props).map_err(normalize)?;
            let body = self.execute(request).await?;
            decode(&body)
        }
        .instrument(span)
        .await
    }

    fn upload_request(&self, props: CreateFileProps) -> Result<TransportRequest, RawFailure> {
        let headers = upload_headers(self.config().headers(), &props)
            .to_header_map()
            .map_err(RawFailure::Transport)?;
        let uri = self.endpoint(UPLOAD_PATH, "")?;

        let mut request = TransportRequest::new(Method::POST, uri)
            .with_headers(headers)
            .with_body(props.content.into_bytes());
        if props.content_type.is_none() {
            request = request.suppress_default(CONTENT_TYPE);
        }
        if props.content_length.is_none() {
            request = request.suppress_default(CONTENT_LENGTH);
        }
        Ok(request)
    }
}

/// Per-call headers: a copy of the configured headers with upload metadata
/// laid over it. The configured map itself is never touched.
fn upload_headers(config: &Headers, props: &CreateFileProps) -> Headers {
    let mut map = config.clone();
    map.insert(headers::FILENAME, props.filename.as_str());

    for (name, value) in [
        (headers::BOT_ID, &props.bot_id),
        (headers::INTEGRATION_ID, &props.integration_id),
        (headers::USER_ID, &props.user_id),
    ] {
        if let Some(value) = value {
            map.insert(name, value.as_str());
        }
    }

    for (name, values) in [
        (headers::TAGS, &props.tags),
        (headers::ACCESS_POLICIES, &props.access_policies),
    ] {
        if !values.is_empty() {
            map.insert(name, HeaderValues::Many(values.iter().cloned().collect()));
        }
    }

    match &props.content_type {
        Some(content_type) => {
            map.insert(headers::CONTENT_TYPE, content_type.as_str());
        }
        None => {
            map.remove(headers::CONTENT_TYPE);
        }
    }
    match props.content_length {
        Some(length) => {
            map.insert(headers::CONTENT_LENGTH, length.to_string());
        }
        None => {
            map.remove(headers::CONTENT_LENGTH);
        }
    }
    map
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn config_headers() -> Headers {
        [
            ("x-bot-id", "config-bot"),
            ("x-integration-id", "config-integration"),
            ("content-type", "application/json"),
            ("authorization", "Bearer t"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn upload_headers_copy_config_and_add_filename() {
        let config = config_headers();
        let snapshot = config.clone();

        let sent = upload_headers(&config, &CreateFileProps::new("a.txt", "hello"));

        assert_eq!(config, snapshot);
        assert_eq!(sent.get_str(headers::FILENAME), Some("a.txt"));
        assert_eq!(sent.get_str(headers::BOT_ID), Some("config-bot"));
        assert_eq!(sent.get_str(headers::AUTHORIZATION), Some("Bearer t"));
        assert!(!sent.contains(headers::CONTENT_TYPE));
        assert!(!sent.contains(headers::CONTENT_LENGTH));
        assert!(!sent.contains(headers::USER_ID));
        assert!(!sent.contains(headers::TAGS));
    }

    #[test]
    fn per_call_identity_overrides_config() {
        let props = CreateFileProps::new("a.txt", "hello")
            .with_bot_id("call-bot")
            .with_user_id("user-1");

        let sent = upload_headers(&config_headers(), &props);

        assert_eq!(sent.get_str(headers::BOT_ID), Some("call-bot"));
        assert_eq!(
            sent.get_str(headers::INTEGRATION_ID),
            Some("config-integration")
        );
        assert_eq!(sent.get_str(headers::USER_ID), Some("user-1"));
    }

    #[test]
    fn explicit_content_type_and_length_are_sent_verbatim() {
        let props = CreateFileProps::new("a.txt", "hello")
            .with_content_type("text/plain")
            .with_content_length(5);

        let sent = upload_headers(&config_headers(), &props);

        assert_eq!(sent.get_str(headers::CONTENT_TYPE), Some("text/plain"));
        assert_eq!(sent.get_str(headers::CONTENT_LENGTH), Some("5"));
    }

    #[test]
    fn tags_and_policies_become_repeated_values() {
        let props = CreateFileProps::new("a.txt", "hello")
            .with_tags(["b", "a"])
            .with_access_policies(["public_content"]);

        let sent = upload_headers(&Headers::new(), &props);

        let tags: Vec<_> = sent.get(headers::TAGS).unwrap().iter().collect();
        assert_eq!(tags, vec!["a", "b"]);
        assert_eq!(
            sent.get_str(headers::ACCESS_POLICIES),
            Some("public_content")
        );
    }

    #[test]
    fn file_content_converts_to_bytes() {
        assert_eq!(FileContent::from("hi").into_bytes(), Bytes::from_static(b"hi"));
        assert_eq!(FileContent::from(vec![0_u8, 1, 2]).len(), 3);
        assert!(FileContent::from(Bytes::new()).is_empty());
    }
}
