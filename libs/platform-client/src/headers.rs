//! Header names and the header map shared by configuration and transport.
//!
//! Keys are stored lowercase so that caller-supplied names like
//! `Authorization` collide with the computed `authorization` default.

use std::collections::BTreeMap;
use std::fmt;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub const AUTHORIZATION: &str = "authorization";
pub const BOT_ID: &str = "x-bot-id";
pub const INTEGRATION_ID: &str = "x-integration-id";
pub const USER_ID: &str = "x-user-id";
pub const WORKSPACE_ID: &str = "x-workspace-id";
pub const FILENAME: &str = "x-filename";
pub const TAGS: &str = "x-tags";
pub const ACCESS_POLICIES: &str = "x-access-policies";
pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_LENGTH: &str = "content-length";
pub const USER_AGENT: &str = "user-agent";

const REDACTED: &str = "[REDACTED]";

/// A single header value or a sequence of values sent as repeated headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    One(String),
    Many(Vec<String>),
}

impl HeaderValues {
    /// Iterate over every value in send order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        };
        values.iter().map(String::as_str)
    }

    /// First value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        self.iter().next()
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<String> for HeaderValues {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for HeaderValues {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Header map keyed by lowercase header name.
///
/// `Debug` redacts the `authorization` value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, HeaderValues>",
    into = "BTreeMap<String, HeaderValues>"
)]
pub struct Headers(BTreeMap<String, HeaderValues>);

impl From<BTreeMap<String, HeaderValues>> for Headers {
    fn from(map: BTreeMap<String, HeaderValues>) -> Self {
        map.into_iter().collect()
    }
}

impl From<Headers> for BTreeMap<String, HeaderValues> {
    fn from(headers: Headers) -> Self {
        headers.0
    }
}

impl Headers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous one under the same name.
    pub fn insert(
        &mut self,
        name: impl AsRef<str>,
        value: impl Into<HeaderValues>,
    ) -> Option<HeaderValues> {
        self.0
            .insert(name.as_ref().to_ascii_lowercase(), value.into())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HeaderValues> {
        self.0.get(&name.to_ascii_lowercase())
    }

    /// First value stored under `name`.
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(HeaderValues::first)
    }

    pub fn remove(&mut self, name: &str) -> Option<HeaderValues> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_ascii_lowercase())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValues)> {
        self.0.iter().map(|(name, values)| (name.as_str(), values))
    }

    /// Merge `other` into `self`; entries of `other` win on collision.
    pub fn merge(&mut self, other: &Headers) {
        for (name, values) in other.iter() {
            self.insert(name, values.clone());
        }
    }

    /// Convert into an [`http::HeaderMap`], appending one entry per value.
    ///
    /// # Errors
    ///
    /// Returns an `InvalidRequest` transport error if a name or value is not
    /// valid HTTP header text.
    pub fn to_header_map(&self) -> Result<HeaderMap, TransportError> {
        let mut map = HeaderMap::with_capacity(self.0.len());
        for (name, values) in &self.0 {
            let header_name = HeaderName::try_from(name.as_str())
                .map_err(|e| TransportError::invalid_request(format!("invalid header name '{name}'"), e))?;
            for value in values.iter() {
                let mut header_value = HeaderValue::try_from(value).map_err(|e| {
                    TransportError::invalid_request(format!("invalid value for header '{name}'"), e)
                })?;
                if header_name == http::header::AUTHORIZATION {
                    header_value.set_sensitive(true);
                }
                map.append(header_name.clone(), header_value);
            }
        }
        Ok(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: AsRef<str>,
    V: Into<HeaderValues>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, values) in &self.0 {
            if name == AUTHORIZATION {
                map.entry(name, &REDACTED);
            } else {
                map.entry(name, values);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn insert_lowercases_names() {
        let mut headers = Headers::new();
        headers.insert("Authorization", "Bearer a");
        headers.insert("authorization", "Bearer b");

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_str("AUTHORIZATION"), Some("Bearer b"));
    }

    #[test]
    fn merge_prefers_other() {
        let mut base: Headers = [("x-bot-id", "bot"), ("x-user-id", "user")]
            .into_iter()
            .collect();
        let overrides: Headers = [("X-Bot-Id", "other-bot")].into_iter().collect();

        base.merge(&overrides);

        assert_eq!(base.get_str(BOT_ID), Some("other-bot"));
        assert_eq!(base.get_str(USER_ID), Some("user"));
    }

    #[test]
    fn many_values_become_repeated_headers() {
        let headers: Headers = [(
            TAGS,
            HeaderValues::Many(vec!["a".to_owned(), "b".to_owned()]),
        )]
        .into_iter()
        .collect();

        let map = headers.to_header_map().unwrap();
        let values: Vec<_> = map.get_all(TAGS).iter().collect();
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn invalid_header_value_is_rejected() {
        let headers: Headers = [("x-custom", "bad\nvalue")].into_iter().collect();
        let err = headers.to_header_map().unwrap_err();
        assert_eq!(err.kind(), crate::TransportErrorKind::InvalidRequest);
    }

    #[test]
    fn authorization_is_sensitive_and_redacted() {
        let headers: Headers = [(AUTHORIZATION, "Bearer secret-token")]
            .into_iter()
            .collect();

        let map = headers.to_header_map().unwrap();
        assert!(map.get(http::header::AUTHORIZATION).unwrap().is_sensitive());

        let debug = format!("{headers:?}");
        assert!(!debug.contains("secret-token"), "debug output leaked token: {debug}");
    }

    #[test]
    fn deserialized_names_are_lowercased() {
        let headers: Headers =
            serde_json::from_str(r#"{"Authorization":"Bearer a","X-Bot-Id":"bot"}"#).unwrap();

        assert_eq!(headers.get_str(AUTHORIZATION), Some("Bearer a"));
        assert_eq!(
            headers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec![AUTHORIZATION, BOT_ID]
        );
    }

    #[test]
    fn header_values_deserialize_untagged() {
        let one: HeaderValues = serde_json::from_str(r#""v""#).unwrap();
        let many: HeaderValues = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(one, HeaderValues::One("v".to_owned()));
        assert_eq!(many.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
