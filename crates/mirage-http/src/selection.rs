//! Per-request selection of the configuration that answers.

use hyper::header::{HeaderMap, HeaderName, InvalidHeaderName};
use std::borrow::Cow;

/// Header consulted when no other name is configured.
pub const DEFAULT_SELECTION_HEADER: &str = "x-mirage-config";

/// Picks the serving configuration from a request header.
#[derive(Debug, Clone)]
pub struct SelectionResolver {
    header: HeaderName,
}

impl Default for SelectionResolver {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static(DEFAULT_SELECTION_HEADER),
        }
    }
}

impl SelectionResolver {
    pub fn new(header: &str) -> Result<Self, InvalidHeaderName> {
        Ok(Self {
            header: HeaderName::from_bytes(header.trim().as_bytes())?,
        })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Raw selection key, `None` when the header is absent or empty.
    pub fn selection_key<'a>(&self, headers: &'a HeaderMap) -> Option<Cow<'a, str>> {
        headers
            .get(&self.header)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
            .filter(|value| !value.trim().is_empty())
    }

    /// Configuration that should serve the request.
    ///
    /// The header value is taken literally; an unknown name is reported as
    /// missing when the registry is consulted.
    pub fn resolve<'a>(&self, headers: &'a HeaderMap, default: &'a str) -> Cow<'a, str> {
        self.selection_key(headers)
            .unwrap_or(Cow::Borrowed(default))
    }
}
