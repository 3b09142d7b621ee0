//! Response snapshots.
//!
//! A `Response` body is consumed by value. Any path that both hands a response
//! to the caller and writes it to a partition must `duplicate()` it first.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// A fetched or stored HTTP response.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    /// Header pairs in the order they were received.
    pub headers: Vec<(String, String)>,
    body: Bytes,
}

/// Serialisable header list used for the `headers_json` column.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HeaderList(pub Vec<(String, String)>);

impl Response {
    pub fn new(url: Url, status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { url, status, headers, body: body.into() }
    }

    /// Independent copy that can be consumed separately from `self`.
    pub fn duplicate(&self) -> Self {
        Self { url: self.url.clone(), status: self.status, headers: self.headers.clone(), body: self.body.clone() }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Consume the response, yielding its body.
    pub fn into_body(self) -> Bytes {
        self.body
    }

    /// Consume the response, decoding the body as UTF-8 (lossy).
    pub fn text(self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn headers_json(&self) -> Result<String, Error> {
        serde_json::to_string(&HeaderList(self.headers.clone())).map_err(|e| Error::CorruptEntry(e.to_string()))
    }
}
