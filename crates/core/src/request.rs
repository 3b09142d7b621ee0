//! Request metadata seen by the worker.
//!
//! Only the parts of a request that routing and cache keying depend on are
//! modelled: method, URL, destination and mode.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// What the requesting context intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Style,
    Image,
    Font,
    Manifest,
    /// fetch()/XHR calls carry no destination.
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Subresource types served from the static partition.
    pub fn is_static_asset(self) -> bool {
        matches!(self, Destination::Script | Destination::Style | Destination::Image | Destination::Font)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Destination::Document => "document",
            Destination::Script => "script",
            Destination::Style => "style",
            Destination::Image => "image",
            Destination::Font => "font",
            Destination::Manifest => "manifest",
            Destination::Empty => "",
            Destination::Other => "other",
        }
    }
}

impl FromStr for Destination {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "document" => Destination::Document,
            "script" => Destination::Script,
            "style" => Destination::Style,
            "image" => Destination::Image,
            "font" => Destination::Font,
            "manifest" => Destination::Manifest,
            "" | "empty" => Destination::Empty,
            _ => Destination::Other,
        })
    }
}

/// Request mode; `Navigate` marks a full-document load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::NoCors => "no-cors",
            RequestMode::Cors => "cors",
        };
        f.write_str(s)
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: Url,
    #[serde(default)]
    pub destination: Destination,
    #[serde(default)]
    pub mode: RequestMode,
    /// Extra request headers forwarded upstream. Not part of the cache key.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Option<Bytes>,
}

impl RequestInfo {
    /// A plain `GET` with no destination, as issued by `fetch()`.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            destination: Destination::Empty,
            mode: RequestMode::Cors,
            headers: Vec::new(),
            body: None,
        }
    }

    /// A top-level document load.
    pub fn navigate(url: Url) -> Self {
        Self { destination: Destination::Document, mode: RequestMode::Navigate, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.trim().to_ascii_uppercase();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Copy of this request pointed at another path on the same origin.
    pub fn with_path(&self, path: &str) -> Result<Self, Error> {
        let url = self.url.join(path).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { url, body: None, ..self.clone() })
    }
}

/// Resolve a user-supplied URL, treating root-relative paths as relative to `origin`.
pub fn resolve_url(origin: &Url, input: &str) -> Result<Url, Error> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }

    match Url::parse(trimmed) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            origin.join(trimmed).map_err(|e| Error::InvalidUrl(e.to_string()))
        }
        Err(e) => Err(Error::InvalidUrl(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_destination_parse_case_insensitive() {
        assert_eq!("Script".parse::<Destination>().unwrap(), Destination::Script);
        assert_eq!("".parse::<Destination>().unwrap(), Destination::Empty);
        assert_eq!("audioworklet".parse::<Destination>().unwrap(), Destination::Other);
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("NAVIGATE".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("no-cors".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert!("websocket".parse::<RequestMode>().is_err());
    }

    #[test]
    fn test_with_method_uppercases() {
        let req = RequestInfo::get(url("http://localhost/api/x")).with_method("post");
        assert_eq!(req.method, "POST");
        assert!(!req.is_get());
    }

    #[test]
    fn test_with_path_keeps_origin() {
        let req = RequestInfo::navigate(url("http://localhost:3000/listings/42?tab=photos"));
        let root = req.with_path("/").unwrap();
        assert_eq!(root.url.as_str(), "http://localhost:3000/");
        assert_eq!(root.mode, RequestMode::Navigate);
    }

    #[test]
    fn test_with_body_and_headers() {
        let req = RequestInfo::get(url("http://localhost:3000/api/listings"))
            .with_method("post")
            .with_header("content-type", "application/json")
            .with_body(r#"{"title":"lamp"}"#);
        assert_eq!(req.headers, vec![("content-type".to_string(), "application/json".to_string())]);
        assert_eq!(req.body.as_deref(), Some(&br#"{"title":"lamp"}"#[..]));

        let fallback = req.with_path("/").unwrap();
        assert!(fallback.body.is_none());
    }

    #[test]
    fn test_resolve_relative_against_origin() {
        let origin = url("http://localhost:3000");
        let resolved = resolve_url(&origin, "/api/listings").unwrap();
        assert_eq!(resolved.as_str(), "http://localhost:3000/api/listings");
    }

    #[test]
    fn test_resolve_absolute_untouched() {
        let origin = url("http://localhost:3000");
        let resolved = resolve_url(&origin, "data:text/plain,hi").unwrap();
        assert_eq!(resolved.scheme(), "data");
    }

    #[test]
    fn test_resolve_empty() {
        let origin = url("http://localhost:3000");
        assert!(matches!(resolve_url(&origin, "  "), Err(Error::InvalidInput(_))));
    }
}
