//! Request and response model seen by the interceptor.
//!
//! These mirror the parts of a browser fetch that the engine routes on:
//! method, URL, request mode, credential policy and cache mode on the way
//! out; status, headers, body and a basic/error kind on the way back.

use bytes::Bytes;
use serde_json::Value;
use tsync_core::{CachedResponse, Error};
use url::Url;

/// Status carried by a synthesized network-error response.
pub const NETWORK_ERROR_STATUS: u16 = 503;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level page navigation.
    Navigate,
    SameOrigin,
    #[default]
    Cors,
    NoCors,
}

/// Credential policy for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

/// HTTP cache interaction for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Bypass intermediate caches and revalidate with the origin.
    Reload,
    NoStore,
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub cache_mode: CacheMode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            url,
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            cache_mode: CacheMode::default(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    /// A page navigation to `url`.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_mode(RequestMode::Navigate)
    }

    /// A POST carrying a JSON document.
    pub fn post_json(url: Url, payload: &Value) -> Self {
        Self::new("POST", url)
            .with_header("content-type", "application/json")
            .with_body(payload.to_string())
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> Result<Value, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Whether a response came from a real exchange or stands for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Basic,
    /// Synthesized network error; never `ok`.
    Error,
}

/// A response returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
    /// Final URL when the response came from the network.
    pub url: Option<String>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into(), kind: ResponseKind::Basic, url: None }
    }

    /// The response handed back when nothing better can be produced.
    pub fn network_error() -> Self {
        Self { kind: ResponseKind::Error, ..Self::new(NETWORK_ERROR_STATUS, Bytes::new()) }
    }

    /// A JSON response.
    pub fn json(status: u16, value: &Value) -> Self {
        Self::new(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// An HTML response.
    pub fn html(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header("content-type", "text/html; charset=utf-8")
    }

    /// Status in the 2xx range on a real exchange.
    pub fn ok(&self) -> bool {
        self.kind == ResponseKind::Basic && (200..300).contains(&self.status)
    }

    pub fn is_network_error(&self) -> bool {
        self.kind == ResponseKind::Error
    }

    /// Set a header, replacing any existing value with the same name.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse the body as JSON.
    pub fn body_json(&self) -> Result<Value, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Snapshot this response for storage under `request`'s cache key.
    pub fn to_cached(&self, request: &Request) -> CachedResponse {
        CachedResponse {
            method: request.method.clone(),
            url: request.url.to_string(),
            status_code: self.status,
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<CachedResponse> for Response {
    fn from(cached: CachedResponse) -> Self {
        Self {
            status: cached.status_code,
            headers: cached.headers,
            body: Bytes::from(cached.body),
            kind: ResponseKind::Basic,
            url: Some(cached.url),
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url(path: &str) -> Url {
        Url::parse("http://localhost:8000").unwrap().join(path).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let request = Request::new("get", url("/api/tests/1"));
        assert_eq!(request.method, "GET");
        assert_eq!(request.mode, RequestMode::Cors);
        assert_eq!(request.credentials, Credentials::SameOrigin);
        assert_eq!(request.cache_mode, CacheMode::Default);
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_navigate_mode() {
        let request = Request::navigate(url("/dashboard"));
        assert_eq!(request.mode, RequestMode::Navigate);
        assert!(request.is_method("get"));
    }

    #[test]
    fn test_post_json_body() {
        let payload = json!({ "test": 42, "score": 9 });
        let request = Request::post_json(url("/api/test_result/"), &payload);
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.body_json().unwrap(), payload);
    }

    #[test]
    fn test_body_json_malformed() {
        let request = Request::new("POST", url("/api/test_result/")).with_body("{oops");
        assert!(matches!(request.body_json(), Err(Error::MalformedPayload(_))));
    }

    #[test]
    fn test_with_header_replaces() {
        let request = Request::get(url("/"))
            .with_header("Cache-Control", "max-age=0")
            .with_header("cache-control", "no-cache");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("CACHE-CONTROL"), Some("no-cache"));
    }

    #[test]
    fn test_network_error_never_ok() {
        let response = Response::network_error();
        assert!(!response.ok());
        assert!(response.is_network_error());
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_ok_range() {
        assert!(Response::new(200, "").ok());
        assert!(Response::new(202, "").ok());
        assert!(!Response::new(304, "").ok());
        assert!(!Response::new(404, "").ok());
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(202, &json!({ "pending_id": 7 }));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.body_json().unwrap()["pending_id"], json!(7));
    }

    #[test]
    fn test_cached_conversion_preserves_fields() {
        let request = Request::get(url("/static/"));
        let response = Response::html(200, "<html></html>");
        let cached = response.to_cached(&request);
        assert_eq!(cached.method, "GET");
        assert_eq!(cached.url, "http://localhost:8000/static/");

        let restored = Response::from(cached);
        assert_eq!(restored.status, 200);
        assert_eq!(restored.text(), "<html></html>");
        assert_eq!(restored.header("content-type"), Some("text/html; charset=utf-8"));
    }
}
