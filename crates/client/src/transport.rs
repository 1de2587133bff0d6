//! Network transport.
//!
//! The engine never talks to reqwest directly; it goes through the
//! [`Transport`] trait so tests can script the network. A transport returns
//! `Err` only when no response was received at all (DNS, connect, timeout,
//! body read). Any HTTP status, including 4xx/5xx, comes back as `Ok`.
//!
//! ### Credentials
//! - `Include` always sends the session cookie jar
//! - `SameOrigin` sends it only when the target shares the configured origin
//! - `Omit` never does
//!
//! ### Cache mode
//! - `Reload` and `NoStore` add `Cache-Control: no-cache` and `Pragma: no-cache`

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};
use tsync_core::{AppConfig, Error};
use url::Url;

use crate::http::{CacheMode, Credentials, Request, Response};
use crate::origin::same_origin;

/// Carries requests to the network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request. `Err` means the network threw.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Origin used to decide same-origin credential policy.
    pub origin: Url,

    /// User agent string (default: "tsync/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl TransportConfig {
    /// Derive transport settings from the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { origin, user_agent: config.user_agent.clone(), timeout: config.timeout(), max_redirects: 5 })
    }
}

/// reqwest-backed transport.
///
/// Holds two clients: one without a cookie store for anonymous requests and
/// one with a shared cookie jar for credentialed ones.
pub struct HttpTransport {
    anonymous: Client,
    credentialed: Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Create a new transport with the given configuration.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let build = |cookies: bool| {
            Client::builder()
                .user_agent(&config.user_agent)
                .timeout(config.timeout)
                .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
                .cookie_store(cookies)
                .use_rustls_tls()
                .gzip(true)
                .brotli(true)
                .deflate(true)
                .build()
                .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))
        };

        let anonymous = build(false)?;
        let credentialed = build(true)?;

        Ok(Self { anonymous, credentialed, config })
    }

    fn client_for(&self, request: &Request) -> &Client {
        let send_cookies = match request.credentials {
            Credentials::Include => true,
            Credentials::SameOrigin => same_origin(&request.url, &self.config.origin),
            Credentials::Omit => false,
        };
        if send_cookies { &self.credentialed } else { &self.anonymous }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method)))?;

        let mut builder = self.client_for(request).request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if matches!(request.cache_mode, CacheMode::Reload | CacheMode::NoStore) {
            builder = builder
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache");
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("network error: {e}")))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response: {e}")))?;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(Response { status, headers, body, kind: Default::default(), url: Some(final_url) })
    }
}
