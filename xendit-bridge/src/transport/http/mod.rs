//! HTTP transport implementation.
//!
//! This module provides HTTP/1.1 and HTTP/2 transport using reqwest.
//! Only HTTPS endpoints are contacted.

use std::sync::LazyLock;

use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::config::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_POOL_MAX_IDLE_PER_HOST, DEFAULT_TIMEOUT, HttpConfig, HttpVersion,
};
use crate::{
    error::{Result, XenditError},
    transport::{ApiRequest, Method, NetworkError, Transport, TransportResponse},
};

/// Default HTTP client with connection pooling enabled.
///
/// `None` when the TLS backend cannot be initialised; [`HttpTransport::new`]
/// reports that as a configuration error.
static DEFAULT_HTTP_CLIENT: LazyLock<Option<Client>> = LazyLock::new(|| {
    Client::builder()
        .pool_max_idle_per_host(DEFAULT_POOL_MAX_IDLE_PER_HOST)
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .ok()
});

/// Validates URL for security constraints.
fn validate_url(url: &Url) -> std::result::Result<(), NetworkError> {
    if url.scheme() != "https" {
        return Err(NetworkError::transport("Only HTTPS URLs are allowed"));
    }
    if url.host_str().is_none() {
        return Err(NetworkError::transport(format!("URL missing host: {url}")));
    }
    Ok(())
}

/// Validates header name and value for CRLF injection prevention.
fn validate_header(name: &str, value: &str) -> std::result::Result<(), NetworkError> {
    if name.contains(['\r', '\n', '\0']) {
        return Err(NetworkError::transport(
            "Invalid header name: control characters not allowed",
        ));
    }
    if value.contains(['\r', '\n', '\0']) {
        return Err(NetworkError::transport(
            "Invalid header value: control characters not allowed",
        ));
    }
    Ok(())
}

/// HTTP/1.1 and HTTP/2 transport using reqwest.
///
/// # Examples
///
/// ```rust,no_run
/// use xendit_bridge::transport::{ApiRequest, HttpTransport, Transport};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new()?;
/// let response = transport
///     .execute(ApiRequest::get("https://api.xendit.co/credit_card_tokenization_configuration"))
///     .await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    http_version: HttpVersion,
}

impl HttpTransport {
    /// Creates a new HTTP transport with default settings.
    ///
    /// Uses a shared client for connection pooling.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = DEFAULT_HTTP_CLIENT
            .clone()
            .ok_or_else(|| XenditError::configuration("failed to create default HTTP client"))?;
        Ok(Self { client, http_version: HttpVersion::Auto })
    }

    /// Creates HTTP transport with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use xendit_bridge::transport::{HttpConfig, HttpTransport, HttpVersion};
    ///
    /// let config = HttpConfig {
    ///     pool_max_idle_per_host: 20,
    ///     timeout_secs: 60,
    ///     connect_timeout_secs: 15,
    ///     http_version: HttpVersion::Http2,
    /// };
    ///
    /// let transport = HttpTransport::with_config(&config).unwrap();
    /// ```
    pub fn with_config(config: &HttpConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout());

        builder = match config.http_version {
            HttpVersion::Http1 => builder.http1_only(),
            HttpVersion::Http2 => builder.http2_prior_knowledge(),
            HttpVersion::Auto => builder,
        };

        let client = builder
            .build()
            .map_err(|e| XenditError::configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, http_version: config.http_version })
    }

    #[instrument(skip(self, request), fields(method = request.method.as_str(), url = %redact_query(&request.url)))]
    async fn send(&self, request: ApiRequest) -> std::result::Result<TransportResponse, NetworkError> {
        let url = Url::parse(&request.url)
            .map_err(|e| NetworkError::transport(format!("invalid URL: {e}")))?;
        validate_url(&url)?;

        for (key, value) in &request.headers {
            validate_header(key, value)?;
        }

        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };

        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| NetworkError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
            body: None,
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| NetworkError {
            status: Some(status.as_u16()),
            message: format!("failed to read response body: {e}"),
            body: None,
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(NetworkError::response(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        Ok(TransportResponse { status: status.as_u16(), body: body.to_vec() })
    }
}

impl Transport for HttpTransport {
    async fn execute(
        &self,
        request: ApiRequest,
    ) -> std::result::Result<TransportResponse, NetworkError> {
        self.send(request).await
    }

    fn protocol_name(&self) -> &'static str {
        self.http_version.protocol_name()
    }
}

/// Drops the query string, which carries the tokenizer API key.
fn redact_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_transport_new() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.protocol_name(), "http");
    }

    #[test]
    fn test_http_transport_protocol_name() {
        let config_http1 = HttpConfig { http_version: HttpVersion::Http1, ..Default::default() };
        let transport = HttpTransport::with_config(&config_http1).unwrap();
        assert_eq!(transport.protocol_name(), "http/1.1");

        let config_http2 = HttpConfig { http_version: HttpVersion::Http2, ..Default::default() };
        let transport = HttpTransport::with_config(&config_http2).unwrap();
        assert_eq!(transport.protocol_name(), "http/2");
    }

    #[tokio::test]
    async fn test_http_transport_invalid_url() {
        let transport = HttpTransport::new().unwrap();
        let err = transport.execute(ApiRequest::get("not-a-url")).await.unwrap_err();
        assert!(err.message.contains("invalid URL"));
        assert!(err.status.is_none());
    }

    #[tokio::test]
    async fn test_http_transport_rejects_http_url() {
        let transport = HttpTransport::new().unwrap();
        let err = transport.execute(ApiRequest::get("http://api.xendit.co/x")).await.unwrap_err();
        assert_eq!(err.message, "Only HTTPS URLs are allowed");
    }

    #[tokio::test]
    async fn test_http_transport_rejects_crlf_header() {
        let transport = HttpTransport::new().unwrap();
        let request = ApiRequest::get("https://api.xendit.co/x").header("X-Evil\r\n", "value");
        let err = transport.execute(request).await.unwrap_err();
        assert!(err.message.contains("control characters"));
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url(&Url::parse("https://api.xendit.co").unwrap()).is_ok());
        assert!(validate_url(&Url::parse("http://api.xendit.co").unwrap()).is_err());
        assert!(validate_url(&Url::parse("file:///etc/passwd").unwrap()).is_err());
    }

    #[test]
    fn test_validate_header() {
        assert!(validate_header("Authorization", "Basic abc").is_ok());
        assert!(validate_header("X-Custom", "value\r\nEvil: injected").is_err());
        assert!(validate_header("X-Evil\0", "value").is_err());
    }

    #[test]
    fn test_redact_query() {
        assert_eq!(
            redact_query("https://flex.example.com/cybersource/flex/v1/tokens?apikey=secret"),
            "https://flex.example.com/cybersource/flex/v1/tokens"
        );
        assert_eq!(redact_query("https://api.xendit.co"), "https://api.xendit.co");
    }
}
