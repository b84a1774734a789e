//! Authenticated HTTP access to the AlphaTrader REST API
//!
//! The [`Transport`] trait is the boundary the response cache loads through.
//! [`HttpTransport`] is the production implementation on top of `reqwest`;
//! it attaches the three headers every API call needs and performs no retries.

use std::future::Future;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client;
use thiserror::Error;

use crate::config::ApiConfig;

/// The only status code whose body is decoded
pub const STATUS_OK: u16 = 200;

/// Header carrying the partner id
const X_AUTHORIZATION: &str = "X-Authorization";

/// A raw API answer: status code plus body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the body should be decoded
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Errors raised below the HTTP status level
///
/// Cloneable so a single coalesced load can hand the same failure to every
/// waiter.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network, connection or timeout failure
    #[error("HTTP request failed: {0}")]
    Request(#[source] Arc<reqwest::Error>),

    /// A configured credential cannot be sent as a header value
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Any other failure, e.g. an aborted load task
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(Arc::new(err))
    }
}

/// Issues GET and POST calls against the API
pub trait Transport: Send + Sync + 'static {
    /// Performs a GET request for the given endpoint path
    fn get(&self, path: &str) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;

    /// Performs a POST request for the given endpoint path
    fn post(&self, path: &str)
        -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

/// `reqwest`-backed transport with the API's auth headers attached
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    api_url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    /// Creates a transport from configuration, honoring its request timeout
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Self::with_client(builder.build()?, config)
    }

    /// Creates a transport with a custom HTTP client
    pub fn with_client(client: Client, config: &ApiConfig) -> Result<Self, TransportError> {
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            headers: auth_headers(config)?,
        })
    }

    /// Full URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<RawResponse, TransportError> {
        let response = request.headers(self.headers.clone()).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(RawResponse { status, body })
    }
}

impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<RawResponse, TransportError> {
        log::trace!("GET {}", path);
        self.send(self.client.get(self.url(path))).await
    }

    async fn post(&self, path: &str) -> Result<RawResponse, TransportError> {
        log::trace!("POST {}", path);
        self.send(self.client.post(self.url(path))).await
    }
}

/// Builds the `Accept`, `Authorization` and `X-Authorization` headers
fn auth_headers(config: &ApiConfig) -> Result<HeaderMap, TransportError> {
    let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.token))
        .map_err(|_| TransportError::InvalidHeader("Authorization"))?;
    bearer.set_sensitive(true);

    let partner = HeaderValue::from_str(&config.partner_id)
        .map_err(|_| TransportError::InvalidHeader(X_AUTHORIZATION))?;

    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(AUTHORIZATION, bearer);
    headers.insert(X_AUTHORIZATION, partner);
    Ok(headers)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config(api_url: &str) -> ApiConfig {
        ApiConfig {
            api_url: api_url.to_string(),
            token: "secret-token".to_string(),
            partner_id: "partner-42".to_string(),
            refresh_interval: Duration::from_secs(300),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    /// Serves exactly one request with a canned answer and returns the raw request text
    async fn serve_once(listener: TcpListener, status_line: &str, body: &str) -> String {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).to_lowercase()
    }

    #[test]
    fn test_raw_response_is_ok_only_for_200() {
        assert!(RawResponse::new(200, "{}").is_ok());
        assert!(!RawResponse::new(201, "{}").is_ok());
        assert!(!RawResponse::new(404, "").is_ok());
        assert!(!RawResponse::new(500, "").is_ok());
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let transport = HttpTransport::new(&test_config("https://example.test/")).unwrap();
        assert_eq!(
            transport.url("/api/companyprofiles/abc"),
            "https://example.test/api/companyprofiles/abc"
        );
    }

    #[test]
    fn test_auth_headers_are_attached() {
        let headers = auth_headers(&test_config("https://example.test")).unwrap();
        assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret-token");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(X_AUTHORIZATION).unwrap(), "partner-42");
    }

    #[test]
    fn test_invalid_partner_id_is_rejected() {
        let mut config = test_config("https://example.test");
        config.partner_id = "bad\nvalue".to_string();
        let err = HttpTransport::new(&config).unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader("X-Authorization")));
    }

    #[tokio::test]
    async fn test_get_sends_headers_and_returns_status_and_body() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "200 OK", r#"{"id":"abc"}"#));

        let transport = HttpTransport::new(&test_config(&format!("http://{}", addr))).unwrap();
        let response = transport.get("/api/companyprofiles/abc").await.unwrap();

        assert_eq!(response, RawResponse::new(200, r#"{"id":"abc"}"#));

        let request = server.await.unwrap();
        assert!(request.starts_with("get /api/companyprofiles/abc "));
        assert!(request.contains("authorization: bearer secret-token"));
        assert!(request.contains("x-authorization: partner-42"));
        assert!(request.contains("accept: */*"));
    }

    #[tokio::test]
    async fn test_error_status_is_not_a_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve_once(listener, "404 Not Found", "missing"));

        let transport = HttpTransport::new(&test_config(&format!("http://{}", addr))).unwrap();
        let response = transport.post("/api/securityorders/xyz").await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.body, "missing");
        assert!(server.await.unwrap().starts_with("post /api/securityorders/xyz "));
    }

    #[tokio::test]
    async fn test_connection_refused_is_a_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new(&test_config(&format!("http://{}", addr))).unwrap();
        let err = transport.get("/api/anything").await.unwrap_err();

        assert!(matches!(err, TransportError::Request(_)));
    }
}
