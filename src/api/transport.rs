//! HTTP Transport
//!
//! The seam between [`ApiClient`](super::ApiClient) and the network. The
//! reqwest implementation classifies failures so the client can tell a reset
//! connection (worth one retry elsewhere) from everything else.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method};
use serde_json::Value;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Request / Response
// =============================================================================

/// Fully resolved request handed to a transport
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub bearer_token: Option<String>,
}

/// Raw response: status and body text
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport-level failure, before any HTTP status was received
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Convert into an [`ApiError`] for a request sent to `base_url`
    pub fn into_api_error(self, base_url: &str, url: &str) -> ApiError {
        match self {
            TransportError::ConnectionReset(_) => ApiError::ConnectionReset {
                base_url: base_url.to_string(),
            },
            TransportError::Timeout => ApiError::Timeout {
                url: url.to_string(),
            },
            TransportError::Other(message) => ApiError::Transport(message),
        }
    }
}

// =============================================================================
// Transport Trait
// =============================================================================

/// Sends one request and returns the raw response
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

// =============================================================================
// Reqwest Transport
// =============================================================================

/// [`HttpTransport`] over a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a client with the given request timeout
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Map a reqwest failure onto the transport error kinds
    fn classify(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        if err.is_connect() || is_reset(&err) {
            return TransportError::ConnectionReset(err.to_string());
        }
        TransportError::Other(err.to_string())
    }
}

/// Walk the source chain looking for an IO error that dropped the connection
fn is_reset(err: &(dyn StdError + 'static)) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        source = e.source();
    }
    false
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut builder = self.client.request(request.method, &request.url);
        if let Some(token) = &request.bearer_token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(Self::classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(Self::classify)?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_reset_detection_walks_sources() {
        #[derive(Debug, Error)]
        #[error("request failed")]
        struct Wrapper(#[source] io::Error);

        let reset = Wrapper(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"));
        assert!(is_reset(&reset));

        let refused = Wrapper(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        assert!(!is_reset(&refused));
    }

    #[test]
    fn test_into_api_error() {
        assert_matches!(
            TransportError::ConnectionReset("x".into()).into_api_error("http://a", "http://a/b"),
            ApiError::ConnectionReset { base_url } if base_url == "http://a"
        );
        assert_matches!(
            TransportError::Timeout.into_api_error("http://a", "http://a/b"),
            ApiError::Timeout { url } if url == "http://a/b"
        );
        assert_matches!(
            TransportError::Other("dns".into()).into_api_error("http://a", "http://a/b"),
            ApiError::Transport(_)
        );
    }

    #[test]
    fn test_response_success_range() {
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(302, "").is_success());
        assert!(!ApiResponse::new(500, "").is_success());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_failure() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        // Reserve a free port, then release it so nothing is listening
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let result = transport
            .send(ApiRequest {
                method: Method::GET,
                url: format!("http://127.0.0.1:{}/", port),
                body: None,
                bearer_token: None,
            })
            .await;
        assert_matches!(result, Err(TransportError::ConnectionReset(_)));
    }
}
