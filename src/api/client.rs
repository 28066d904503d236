//! REST API client
//!
//! Thin JSON client for the hostel backend: bearer authentication, one retry
//! against a fallback base URL when the primary resets the connection, and a
//! read-through GET backed by the cache service.

use crate::api::transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport, TransportError};
use crate::cache::{Backend, CacheService, Ttl};
use crate::config::ApiConfig;
use crate::error::{ApiError, Result};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

/// Namespace of cached API responses
const CACHE_KEY_PREFIX: &str = "api";
/// Hex characters of the token digest kept in cache keys
const TOKEN_DIGEST_LEN: usize = 16;

/// Client for the hostel REST backend
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ApiConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl ApiClient {
    /// Create a client backed by reqwest
    pub fn new(config: ApiConfig) -> Result<Self> {
        config.validate()?;
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over any transport
    pub fn with_transport(config: ApiConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(base_url: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn send_to(
        &self,
        base_url: &str,
        method: &Method,
        path: &str,
        body: &Option<Value>,
    ) -> std::result::Result<ApiResponse, TransportError> {
        let request = ApiRequest {
            method: method.clone(),
            url: Self::url(base_url, path),
            body: body.clone(),
            bearer_token: self.config.auth_token.clone(),
        };
        debug!(method = %request.method, url = %request.url, "Sending API request");
        self.transport.send(request).await
    }

    /// Send a request and decode the JSON response
    ///
    /// A reset connection to the primary base URL is retried exactly once
    /// against the fallback base URL, when one is configured.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> std::result::Result<Value, ApiError> {
        let primary = self.config.base_url.as_str();
        let (base_url, outcome) = match self.send_to(primary, &method, path, &body).await {
            Err(TransportError::ConnectionReset(reason)) => match &self.config.fallback_base_url {
                Some(fallback) => {
                    warn!(%primary, %fallback, %reason, "Connection reset, retrying on fallback");
                    (fallback.as_str(), self.send_to(fallback, &method, path, &body).await)
                }
                None => (primary, Err(TransportError::ConnectionReset(reason))),
            },
            outcome => (primary, outcome),
        };

        let response =
            outcome.map_err(|e| e.into_api_error(base_url, &Self::url(base_url, path)))?;
        Self::decode(response)
    }

    fn decode(response: ApiResponse) -> std::result::Result<Value, ApiError> {
        if !response.is_success() {
            return Err(ApiError::Status {
                status: response.status,
                message: error_message(&response),
            });
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn get(&self, path: &str) -> std::result::Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> std::result::Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> std::result::Result<Value, ApiError> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> std::result::Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }

    /// GET and decode into `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<T, ApiError> {
        let value = self.get(path).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Cache key for a GET of `path`
    ///
    /// `api:GET:<path>` without a token, `api:<token digest>:GET:<path>` with
    /// one, so responses never leak between users sharing a cache.
    pub fn cache_key(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        match &self.config.auth_token {
            Some(token) => {
                let digest = hex::encode(Sha256::digest(token.as_bytes()));
                format!("{}:{}:GET:{}", CACHE_KEY_PREFIX, &digest[..TOKEN_DIGEST_LEN], path)
            }
            None => format!("{}:GET:{}", CACHE_KEY_PREFIX, path),
        }
    }

    /// GET through the cache, keyed by [`cache_key`](Self::cache_key)
    ///
    /// Failed requests are returned as-is and leave the cache untouched.
    pub async fn cached_get(
        &self,
        cache: &CacheService,
        path: &str,
        ttl: Ttl,
        backend: Backend,
    ) -> std::result::Result<Value, ApiError> {
        let key = self.cache_key(path);
        cache.get_or_set(&key, || self.get(path), ttl, backend).await
    }
}

/// Human-readable message for a failed response
///
/// Prefers the `message` or `error` field of a JSON body, then the raw body.
fn error_message(response: &ApiResponse) -> String {
    if let Ok(Value::Object(body)) = serde_json::from_str::<Value>(&response.body) {
        for field in ["message", "error"] {
            if let Some(Value::String(message)) = body.get(field) {
                return message.clone();
            }
        }
    }
    let body = response.body.trim();
    if body.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Transport that replays scripted outcomes and records requests
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<std::result::Result<ApiResponse, TransportError>>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        fn new(
            outcomes: impl IntoIterator<Item = std::result::Result<ApiResponse, TransportError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into_iter().collect()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn urls(&self) -> Vec<String> {
            self.requests.lock().iter().map(|r| r.url.clone()).collect()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
            self.requests.lock().push(request);
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted response".into())))
        }
    }

    fn reset() -> std::result::Result<ApiResponse, TransportError> {
        Err(TransportError::ConnectionReset("ECONNRESET".into()))
    }

    fn ok(body: &str) -> std::result::Result<ApiResponse, TransportError> {
        Ok(ApiResponse::new(200, body))
    }

    fn config() -> ApiConfig {
        ApiConfig::new("http://primary/api/")
            .with_fallback("http://fallback/api")
            .with_auth_token("secret")
    }

    #[tokio::test]
    async fn test_get_attaches_token_and_joins_path() {
        let transport = ScriptedTransport::new([ok(r#"{"data": []}"#)]);
        let client = ApiClient::with_transport(config(), transport.clone());

        let body = client.get("/hostels").await.unwrap();
        assert_eq!(body, json!({"data": []}));

        let requests = transport.requests.lock();
        assert_eq!(requests[0].url, "http://primary/api/hostels");
        assert_eq!(requests[0].method, Method::GET);
        assert_eq!(requests[0].bearer_token.as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn test_connection_reset_retries_fallback_once() {
        let transport = ScriptedTransport::new([reset(), ok(r#"{"id": 3}"#)]);
        let client = ApiClient::with_transport(config(), transport.clone());

        let body = client.post("rooms", json!({"number": 12})).await.unwrap();
        assert_eq!(body, json!({"id": 3}));
        assert_eq!(
            transport.urls(),
            vec!["http://primary/api/rooms", "http://fallback/api/rooms"]
        );
        assert_eq!(transport.requests.lock()[1].body, Some(json!({"number": 12})));
    }

    #[tokio::test]
    async fn test_fallback_reset_is_not_retried_again() {
        let transport = ScriptedTransport::new([reset(), reset(), ok("{}")]);
        let client = ApiClient::with_transport(config(), transport.clone());

        let err = client.get("students").await.unwrap_err();
        assert_matches!(err, ApiError::ConnectionReset { base_url } if base_url == "http://fallback/api");
        assert_eq!(transport.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_no_fallback_configured() {
        let transport = ScriptedTransport::new([reset()]);
        let client = ApiClient::with_transport(ApiConfig::new("http://primary"), transport.clone());

        assert_matches!(client.get("x").await, Err(ApiError::ConnectionReset { .. }));
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let transport = ScriptedTransport::new([Err(TransportError::Timeout), ok("{}")]);
        let client = ApiClient::with_transport(config(), transport.clone());

        assert_matches!(client.get("floors").await, Err(ApiError::Timeout { .. }));
        assert_eq!(transport.urls().len(), 1);
    }

    #[tokio::test]
    async fn test_status_errors_carry_server_message() {
        let transport = ScriptedTransport::new([
            Ok(ApiResponse::new(403, r#"{"message": "Admins only"}"#)),
            Ok(ApiResponse::new(500, "")),
            Ok(ApiResponse::new(404, r#"{"error": "No such room"}"#)),
        ]);
        let client = ApiClient::with_transport(config(), transport);

        let forbidden = client.delete("admins/2").await.unwrap_err();
        assert!(forbidden.is_auth_failure());
        assert_matches!(forbidden, ApiError::Status { message, .. } if message == "Admins only");

        assert_matches!(
            client.get("x").await,
            Err(ApiError::Status { status: 500, message }) if message == "HTTP 500"
        );
        assert_matches!(
            client.put("rooms/9", json!({})).await,
            Err(ApiError::Status { status: 404, message }) if message == "No such room"
        );
    }

    #[tokio::test]
    async fn test_empty_and_invalid_bodies() {
        let transport = ScriptedTransport::new([Ok(ApiResponse::new(204, "")), ok("<html>")]);
        let client = ApiClient::with_transport(config(), transport);

        assert_eq!(client.delete("rooms/1").await.unwrap(), Value::Null);
        assert_matches!(client.get("rooms").await, Err(ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cached_get() {
        let transport = ScriptedTransport::new([
            Ok(ApiResponse::new(503, "")),
            ok(r#"{"data": ["north"]}"#),
            ok(r#"{"data": ["changed"]}"#),
        ]);
        let client = ApiClient::with_transport(config(), transport.clone());
        let cache = CacheService::in_memory();

        // Failed fetch caches nothing
        assert_matches!(
            client.cached_get(&cache, "hostels", Ttl::default(), Backend::Session).await,
            Err(ApiError::Status { status: 503, .. })
        );
        assert!(!cache.has(&client.cache_key("hostels"), Backend::Session));

        let first = client
            .cached_get(&cache, "hostels", Ttl::default(), Backend::Session)
            .await
            .unwrap();
        let second = client
            .cached_get(&cache, "hostels", Ttl::default(), Backend::Session)
            .await
            .unwrap();

        assert_eq!(first, json!({"data": ["north"]}));
        assert_eq!(second, first);
        assert_eq!(transport.urls().len(), 2);
    }

    #[test]
    fn test_cache_key_namespace() {
        let anonymous = ApiClient::with_transport(
            ApiConfig::new("http://primary"),
            ScriptedTransport::new([]),
        );
        assert_eq!(anonymous.cache_key("/hostels"), "api:GET:hostels");
        assert_eq!(anonymous.cache_key("hostels"), "api:GET:hostels");

        let signed_in = ApiClient::with_transport(config(), ScriptedTransport::new([]));
        let key = signed_in.cache_key("hostels");
        assert!(key.starts_with("api:"), "{key}");
        assert!(key.ends_with(":GET:hostels"), "{key}");
        assert!(!key.contains("secret"), "{key}");
        assert_ne!(key, anonymous.cache_key("hostels"));
    }

    #[tokio::test]
    async fn test_cached_get_is_scoped_per_token() {
        let cache = CacheService::in_memory();
        let alice = ScriptedTransport::new([ok(r#"{"data": ["alice"]}"#)]);
        let bob = ScriptedTransport::new([ok(r#"{"data": ["bob"]}"#)]);
        let alice_client = ApiClient::with_transport(
            ApiConfig::new("http://primary").with_auth_token("alice-token"),
            alice.clone(),
        );
        let bob_client = ApiClient::with_transport(
            ApiConfig::new("http://primary").with_auth_token("bob-token"),
            bob.clone(),
        );

        // A caller's own entry under the bare path is left alone
        cache.set("students/me", "mine", Ttl::Never, Backend::Session);

        let a = alice_client
            .cached_get(&cache, "students/me", Ttl::default(), Backend::Session)
            .await
            .unwrap();
        let b = bob_client
            .cached_get(&cache, "students/me", Ttl::default(), Backend::Session)
            .await
            .unwrap();

        assert_eq!(a, json!({"data": ["alice"]}));
        assert_eq!(b, json!({"data": ["bob"]}));
        assert_eq!(alice.urls().len(), 1);
        assert_eq!(bob.urls().len(), 1);
        assert_eq!(
            cache.get::<String>("students/me", Backend::Session).as_deref(),
            Some("mine")
        );
    }

    #[test]
    fn test_new_rejects_bad_config() {
        assert!(ApiClient::new(ApiConfig::new("hostel.local")).is_err());
        assert!(ApiClient::new(ApiConfig::default()).is_ok());
    }
}
