//! Execution service HTTP client.
//!
//! Single entry point for all network calls. Every outcome, including
//! transport-level failures, is folded into an [`ApiResponse`]; nothing is
//! propagated as an error past this boundary. Callers check `success` before
//! reading `data`.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

pub use reqwest::Method;

use crate::config::ClientConfig;

/// Options for a single API request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// Additional headers; a caller entry for `Content-Type` overrides the
    /// default `application/json`.
    pub headers: HashMap<String, String>,

    /// Body, serialized as JSON when present.
    pub body: Option<Value>,

    /// Additional attempts after a failed one.
    pub retries: u32,

    /// Fixed delay between consecutive attempts.
    pub retry_delay: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            body: None,
            retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Uniform result of one API call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// True iff the HTTP status was in the 2xx range.
    pub success: bool,

    /// HTTP status code; 0 when the network call itself failed.
    pub status: u16,

    /// Parsed response payload; `None` unless the call succeeded.
    pub data: Option<Value>,

    /// Failure message; `None` unless the call failed.
    pub error: Option<String>,
}

impl ApiResponse {
    fn transport_failure(message: String) -> Self {
        Self {
            success: false,
            status: 0,
            data: None,
            error: Some(message),
        }
    }
}

/// HTTP client bound to a fixed base endpoint.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL with the default timeout.
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a client with an explicit per-request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a client from loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::with_timeout(&config.endpoint, config.timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Perform a request, retrying failed attempts up to the budget.
    ///
    /// All failures are retried identically with the fixed delay; the last
    /// attempt's response is returned in every case.
    pub async fn request(&self, method: Method, path: &str, options: RequestOptions) -> ApiResponse {
        let url = self.url_for(path);

        let mut last = self.attempt(method.clone(), &url, &options).await;
        let mut remaining = options.retries;
        while !last.success && remaining > 0 {
            tracing::warn!(
                status = last.status,
                remaining,
                error = last.error.as_deref().unwrap_or("unknown"),
                "Request failed, retrying"
            );
            tokio::time::sleep(options.retry_delay).await;
            last = self.attempt(method.clone(), &url, &options).await;
            remaining -= 1;
        }
        last
    }

    async fn attempt(&self, method: Method, url: &str, options: &RequestOptions) -> ApiResponse {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &options.headers {
            match (
                HeaderName::try_from(key.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    tracing::warn!(header = %key, "Skipping invalid header");
                }
            }
        }

        let mut request = self.http.request(method, url).headers(headers);
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return ApiResponse::transport_failure(e.to_string()),
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // Try to parse JSON; if that fails, fall back to wrapping the raw text.
        let data = if text.is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                Err(_) => Some(serde_json::json!({ "text": text })),
            }
        };

        if status.is_success() {
            ApiResponse {
                success: true,
                status: status.as_u16(),
                data,
                error: None,
            }
        } else {
            let error = data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                });

            ApiResponse {
                success: false,
                status: status.as_u16(),
                data: None,
                error: Some(error),
            }
        }
    }

    pub async fn get(&self, path: &str) -> ApiResponse {
        self.request(Method::GET, path, RequestOptions::default())
            .await
    }

    pub async fn post(&self, path: &str, body: Value) -> ApiResponse {
        self.request(
            Method::POST,
            path,
            RequestOptions {
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn put(&self, path: &str, body: Value) -> ApiResponse {
        self.request(
            Method::PUT,
            path,
            RequestOptions {
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn patch(&self, path: &str, body: Value) -> ApiResponse {
        self.request(
            Method::PATCH,
            path,
            RequestOptions {
                body: Some(body),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn delete(&self, path: &str) -> ApiResponse {
        self.request(Method::DELETE, path, RequestOptions::default())
            .await
    }
}
