use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::http::{send_with_retry, RetryPolicy};
use super::types::ApiError;
use crate::error::{ReviewError, ReviewResult};

/// Default request timeout in seconds
pub(super) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Timeout for file uploads (120 seconds)
pub(super) const UPLOAD_TIMEOUT_SECS: u64 = 120;

const USER_AGENT: &str = concat!("review-assistant/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the assistants API.
pub struct ApiClient {
    pub(super) client: Client,
    pub(super) base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> ReviewResult<Self> {
        // A base without a trailing slash would make `Url::join` drop its last segment.
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&normalized)
            .map_err(|e| ReviewError::Config(format!("invalid API base URL {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn build_url(&self, endpoint: &str) -> ReviewResult<Url> {
        self.base_url.join(endpoint).map_err(|e| {
            ReviewError::Config(format!("failed to build URL for endpoint {}: {}", endpoint, e))
        })
    }

    fn client_with_timeout(&self, timeout_secs: u64) -> ReviewResult<Client> {
        if timeout_secs == DEFAULT_TIMEOUT_SECS {
            return Ok(self.client.clone());
        }

        Ok(Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder, request_id: &str) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .header("User-Agent", USER_AGENT)
            .header("x-request-id", request_id)
    }

    /// Send a JSON (or bodiless) request and decode the JSON response.
    pub(super) async fn request<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ReviewResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_policy(RetryPolicy::Idempotent, method, endpoint, body)
            .await
    }

    /// Like [`ApiClient::request`], for calls that must not be resent after
    /// a lost response.
    pub(super) async fn request_once<B, T>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ReviewResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_with_policy(RetryPolicy::StatusOnly, method, endpoint, body)
            .await
    }

    async fn request_with_policy<B, T>(
        &self,
        policy: RetryPolicy,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> ReviewResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        let request_id = Uuid::new_v4().to_string();

        debug!("=== API Request ===");
        debug!("{} {}", method, url);

        let response = send_with_retry(policy, || {
            let request = self.authorize(self.client.request(method.clone(), url.clone()), &request_id);
            match body {
                Some(body) => request.json(body),
                None => request,
            }
        })
        .await?;

        self.decode(response).await
    }

    /// Upload a single file as multipart form data.
    pub(super) async fn post_multipart<T>(
        &self,
        endpoint: &str,
        filename: &str,
        content: &[u8],
        purpose: &str,
    ) -> ReviewResult<T>
    where
        T: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        let request_id = Uuid::new_v4().to_string();
        let client = self.client_with_timeout(UPLOAD_TIMEOUT_SECS)?;

        debug!("=== API Upload ===");
        debug!("POST {} ({} bytes as {})", url, content.len(), filename);

        let response = send_with_retry(RetryPolicy::Idempotent, || {
            // Forms are consumed by `send`, so each attempt builds a fresh one.
            let part = Part::bytes(content.to_vec()).file_name(filename.to_string());
            let form = Form::new()
                .text("purpose", purpose.to_string())
                .part("file", part);
            self.authorize(client.post(url.clone()), &request_id)
                .multipart(form)
        })
        .await?;

        self.decode(response).await
    }

    async fn decode<T>(&self, response: reqwest::Response) -> ReviewResult<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        debug!("=== API Response ===");
        debug!("Status: {}", status);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let api_error = ApiError::from_http_response(status.as_u16(), body);

            if api_error.is_fatal() {
                error!("❌ {}", api_error.message);
            } else {
                error!("API request failed: {}", api_error.message);
            }
            debug!(
                "HTTP {} error type {:?}, code {:?}",
                api_error.http_status, api_error.error_type, api_error.code
            );

            return Err(api_error.into());
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            ReviewError::MalformedResponse(format!("failed to parse API response: {}", e))
        })
    }
}
