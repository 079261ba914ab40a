//! REST client for the radar-processing service HTTP endpoints.
//!
//! Wraps submission, status polling, cancellation, and artifact
//! download using [`reqwest`].

use std::time::Duration;

use groundwatch_core::submission::SubmissionSpec;

use crate::messages::{StatusResponse, SubmitResponse};

/// Timeout applied to a single submit/status/cancel call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout applied to an artifact download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client for one radar-processing service deployment.
pub struct InsarApi {
    client: reqwest::Client,
    base_url: String,
    /// Bearer token for the service, when it requires one.
    api_key: Option<String>,
}

/// Errors from the service REST layer.
#[derive(Debug, thiserror::Error)]
pub enum InsarApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The service returned a non-2xx status code.
    #[error("Processing service error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for logging.
        body: String,
    },
}

impl InsarApiError {
    /// Transient errors are retried within the poll budget; everything
    /// else surfaces immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            // Network-level failures are assumed momentary.
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            // 429 and 5xx are service-side and momentary; 4xx are not.
            Self::ApiError { status, .. } => *status == 429 || *status >= 500,
        }
    }
}

impl InsarApi {
    /// Create a new client.
    ///
    /// * `base_url` - service base URL, e.g. `https://api.example/v2/abc`.
    /// * `api_key`  - optional bearer token.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`] (useful
    /// for connection pooling across components).
    pub fn with_client(client: reqwest::Client, base_url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Submit a processing request.
    ///
    /// Sends `POST {base}/run` with the canonical submission spec and
    /// returns the server-assigned request handle.
    pub async fn submit(&self, spec: &SubmissionSpec) -> Result<SubmitResponse, InsarApiError> {
        let body = serde_json::json!({ "input": spec });

        let response = self
            .authorized(self.client.post(format!("{}/run", self.base_url)))
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::info!(external_ref = %submitted.id, "Processing request submitted");
        Ok(submitted)
    }

    /// Fetch the current status of a request.
    ///
    /// Sends `GET {base}/status/{id}`. A completed response carries the
    /// artifact references.
    pub async fn status(&self, external_ref: &str) -> Result<StatusResponse, InsarApiError> {
        let response = self
            .authorized(
                self.client
                    .get(format!("{}/status/{}", self.base_url, external_ref)),
            )
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Cancel a queued or running request.
    ///
    /// Sends `POST {base}/cancel/{id}`.
    pub async fn cancel(&self, external_ref: &str) -> Result<(), InsarApiError> {
        let response = self
            .authorized(
                self.client
                    .post(format!("{}/cancel/{}", self.base_url, external_ref)),
            )
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Download a result artifact by its (possibly pre-signed) URL.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, InsarApiError> {
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    /// Attach the bearer token when one is configured.
    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`InsarApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, InsarApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(InsarApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, InsarApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), InsarApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}
