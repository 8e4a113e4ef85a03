//! # HTTP Transport
//!
//! A robust, asynchronous API client wrapper around `reqwest`, with
//! middleware support for exponential backoff retries and standardized
//! envelope handling. Reads are idempotent, and mutations carry an
//! `Idempotency-Key` header, so the retry middleware may safely replay
//! either on transient failure.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::Value;
use std::time::Duration;

use crate::auth::Credential;
use crate::errors::ApiError;
use crate::utils::backoff::RetryPolicy;
use crate::wire::envelope::{WireRequest, WireResponse};

/// Header carrying the client-generated write-intent token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
/// Header scoping every request to a tenant.
pub const TENANT_HEADER: &str = "X-Tenant-Id";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A middleware-enabled client bound to one endpoint and credential.
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which the endpoint path is joined.
    base_url: Url,
    /// Credential attached to every request.
    credential: Credential,
}

impl ApiClient {
    /// Creates a client with the default retry policy.
    pub fn new(base_url: &str, credential: Credential) -> Result<Self, ApiError> {
        Self::with_policy(base_url, credential, &RetryPolicy::default())
    }

    /// Creates a client whose transient-failure retries follow `policy`.
    pub fn with_policy(
        base_url: &str,
        credential: Credential,
        policy: &RetryPolicy,
    ) -> Result<Self, ApiError> {
        let url = Url::parse(base_url)
            .map_err(|e| ApiError::Unknown(format!("invalid base URL '{}': {}", base_url, e)))?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(policy.base_delay, policy.max_delay)
            .build_with_max_retries(policy.max_attempts.saturating_sub(1));

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Unknown(format!("failed to build HTTP client: {}", e)))?;

        let client = ClientBuilder::new(http)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            inner: client,
            base_url: url,
            credential,
        })
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Sends one envelope to the endpoint and returns its data payload.
    ///
    /// Handles header injection, authentication, and envelope decoding.
    /// Transport-level failures (timeouts, refused connections, 5xx after
    /// the middleware gave up) surface as `Unavailable`.
    pub async fn execute(
        &self,
        request: &WireRequest,
        idempotency_key: Option<&str>,
    ) -> Result<Value, ApiError> {
        let full_url = self
            .base_url
            .join("graphql")
            .map_err(|e| ApiError::Unknown(format!("URL join failed: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            TENANT_HEADER,
            HeaderValue::from_str(&self.credential.tenant)
                .map_err(|e| ApiError::Unknown(format!("invalid tenant id: {}", e)))?,
        );
        if let Some(token) = &self.credential.bearer {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ApiError::Unknown(format!("invalid bearer token: {}", e)))?,
            );
        }
        if let Some(key) = idempotency_key {
            headers.insert(
                IDEMPOTENCY_KEY_HEADER,
                HeaderValue::from_str(key)
                    .map_err(|e| ApiError::Unknown(format!("invalid idempotency key: {}", e)))?,
            );
        }

        log::debug!("POST {} ({} bytes of variables)", full_url, request.variables.to_string().len());

        let response = self
            .inner
            .post(full_url)
            .headers(headers)
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            return Err(ApiError::from_status(status.as_u16(), body));
        }

        let envelope: WireResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Unknown(format!("malformed response body: {}", e)))?;

        let result = envelope.into_data();
        if let Err(ApiError::Unknown(detail)) = &result {
            log::error!("Unclassified backend error: {}", detail);
        }
        result
    }
}
