//! Client for the remote metadata and identifier-minting service.
//!
//! All authenticated calls go through a client-credentials token that is
//! refreshed transparently before expiry, and retry with bounded
//! exponential backoff on transient failures (connection errors, 429, 5xx).
//! A second claim on an already-claimed job is an expected outcome, not an
//! error: the service answers 409 and the caller skips the job.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::error::ApiError;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff in milliseconds.
const BASE_RETRY_DELAY_MS: u64 = 1000;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Tokens are refreshed this long before their reported expiry.
const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;

/// Outcome of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This agent now holds the claim.
    Claimed { op_id: String },
    /// Another site already holds it; skip without error.
    AlreadyClaimed,
}

/// Remote service operations the scheduler and lifecycle manager need.
#[async_trait]
pub trait RuntimeApi: Send + Sync {
    /// Mint `how_many` fresh ids of a schema class, optionally bound to a
    /// lineage key.
    async fn mint_ids(
        &self,
        schema_class: &str,
        how_many: usize,
        informed_by: Option<&str>,
    ) -> Result<Vec<String>, ApiError>;

    /// Attempt an exclusive claim on a job. 409 maps to `AlreadyClaimed`.
    async fn claim_job(&self, job_id: &str) -> Result<ClaimOutcome, ApiError>;

    async fn get_operation(&self, op_id: &str) -> Result<Value, ApiError>;

    /// Mark an operation done (or not) and attach result metadata.
    async fn update_operation(
        &self,
        op_id: &str,
        done: bool,
        metadata: Value,
    ) -> Result<(), ApiError>;

    /// Run a raw find/insert command against the store's query endpoint.
    async fn run_query(&self, command: Value) -> Result<Value, ApiError>;
}

#[derive(Debug, Deserialize, Default)]
struct TokenExpiry {
    #[serde(default)]
    days: i64,
    #[serde(default)]
    hours: i64,
    #[serde(default)]
    minutes: i64,
    #[serde(default)]
    seconds: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires: TokenExpiry,
}

struct TokenState {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Error response body from the service.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    detail: Value,
}

/// HTTP client for the remote service.
pub struct RuntimeClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    site_id: String,
    token: Mutex<Option<TokenState>>,
}

impl RuntimeClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        site_id: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            site_id: site_id.into(),
            token: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Returns a valid bearer token, requesting a fresh one when the cached
    /// token is missing or inside the safety margin.
    async fn token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        if let Some(state) = guard.as_ref() {
            let margin = chrono::Duration::seconds(TOKEN_SAFETY_MARGIN_SECS);
            if state.expires_at - margin > Utc::now() {
                return Ok(state.access_token.clone());
            }
        }

        let url = format!("{}/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Auth(body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let lifetime = chrono::Duration::days(token.expires.days)
            + chrono::Duration::hours(token.expires.hours)
            + chrono::Duration::minutes(token.expires.minutes)
            + chrono::Duration::seconds(token.expires.seconds);
        let state = TokenState {
            access_token: token.access_token.clone(),
            expires_at: Utc::now() + lifetime,
        };
        *guard = Some(state);
        tracing::debug!(expires_in = %lifetime, "Refreshed runtime API token");
        Ok(token.access_token)
    }

    /// Executes one authenticated request. No retry logic.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let token = self.token().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", token));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.detail.to_string())
                .unwrap_or(text);
            return Err(ApiError::Api {
                code: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Executes a request with exponential backoff on transient errors.
    /// Non-transient errors (including 409 on claims) propagate
    /// immediately.
    async fn execute_with_retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_RETRY_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                tracing::debug!(
                    attempt = attempt + 1,
                    delay_ms = delay_ms,
                    path = path,
                    "Retrying runtime API request after transient failure"
                );
            }

            match self.execute(method.clone(), path, body).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        path = path,
                        error = %err,
                        "Transient runtime API error, will retry"
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| ApiError::RequestFailed("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl RuntimeApi for RuntimeClient {
    async fn mint_ids(
        &self,
        schema_class: &str,
        how_many: usize,
        informed_by: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let mut body = json!({
            "schema_class": { "id": schema_class },
            "how_many": how_many,
        });
        if let Some(informed_by) = informed_by {
            body["related_ids"] = json!([informed_by]);
        }
        let value = self
            .execute_with_retry(Method::POST, "/pids/mint", Some(&body))
            .await?;
        serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))
    }

    async fn claim_job(&self, job_id: &str) -> Result<ClaimOutcome, ApiError> {
        let path = format!("/jobs/{}:claim", job_id);
        match self.execute_with_retry(Method::POST, &path, None).await {
            Ok(value) => {
                let op_id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ApiError::Parse("claim response missing operation id".into()))?
                    .to_string();
                Ok(ClaimOutcome::Claimed { op_id })
            }
            Err(ApiError::Api { code: 409, .. }) => Ok(ClaimOutcome::AlreadyClaimed),
            Err(err) => Err(err),
        }
    }

    async fn get_operation(&self, op_id: &str) -> Result<Value, ApiError> {
        let path = format!("/operations/{}", op_id);
        self.execute_with_retry(Method::GET, &path, None).await
    }

    async fn update_operation(
        &self,
        op_id: &str,
        done: bool,
        metadata: Value,
    ) -> Result<(), ApiError> {
        let path = format!("/operations/{}", op_id);
        let body = json!({ "done": done, "metadata": metadata });
        self.execute_with_retry(Method::PATCH, &path, Some(&body))
            .await?;
        Ok(())
    }

    async fn run_query(&self, command: Value) -> Result<Value, ApiError> {
        self.execute_with_retry(Method::POST, "/queries:run", Some(&command))
            .await
    }
}
