//! Workflow execution engine client (Cromwell-style WDL REST API).
//!
//! The engine schedules work internally; this crate only submits a
//! pipeline (multipart: source, dependency bundle, inputs, labels), polls
//! run status, and pulls run metadata at finalize time.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::EngineError;

/// Request timeout in seconds. Submissions upload the dependency bundle,
/// so this is longer than the metadata client's timeout.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Conventional name of the subworkflow dependency bundle in a release.
pub const DEPENDENCY_BUNDLE: &str = "imports.zip";

/// Engine-reported status of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    Submitted,
    Running,
    Succeeded,
    Failed,
    Aborted,
    Unknown(String),
}

impl EngineStatus {
    /// Case-insensitive parse; unrecognized statuses are carried verbatim.
    pub fn parse(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "submitted" => EngineStatus::Submitted,
            "running" => EngineStatus::Running,
            "succeeded" => EngineStatus::Succeeded,
            "failed" => EngineStatus::Failed,
            "aborted" => EngineStatus::Aborted,
            _ => EngineStatus::Unknown(status.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EngineStatus::Succeeded | EngineStatus::Failed | EngineStatus::Aborted
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self, EngineStatus::Succeeded)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Submitted => write!(f, "Submitted"),
            EngineStatus::Running => write!(f, "Running"),
            EngineStatus::Succeeded => write!(f, "Succeeded"),
            EngineStatus::Failed => write!(f, "Failed"),
            EngineStatus::Aborted => write!(f, "Aborted"),
            EngineStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for EngineStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EngineStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.is_empty() {
            return Err(D::Error::custom("empty engine status"));
        }
        Ok(EngineStatus::parse(&value))
    }
}

/// Everything the engine needs to start one run.
pub struct EngineSubmission {
    /// Pipeline source document (WDL).
    pub source: Vec<u8>,
    /// Subworkflow dependency bundle, when the release ships one.
    pub dependencies: Option<Vec<u8>>,
    /// Input document, parameter names already namespaced.
    pub inputs: Value,
    /// Label document attached to the run for traceability.
    pub labels: Value,
}

/// Submission, polling, and metadata retrieval against an engine.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Starts a run; returns the engine-assigned run id.
    async fn submit(&self, submission: EngineSubmission) -> Result<String, EngineError>;

    async fn status(&self, run_id: &str) -> Result<EngineStatus, EngineError>;

    /// Full run metadata, including the output map.
    async fn metadata(&self, run_id: &str) -> Result<Value, EngineError>;
}

#[derive(Debug, Deserialize)]
struct RunHandle {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunStatus {
    status: String,
}

/// Cromwell-compatible REST client.
pub struct CromwellClient {
    http: Client,
    base_url: String,
}

impl CromwellClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json(&self, url: &str) -> Result<Value, EngineError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                code: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))
    }
}

#[async_trait]
impl ExecutionEngine for CromwellClient {
    async fn submit(&self, submission: EngineSubmission) -> Result<String, EngineError> {
        let mut form = Form::new()
            .part(
                "workflowSource",
                Part::bytes(submission.source).file_name("workflow.wdl"),
            )
            .text("workflowInputs", submission.inputs.to_string())
            .text("labels", submission.labels.to_string());
        if let Some(bundle) = submission.dependencies {
            form = form.part(
                "workflowDependencies",
                Part::bytes(bundle).file_name(DEPENDENCY_BUNDLE),
            );
        }

        let response = self
            .http
            .post(&self.base_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::RequestFailed(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let handle: RunHandle = response
            .json()
            .await
            .map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(handle.id)
    }

    async fn status(&self, run_id: &str) -> Result<EngineStatus, EngineError> {
        let url = format!("{}/{}/status", self.base_url, run_id);
        let value = self.get_json(&url).await?;
        let status: RunStatus =
            serde_json::from_value(value).map_err(|e| EngineError::Parse(e.to_string()))?;
        Ok(EngineStatus::parse(&status.status))
    }

    async fn metadata(&self, run_id: &str) -> Result<Value, EngineError> {
        let url = format!("{}/{}/metadata", self.base_url, run_id);
        self.get_json(&url).await
    }
}

/// Fetches pipeline release assets (WDL source, dependency bundle) over
/// HTTP.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Downloads one named asset of a (repository, release) pair.
    async fn fetch(&self, git_repo: &str, release: &str, asset: &str)
        -> Result<Vec<u8>, EngineError>;
}

/// Downloads release assets from the repository's release download URL.
pub struct ReleaseFetcher {
    http: Client,
}

impl ReleaseFetcher {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client - system TLS configuration error"),
        }
    }
}

impl Default for ReleaseFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetSource for ReleaseFetcher {
    async fn fetch(
        &self,
        git_repo: &str,
        release: &str,
        asset: &str,
    ) -> Result<Vec<u8>, EngineError> {
        let url = format!(
            "{}/releases/download/{}/{}",
            git_repo.trim_end_matches('/'),
            release,
            asset
        );
        let response = self.http.get(&url).send().await.map_err(|e| {
            EngineError::AssetFetch {
                url: url.clone(),
                message: e.to_string(),
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::AssetFetch {
                url,
                message: format!("HTTP {}", status.as_u16()),
            });
        }
        let bytes = response.bytes().await.map_err(|e| EngineError::AssetFetch {
            url,
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}
