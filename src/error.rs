//! Error types for agent operations.
//!
//! Defines error types for all major subsystems:
//! - Workflow definition loading and linking
//! - Provenance graph construction
//! - Job scheduling
//! - Remote metadata/identifier service calls
//! - Workflow execution engine calls
//! - Job lifecycle management
//! - Checkpoint persistence

use thiserror::Error;

/// Errors that can occur while loading workflow definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse workflow definitions: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Workflow '{workflow}' names unknown predecessor '{predecessor}'")]
    UnknownPredecessor {
        workflow: String,
        predecessor: String,
    },

    #[error("Duplicate workflow name '{0}'")]
    DuplicateName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur reading agent settings from the environment.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors that can occur talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store call failed: {0}")]
    Remote(#[from] ApiError),

    #[error("Malformed store document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors that can occur during provenance graph construction.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Generation configs passed to a build span zero or more than one
    /// analyte category. Fatal for the call.
    #[error("Invalid analyte category configuration: {0}")]
    Configuration(String),

    /// A record's type tag matches no loaded workflow definition.
    /// Skipped per record, never a whole-cycle abort.
    #[error("Record '{id}' has unknown type '{type_tag}'")]
    UnknownRecordType { id: String, type_tag: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur while scheduling jobs.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Workflow '{workflow}' input '{input}' references data object type '{object_type}' absent from the lineage")]
    UnresolvedInput {
        workflow: String,
        input: String,
        object_type: String,
    },

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Identifier service error: {0}")]
    Api(#[from] ApiError),

    #[error("Identifier mint returned no ids for schema class '{0}'")]
    EmptyMint(String),
}

/// Errors that can occur calling the remote metadata/identifier service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Token request rejected: {0}")]
    Auth(String),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },
}

impl ApiError {
    /// Whether a retry with backoff is worthwhile.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RequestFailed(_) => true,
            ApiError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Errors that can occur calling the workflow execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Engine error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Failed to parse engine response: {0}")]
    Parse(String),

    #[error("Failed to fetch release asset '{url}': {message}")]
    AssetFetch { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur during the job claim/submit/poll/finalize lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Remote service error: {0}")]
    Api(#[from] ApiError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint error: {0}")]
    State(#[from] StateError),

    #[error("Job '{activity_id}' has not been submitted to the engine")]
    NotSubmitted { activity_id: String },

    #[error("Engine metadata for '{activity_id}' is missing output '{output}'")]
    MissingOutput { activity_id: String, output: String },

    /// Schema validation failed on a finalize payload. Treated as a
    /// programming defect: the run loop propagates this instead of
    /// continuing.
    #[error("Document validation failed for '{activity_id}': {message}")]
    Validation { activity_id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LifecycleError {
    /// Whether the run loop must stop instead of logging and continuing.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LifecycleError::Validation { .. })
    }
}

/// Errors that can occur reading or writing the checkpoint file.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint directory creation failed: {0}")]
    DirectoryCreationFailed(String),
}
