//! Agent settings read from the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::SettingsError;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Checkpoint location when `AGENT_STATE_FILE` is unset. The file (and its
/// parent directory) is created with an empty document on first read.
const DEFAULT_STATE_FILE: &str = "agent_state.json";

/// Runtime settings for one site agent.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base URL of the remote metadata/identifier service.
    pub api_base: String,
    pub client_id: String,
    pub client_secret: String,
    /// Base URL of the workflow execution engine.
    pub engine_url: String,
    /// Site identifier this agent claims jobs as.
    pub site_id: String,
    /// Checkpoint file path; defaults to `agent_state.json` and is created
    /// with an empty document on first use.
    pub state_file: PathBuf,
    /// Root directory finalized outputs are copied into.
    pub data_dir: PathBuf,
    /// Public URL prefix matching `data_dir`.
    pub data_url_base: String,
    pub poll_interval: Duration,
    /// Workflow definition YAML path.
    pub workflows_file: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut poll_interval = Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS);
        if let Ok(val) = std::env::var("AGENT_POLL_INTERVAL_SECS") {
            let secs: u64 = parse_env_value(&val, "AGENT_POLL_INTERVAL_SECS")?;
            poll_interval = Duration::from_secs(secs);
        }

        Ok(Self {
            api_base: required("AGENT_API_BASE")?,
            client_id: required("AGENT_CLIENT_ID")?,
            client_secret: required("AGENT_CLIENT_SECRET")?,
            engine_url: required("AGENT_ENGINE_URL")?,
            site_id: required("AGENT_SITE_ID")?,
            state_file: std::env::var("AGENT_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_STATE_FILE)),
            data_dir: PathBuf::from(required("AGENT_DATA_DIR")?),
            data_url_base: required("AGENT_DATA_URL_BASE")?
                .trim_end_matches('/')
                .to_string(),
            poll_interval,
            workflows_file: PathBuf::from(required("AGENT_WORKFLOWS_FILE")?),
        })
    }
}

fn required(key: &str) -> Result<String, SettingsError> {
    std::env::var(key).map_err(|_| SettingsError::MissingEnvVar(key.to_string()))
}

/// Parse an environment variable using FromStr.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, SettingsError> {
    value.parse().map_err(|_| SettingsError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
