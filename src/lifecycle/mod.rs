//! Claim, submit, poll, and finalize jobs against the execution engine.
//!
//! `JobLifecycle` owns a cache of claimed jobs keyed by operation id and
//! drives each through the state machine: claimed, submitted, running,
//! then either finalized (outputs registered, operation closed, `done`)
//! or abandoned after `MAX_FAILS` engine failures. The cache is
//! checkpointed after every transition so a restart resumes polling known
//! run ids instead of resubmitting.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::engine::{AssetSource, EngineStatus, EngineSubmission, ExecutionEngine, DEPENDENCY_BUNDLE};
use crate::error::LifecycleError;
use crate::records::{DataObject, ProcessRecord};
use crate::remote::{ClaimOutcome, RuntimeApi};
use crate::scheduler::job::{JobConfig, JobRecord};
use crate::state::CheckpointFile;
use crate::store::DocumentStore;

/// Engine failures tolerated before a job is abandoned.
pub const MAX_FAILS: u32 = 2;

/// Engine metadata artifact written next to the copied outputs.
const METADATA_FILENAME: &str = "metadata.json";

/// One claimed job as tracked in the checkpoint. Field names on the wire
/// are fixed; checkpoints are shared with external tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowJob {
    #[serde(rename = "opId")]
    pub op_id: String,
    #[serde(rename = "nmdcJobid")]
    pub job_id: String,
    #[serde(rename = "type")]
    pub workflow_type: String,
    pub config: JobConfig,
    #[serde(rename = "activityId")]
    pub activity_id: String,
    #[serde(rename = "lastStatus")]
    pub last_status: EngineStatus,
    pub done: bool,
    #[serde(rename = "failedCount", default)]
    pub failed_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Engine-assigned run id, absent until first successful submit.
    #[serde(
        rename = "cromwellJobid",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub run_id: Option<String>,
}

impl WorkflowJob {
    pub fn from_record(record: &JobRecord, op_id: &str) -> Self {
        Self {
            op_id: op_id.to_string(),
            job_id: record.id.clone(),
            workflow_type: record.config.workflow_type.clone(),
            activity_id: record.config.activity_id.clone(),
            config: record.config.clone(),
            last_status: EngineStatus::Unknown("Unsubmitted".to_string()),
            done: false,
            failed_count: 0,
            start: None,
            end: None,
            run_id: None,
        }
    }
}

/// Pre-insert check on the finalize payload.
pub trait DocumentValidator: Send + Sync {
    /// Returns a human-readable reason on rejection.
    fn validate(&self, record: &ProcessRecord, objects: &[DataObject]) -> Result<(), String>;
}

/// Rejects records and data objects with empty required fields.
pub struct RequiredFieldValidator;

impl DocumentValidator for RequiredFieldValidator {
    fn validate(&self, record: &ProcessRecord, objects: &[DataObject]) -> Result<(), String> {
        if record.id.is_empty() {
            return Err("execution record has no id".to_string());
        }
        if record.type_tag.is_empty() {
            return Err(format!("record '{}' has no type", record.id));
        }
        if record.was_informed_by.is_none() {
            return Err(format!("record '{}' has no was_informed_by", record.id));
        }
        for object in objects {
            if object.id.is_empty() {
                return Err(format!("data object '{}' has no id", object.name));
            }
            if object.url.is_empty() {
                return Err(format!("data object '{}' has no url", object.id));
            }
            if object.md5_checksum.is_empty() {
                return Err(format!("data object '{}' has no md5 checksum", object.id));
            }
        }
        Ok(())
    }
}

/// Drives claimed jobs from claim to finalization.
pub struct JobLifecycle {
    store: Arc<dyn DocumentStore>,
    runtime: Arc<dyn RuntimeApi>,
    engine: Arc<dyn ExecutionEngine>,
    assets: Arc<dyn AssetSource>,
    validator: Box<dyn DocumentValidator>,
    site_id: String,
    /// `workflow.id` values this site is willing to claim.
    allowed_workflows: HashSet<String>,
    data_dir: PathBuf,
    data_url_base: String,
    checkpoint: CheckpointFile,
    jobs: HashMap<String, WorkflowJob>,
}

impl JobLifecycle {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        runtime: Arc<dyn RuntimeApi>,
        engine: Arc<dyn ExecutionEngine>,
        assets: Arc<dyn AssetSource>,
        site_id: impl Into<String>,
        allowed_workflows: HashSet<String>,
        data_dir: impl Into<PathBuf>,
        data_url_base: impl Into<String>,
        checkpoint: CheckpointFile,
    ) -> Self {
        Self {
            store,
            runtime,
            engine,
            assets,
            validator: Box::new(RequiredFieldValidator),
            site_id: site_id.into(),
            allowed_workflows,
            data_dir: data_dir.into(),
            data_url_base: data_url_base.into(),
            checkpoint,
            jobs: HashMap::new(),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn DocumentValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn tracked_jobs(&self) -> impl Iterator<Item = &WorkflowJob> {
        self.jobs.values()
    }

    /// Loads the checkpoint into the cache. Entries already cached keep
    /// their in-memory state.
    pub async fn restore(&mut self) -> Result<usize, LifecycleError> {
        let entries = self.checkpoint.read().await?;
        let mut restored = 0;
        for entry in entries {
            let job: WorkflowJob = match serde_json::from_value(entry) {
                Ok(job) => job,
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable checkpoint entry");
                    continue;
                }
            };
            if self.jobs.contains_key(&job.op_id) {
                continue;
            }
            self.jobs.insert(job.op_id.clone(), job);
            restored += 1;
        }

        // A crash between finalize and the checkpoint write leaves the
        // remote operation ahead of the local file; trust the server.
        let pending: Vec<String> = self
            .jobs
            .values()
            .filter(|j| !j.done)
            .map(|j| j.op_id.clone())
            .collect();
        for op_id in pending {
            match self.runtime.get_operation(&op_id).await {
                Ok(operation) => {
                    if operation.get("done").and_then(Value::as_bool) == Some(true) {
                        info!(op_id = %op_id, "Remote operation already done, closing local job");
                        if let Some(job) = self.jobs.get_mut(&op_id) {
                            job.done = true;
                        }
                    }
                }
                Err(err) => {
                    warn!(op_id = %op_id, error = %err, "Could not reconcile operation state")
                }
            }
        }

        info!(count = restored, "Restored jobs from checkpoint");
        Ok(restored)
    }

    async fn save(&self) -> Result<(), LifecycleError> {
        let mut entries: Vec<&WorkflowJob> = self.jobs.values().collect();
        entries.sort_by(|a, b| a.op_id.cmp(&b.op_id));
        let values = entries
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<Value>, _>>()?;
        self.checkpoint.write(&values).await?;
        Ok(())
    }

    /// Unclaimed job records for the workflows this site runs.
    pub async fn discover_unclaimed(&self) -> Result<Vec<JobRecord>, LifecycleError> {
        Ok(self.store.unclaimed_jobs(&self.allowed_workflows).await?)
    }

    /// Claims one job and registers it in the cache. A claim conflict is
    /// not an error; the job simply belongs to another site.
    pub async fn claim_and_register(&mut self, record: &JobRecord) -> Result<bool, LifecycleError> {
        match self.runtime.claim_job(&record.id).await? {
            ClaimOutcome::Claimed { op_id } => {
                info!(job = %record.id, op_id = %op_id, "Claimed job");
                self.prepare_and_cache(record, &op_id, false);
                Ok(true)
            }
            ClaimOutcome::AlreadyClaimed => {
                debug!(job = %record.id, "Job already claimed elsewhere");
                Ok(false)
            }
        }
    }

    /// Caches a claimed job. No-op when the operation id is already
    /// tracked, unless forced.
    pub fn prepare_and_cache(&mut self, record: &JobRecord, op_id: &str, force: bool) {
        if !force && self.jobs.contains_key(op_id) {
            return;
        }
        self.jobs
            .insert(op_id.to_string(), WorkflowJob::from_record(record, op_id));
    }

    /// Fetches release assets and submits the run. On error the job keeps
    /// no run id and is retried next cycle.
    pub async fn submit(&mut self, op_id: &str) -> Result<(), LifecycleError> {
        let Some(job) = self.jobs.get(op_id) else {
            return Ok(());
        };
        let config = job.config.clone();
        let activity_id = job.activity_id.clone();

        let source = self
            .assets
            .fetch(&config.git_repo, &config.release, &config.wdl)
            .await?;
        let dependencies = self
            .assets
            .fetch(&config.git_repo, &config.release, DEPENDENCY_BUNDLE)
            .await?;

        let mut inputs = serde_json::Map::new();
        for (name, value) in &config.inputs {
            inputs.insert(format!("{}.{}", config.input_prefix, name), value.clone());
        }
        let labels = json!({
            "pipeline": config.wdl,
            "pipeline_version": config.release,
            "release": config.release,
            "git_repo": config.git_repo,
            "activity_id": activity_id,
            "opid": op_id,
            "submitter": self.site_id,
            "wdl": config.wdl,
        });

        let run_id = self
            .engine
            .submit(EngineSubmission {
                source,
                dependencies: Some(dependencies),
                inputs: Value::Object(inputs),
                labels,
            })
            .await?;
        info!(op_id = op_id, run_id = %run_id, activity = %activity_id, "Submitted run");

        if let Some(job) = self.jobs.get_mut(op_id) {
            job.run_id = Some(run_id);
            job.start = Some(Utc::now());
            job.last_status = EngineStatus::Submitted;
        }
        Ok(())
    }

    /// Polls the engine once, stamping `end` on first observed terminal
    /// success.
    pub async fn poll_status(&mut self, op_id: &str) -> Result<EngineStatus, LifecycleError> {
        let (activity_id, run_id) = match self.jobs.get(op_id) {
            Some(job) => (job.activity_id.clone(), job.run_id.clone()),
            None => {
                return Err(LifecycleError::NotSubmitted {
                    activity_id: op_id.to_string(),
                })
            }
        };
        let run_id = run_id.ok_or(LifecycleError::NotSubmitted {
            activity_id: activity_id.clone(),
        })?;

        let status = self.engine.status(&run_id).await?;
        if let Some(job) = self.jobs.get_mut(op_id) {
            if status.is_success() && job.end.is_none() {
                job.end = Some(Utc::now());
            }
            job.last_status = status.clone();
        }
        Ok(status)
    }

    /// Registers the run's outputs and closes out the job.
    ///
    /// Copies each declared output under
    /// `<data_dir>/<was_informed_by>/<activity_id>/`, checksums it, builds
    /// the data objects and the execution record, validates them, posts
    /// them to the store, marks the remote operation done, and writes the
    /// engine metadata artifact (exactly once).
    pub async fn finalize(&mut self, op_id: &str) -> Result<(), LifecycleError> {
        let Some(job) = self.jobs.get(op_id).cloned() else {
            return Ok(());
        };
        let run_id = job.run_id.clone().ok_or(LifecycleError::NotSubmitted {
            activity_id: job.activity_id.clone(),
        })?;

        let metadata = self.engine.metadata(&run_id).await?;
        let engine_outputs = metadata.get("outputs").cloned().unwrap_or(Value::Null);

        let target_dir = self
            .data_dir
            .join(&job.config.was_informed_by)
            .join(&job.activity_id);
        fs::create_dir_all(&target_dir).await?;

        let mut objects = Vec::new();
        for declared in &job.config.outputs {
            let source_path = locate_output(&engine_outputs, &declared.output).ok_or_else(|| {
                LifecycleError::MissingOutput {
                    activity_id: job.activity_id.clone(),
                    output: declared.output.clone(),
                }
            })?;

            let target = target_dir.join(&declared.name);
            fs::copy(&source_path, &target).await?;
            let bytes = fs::read(&target).await?;
            let checksum = hex::encode(Md5::digest(&bytes));

            objects.push(DataObject {
                id: declared.id.clone(),
                name: declared.name.clone(),
                description: declared.description.clone(),
                url: format!(
                    "{}/{}/{}/{}",
                    self.data_url_base, job.config.was_informed_by, job.activity_id, declared.name
                ),
                md5_checksum: checksum,
                file_size_bytes: bytes.len() as u64,
                data_object_type: declared.data_object_type.clone(),
            });
        }

        let record = ProcessRecord {
            id: job.activity_id.clone(),
            type_tag: job.workflow_type.clone(),
            name: format!("{} for {}", job.workflow_type, job.config.was_informed_by),
            has_input: job
                .config
                .input_data_objects
                .iter()
                .map(|o| o.id.clone())
                .collect(),
            has_output: objects.iter().map(|o| o.id.clone()).collect(),
            was_informed_by: Some(job.config.was_informed_by.clone()),
            analyte_category: None,
            version: Some(job.config.release.clone()),
            git_url: Some(job.config.git_repo.clone()),
            started_at_time: job.start.map(|t| t.to_rfc3339()),
            ended_at_time: job.end.map(|t| t.to_rfc3339()),
            execution_resource: Some(self.site_id.clone()),
        };

        self.validator
            .validate(&record, &objects)
            .map_err(|message| LifecycleError::Validation {
                activity_id: job.activity_id.clone(),
                message,
            })?;

        self.store.insert_data_objects(&objects).await?;
        self.store
            .insert_execution_record(&job.config.activity_set, &record)
            .await?;

        self.runtime
            .update_operation(
                op_id,
                true,
                json!({
                    "activity_id": job.activity_id,
                    "nmdc_job_id": job.job_id,
                    "data_objects": objects,
                    "engine_metadata": metadata.clone(),
                }),
            )
            .await?;

        let artifact = target_dir.join(METADATA_FILENAME);
        if fs::metadata(&artifact).await.is_err() {
            fs::write(&artifact, serde_json::to_vec_pretty(&metadata)?).await?;
        }

        if let Some(job) = self.jobs.get_mut(op_id) {
            job.done = true;
        }
        info!(op_id = op_id, activity = %job.activity_id, "Finalized job");
        Ok(())
    }

    /// Counts a failure; resubmits below `MAX_FAILS`, abandons at it.
    pub async fn process_failed(&mut self, op_id: &str) -> Result<(), LifecycleError> {
        let abandoned = {
            let Some(job) = self.jobs.get_mut(op_id) else {
                return Ok(());
            };
            job.failed_count += 1;
            job.run_id = None;
            if job.failed_count >= MAX_FAILS {
                job.done = true;
                true
            } else {
                false
            }
        };
        if abandoned {
            warn!(op_id = op_id, "Abandoning job after repeated engine failures");
            Ok(())
        } else {
            warn!(op_id = op_id, "Run failed, resubmitting");
            self.submit(op_id).await
        }
    }

    /// Advances a single cached job one step.
    async fn advance(&mut self, op_id: &str) -> Result<(), LifecycleError> {
        let (done, submitted) = match self.jobs.get(op_id) {
            Some(job) => (job.done, job.run_id.is_some()),
            None => return Ok(()),
        };
        if done {
            return Ok(());
        }
        if !submitted {
            return self.submit(op_id).await;
        }
        let status = self.poll_status(op_id).await?;
        match status {
            EngineStatus::Succeeded => self.finalize(op_id).await,
            status if status.is_terminal() => self.process_failed(op_id).await,
            _ => Ok(()),
        }
    }

    /// One pass of the watch loop: discover, claim, advance, checkpoint.
    ///
    /// Per-job errors are logged and retried next cycle; only fatal errors
    /// (failed document validation) propagate.
    pub async fn cycle(&mut self) -> Result<(), LifecycleError> {
        match self.discover_unclaimed().await {
            Ok(records) => {
                for record in records {
                    if let Err(err) = self.claim_and_register(&record).await {
                        warn!(job = %record.id, error = %err, "Claim failed");
                    }
                }
            }
            Err(err) => warn!(error = %err, "Unclaimed job discovery failed"),
        }
        self.save().await?;

        let mut op_ids: Vec<String> = self.jobs.keys().cloned().collect();
        op_ids.sort();
        for op_id in op_ids {
            if let Err(err) = self.advance(&op_id).await {
                if err.is_fatal() {
                    self.save().await?;
                    return Err(err);
                }
                warn!(op_id = %op_id, error = %err, "Job step failed, will retry");
            }
            self.save().await?;
        }
        Ok(())
    }

    /// Watch loop: restore the checkpoint, then cycle forever on a fixed
    /// interval. Returns only on a fatal error.
    pub async fn run(&mut self, poll_interval: Duration) -> Result<(), LifecycleError> {
        self.restore().await?;
        loop {
            self.cycle().await?;
            tokio::time::sleep(poll_interval).await;
        }
    }
}

/// Finds the engine output whose key's final segment matches the declared
/// output name, returning its file path.
fn locate_output(outputs: &Value, name: &str) -> Option<String> {
    let map = outputs.as_object()?;
    let suffix = format!(".{}", name);
    map.iter()
        .find(|(key, _)| key.ends_with(&suffix) || *key == name)
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}
