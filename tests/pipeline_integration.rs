//! End-to-end pipeline test over in-memory fakes.
//!
//! Drives the full loop: a completed sequencing record triggers a Reads QC
//! job, the lifecycle claims and submits it, the fake engine succeeds, the
//! finalizer registers the outputs, and the next scheduling cycle sees the
//! finished child and owes nothing.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::tempdir;

use nmdc_agent::engine::{EngineStatus, EngineSubmission, ExecutionEngine};
use nmdc_agent::engine::AssetSource;
use nmdc_agent::error::{ApiError, EngineError};
use nmdc_agent::config::load_configs;
use nmdc_agent::lifecycle::JobLifecycle;
use nmdc_agent::records::{DataObject, ProcessRecord};
use nmdc_agent::remote::{ClaimOutcome, RuntimeApi};
use nmdc_agent::scheduler::Scheduler;
use nmdc_agent::state::CheckpointFile;
use nmdc_agent::store::MemStore;

const CONFIGS: &str = r#"
workflows:
  - name: Sequencing
    collection: data_generation_set
    type: "nmdc:NucleotideSequencing"
    analyte_category: metagenome
    filter_output_objects:
      - Metagenome Raw Reads

  - name: Reads QC
    collection: workflow_execution_set
    type: "nmdc:ReadQcAnalysis"
    git_repo: https://example.org/readsqc
    version: v1.0.14
    wdl: rqcfilter.wdl
    input_prefix: rqc
    inputs:
      input_files: "do:Metagenome Raw Reads"
      proj: "{activityId}"
    filter_input_objects:
      - Metagenome Raw Reads
    filter_output_objects:
      - Filtered Sequencing Reads
    outputs:
      - output: filtered_final
        data_object_type: Filtered Sequencing Reads
        name: "{id}_filtered.fastq.gz"
        description: "Filtered reads for {id}"
    predecessors:
      - Sequencing
"#;

/// Mints sequential ids and claims jobs by writing the claim back into the
/// shared store, the way the real service does.
struct StoreBackedRuntime {
    store: Arc<MemStore>,
    counter: AtomicU64,
    site_id: String,
}

#[async_trait]
impl RuntimeApi for StoreBackedRuntime {
    async fn mint_ids(
        &self,
        schema_class: &str,
        how_many: usize,
        _informed_by: Option<&str>,
    ) -> Result<Vec<String>, ApiError> {
        let prefix = if schema_class == "nmdc:DataObject" {
            "nmdc:dobj"
        } else {
            "nmdc:wfrqc"
        };
        Ok((0..how_many)
            .map(|_| {
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                format!("{}-11-{:04}", prefix, n)
            })
            .collect())
    }

    async fn claim_job(&self, job_id: &str) -> Result<ClaimOutcome, ApiError> {
        if self.store.jobs().iter().any(|j| j.id == job_id && j.is_claimed()) {
            return Ok(ClaimOutcome::AlreadyClaimed);
        }
        let op_id = format!("op-{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.store.set_claim(job_id, &op_id, &self.site_id);
        Ok(ClaimOutcome::Claimed { op_id })
    }

    async fn get_operation(&self, _op_id: &str) -> Result<Value, ApiError> {
        Ok(Value::Null)
    }

    async fn update_operation(
        &self,
        _op_id: &str,
        _done: bool,
        _metadata: Value,
    ) -> Result<(), ApiError> {
        Ok(())
    }

    async fn run_query(&self, _command: Value) -> Result<Value, ApiError> {
        Ok(Value::Null)
    }
}

struct SucceedingEngine {
    metadata: Value,
    submissions: Mutex<Vec<Value>>,
}

#[async_trait]
impl ExecutionEngine for SucceedingEngine {
    async fn submit(&self, submission: EngineSubmission) -> Result<String, EngineError> {
        self.submissions.lock().unwrap().push(submission.inputs);
        Ok("run-1".to_string())
    }

    async fn status(&self, _run_id: &str) -> Result<EngineStatus, EngineError> {
        Ok(EngineStatus::Succeeded)
    }

    async fn metadata(&self, _run_id: &str) -> Result<Value, EngineError> {
        Ok(self.metadata.clone())
    }
}

struct StaticAssets;

#[async_trait]
impl AssetSource for StaticAssets {
    async fn fetch(
        &self,
        _git_repo: &str,
        _release: &str,
        asset: &str,
    ) -> Result<Vec<u8>, EngineError> {
        Ok(format!("asset:{}", asset).into_bytes())
    }
}

#[tokio::test]
async fn test_schedule_run_finalize_reschedule() {
    let dir = tempdir().unwrap();
    let output_source = dir.path().join("engine_output.fastq.gz");
    std::fs::write(&output_source, b"filtered-reads").unwrap();

    let store = Arc::new(MemStore::new());
    store.add_data_object(DataObject {
        id: "nmdc:dobj-raw".to_string(),
        name: "raw.fastq.gz".to_string(),
        description: String::new(),
        url: "https://data.example.org/raw.fastq.gz".to_string(),
        md5_checksum: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
        file_size_bytes: 10,
        data_object_type: "Metagenome Raw Reads".to_string(),
    });
    store.add_record(
        "data_generation_set",
        ProcessRecord {
            id: "nmdc:omprc-1".to_string(),
            type_tag: "nmdc:NucleotideSequencing".to_string(),
            name: "Sequencing of sample 1".to_string(),
            has_input: vec![],
            has_output: vec!["nmdc:dobj-raw".to_string()],
            was_informed_by: None,
            analyte_category: Some("metagenome".to_string()),
            version: None,
            git_url: None,
            started_at_time: None,
            ended_at_time: None,
            execution_resource: None,
        },
    );

    let runtime = Arc::new(StoreBackedRuntime {
        store: store.clone(),
        counter: AtomicU64::new(1),
        site_id: "test-site".to_string(),
    });
    let engine = Arc::new(SucceedingEngine {
        metadata: json!({
            "outputs": {
                "rqcfilter.filtered_final": output_source.to_string_lossy(),
            }
        }),
        submissions: Mutex::new(Vec::new()),
    });

    // Cycle 1: the completed sequencing record owes a Reads QC job.
    let configs = load_configs(CONFIGS).unwrap();
    let mut scheduler = Scheduler::new(store.clone(), runtime.clone(), configs);
    let created = scheduler.cycle(None).await.unwrap();
    assert_eq!(created.len(), 1);
    let activity_id = created[0].config.activity_id.clone();

    // Lifecycle: claim + submit, then poll + finalize.
    let mut allowed = HashSet::new();
    allowed.insert("Reads QC: v1.0.14".to_string());
    let data_dir = dir.path().join("data");
    let mut lifecycle = JobLifecycle::new(
        store.clone(),
        runtime.clone(),
        engine.clone(),
        Arc::new(StaticAssets),
        "test-site",
        allowed,
        &data_dir,
        "https://data.example.org",
        CheckpointFile::new(dir.path().join("agent.json")),
    );
    lifecycle.cycle().await.unwrap();
    lifecycle.cycle().await.unwrap();

    let job = lifecycle.tracked_jobs().next().unwrap();
    assert!(job.done);
    assert_eq!(job.last_status, EngineStatus::Succeeded);

    // Inputs were namespaced with the configured prefix.
    {
        let submissions = engine.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(
            submissions[0]["rqc.input_files"],
            Value::String("https://data.example.org/raw.fastq.gz".to_string())
        );
        assert_eq!(submissions[0]["rqc.proj"], Value::String(activity_id.clone()));
    }

    // Finalization registered the execution record and the output object.
    let executions = store.records_in("workflow_execution_set");
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].id, activity_id);
    assert_eq!(
        executions[0].was_informed_by.as_deref(),
        Some("nmdc:omprc-1")
    );
    assert_eq!(executions[0].has_output.len(), 1);
    let filtered = store
        .data_objects()
        .into_iter()
        .find(|o| o.data_object_type == "Filtered Sequencing Reads")
        .unwrap();
    assert_eq!(filtered.file_size_bytes, 14);
    assert!(!filtered.md5_checksum.is_empty());

    // The copied output landed under <data_dir>/<informed>/<activity>/.
    let copied = data_dir
        .join("nmdc:omprc-1")
        .join(&activity_id)
        .join(format!("{}_filtered.fastq.gz", activity_id));
    assert_eq!(std::fs::read(&copied).unwrap(), b"filtered-reads");

    // Cycle 2: the finished child satisfies the successor; nothing owed.
    let created = scheduler.cycle(None).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(store.jobs().len(), 1);
}
