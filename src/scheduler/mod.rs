//! Job scheduling over the provenance graph.
//!
//! One cycle walks every process node and, per configured successor
//! relationship, decides whether a new job is owed. A job is owed when the
//! successor stage is enabled, no equivalent job record already exists,
//! and no child run of the successor stage (within version range) exists
//! yet. Owed jobs are materialized with a minted, versioned activity id
//! and inserted into the `jobs` collection unclaimed.
//!
//! The existing-job check and the count-then-mint id assignment are both
//! read-then-write without a transaction. Two schedulers racing on the
//! same trigger node can each insert a job for the same logical work; this
//! is tolerated because claiming stays at-most-one.

pub mod job;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{within_range, ConfigSet, WorkflowConfig};
use crate::error::SchedulerError;
use crate::graph::{GraphBuilder, ProcessGraph};
use crate::records::DataObject;
use crate::remote::RuntimeApi;
use crate::store::DocumentStore;

use job::{JobConfig, JobOutput, JobRecord, JobWorkflowRef};

/// Schema class minted for job output data objects.
const DATA_OBJECT_CLASS: &str = "nmdc:DataObject";

/// Per-cycle cache of existing-job lookups, created at cycle start and
/// dropped with the cycle. Never shared across cycles.
#[derive(Default)]
struct CycleCache {
    jobs_by_workflow: HashMap<String, Vec<JobRecord>>,
}

/// Walks the provenance graph and materializes owed job records.
pub struct Scheduler {
    store: Arc<dyn DocumentStore>,
    runtime: Arc<dyn RuntimeApi>,
    configs: ConfigSet,
    builder: GraphBuilder,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        runtime: Arc<dyn RuntimeApi>,
        configs: ConfigSet,
    ) -> Self {
        Self {
            store,
            runtime,
            configs,
            builder: GraphBuilder::new(),
        }
    }

    /// Runs one scheduling cycle: rebuild the graph, then decide per
    /// (node, successor) pair. Per-node errors are logged and the cycle
    /// continues; only graph-level configuration errors abort the pass.
    pub async fn cycle(
        &mut self,
        allowlist: Option<&HashSet<String>>,
    ) -> Result<Vec<JobRecord>, SchedulerError> {
        let graph = self
            .builder
            .build(self.store.as_ref(), &self.configs, allowlist)
            .await?;
        debug!(nodes = graph.len(), "Built provenance graph");

        let mut cache = CycleCache::default();
        let mut created = Vec::new();

        for idx in graph.indices() {
            let children: Vec<String> = graph.node(idx).config.children.clone();
            for child_name in children {
                let Some(candidate) = self.configs.get(&child_name).cloned() else {
                    continue;
                };
                if !candidate.enabled {
                    continue;
                }
                match self
                    .try_schedule(&graph, idx, &candidate, &mut cache)
                    .await
                {
                    Ok(Some(record)) => {
                        info!(
                            job = %record.id,
                            workflow = %record.workflow.id,
                            activity = %record.config.activity_id,
                            trigger = %record.config.trigger_activity,
                            "Created job record"
                        );
                        created.push(record);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(
                            node = %graph.node(idx).id,
                            workflow = %candidate.name,
                            error = %err,
                            "Skipping candidate after scheduling error"
                        );
                    }
                }
            }
        }

        Ok(created)
    }

    async fn try_schedule(
        &self,
        graph: &ProcessGraph,
        idx: usize,
        candidate: &Arc<WorkflowConfig>,
        cache: &mut CycleCache,
    ) -> Result<Option<JobRecord>, SchedulerError> {
        let node = graph.node(idx);

        // An existing job for this trigger and (repo, release) means the
        // work is already owed; never duplicate it.
        let existing = self.existing_jobs(cache, candidate).await?;
        if existing
            .iter()
            .any(|j| j.config.trigger_activity == node.id)
        {
            return Ok(None);
        }

        // A finished child run of the candidate stage within version range
        // means the work is already done.
        let satisfied = graph.children_of(idx).any(|child| {
            child.config.name == candidate.name
                && child
                    .version
                    .as_deref()
                    .is_some_and(|v| within_range(v, &candidate.version))
        });
        if satisfied {
            return Ok(None);
        }

        let accumulated = graph.accumulate_data_objects(idx);

        let (root, iteration) = self
            .assign_activity_id(candidate, &node.was_informed_by)
            .await?;
        let activity_id = format!("{}.{}", root, iteration);

        let (inputs, input_data_objects) = resolve_inputs(
            candidate,
            &accumulated,
            &activity_id,
            &node.was_informed_by,
        )?;

        let outputs = self
            .mint_outputs(candidate, &activity_id, &node.was_informed_by)
            .await?;

        let record = JobRecord {
            id: format!("nmdc:job-{}", Uuid::new_v4()),
            workflow: JobWorkflowRef {
                id: candidate.workflow_id(),
            },
            created_at: Utc::now(),
            config: JobConfig {
                git_repo: candidate.git_repo.clone(),
                release: candidate.version.clone(),
                wdl: candidate.wdl.clone(),
                workflow_type: candidate.type_tag.clone(),
                activity_id,
                activity_set: candidate.collection.clone(),
                was_informed_by: node.was_informed_by.clone(),
                trigger_activity: node.id.clone(),
                iteration,
                input_prefix: candidate.input_prefix.clone(),
                inputs,
                input_data_objects,
                outputs,
            },
            claims: Vec::new(),
        };

        self.store.insert_job(&record).await?;
        Ok(Some(record))
    }

    async fn existing_jobs<'a>(
        &self,
        cache: &'a mut CycleCache,
        candidate: &WorkflowConfig,
    ) -> Result<&'a [JobRecord], SchedulerError> {
        if !cache.jobs_by_workflow.contains_key(&candidate.name) {
            let jobs = self
                .store
                .jobs_for_workflow(&candidate.git_repo, &candidate.version)
                .await?;
            cache
                .jobs_by_workflow
                .insert(candidate.name.clone(), jobs);
        }
        Ok(cache
            .jobs_by_workflow
            .get(&candidate.name)
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Count-then-mint id assignment. Zero existing records of the target
    /// type for this lineage key: mint a fresh root, iteration 1.
    /// Otherwise: recover the root by stripping the most recent id's
    /// trailing `.N` and continue the count.
    async fn assign_activity_id(
        &self,
        candidate: &WorkflowConfig,
        was_informed_by: &str,
    ) -> Result<(String, u32), SchedulerError> {
        let ids = self
            .store
            .execution_ids_informed_by(&candidate.collection, &candidate.type_tag, was_informed_by)
            .await?;
        match ids.last() {
            None => {
                let minted = self
                    .runtime
                    .mint_ids(&candidate.type_tag, 1, Some(was_informed_by))
                    .await?;
                let root = minted
                    .into_iter()
                    .next()
                    .ok_or_else(|| SchedulerError::EmptyMint(candidate.type_tag.clone()))?;
                Ok((root, 1))
            }
            Some(latest) => Ok((
                strip_iteration_suffix(latest).to_string(),
                ids.len() as u32 + 1,
            )),
        }
    }

    async fn mint_outputs(
        &self,
        candidate: &WorkflowConfig,
        activity_id: &str,
        was_informed_by: &str,
    ) -> Result<Vec<JobOutput>, SchedulerError> {
        if candidate.outputs.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self
            .runtime
            .mint_ids(DATA_OBJECT_CLASS, candidate.outputs.len(), Some(was_informed_by))
            .await?;
        if ids.len() < candidate.outputs.len() {
            return Err(SchedulerError::EmptyMint(DATA_OBJECT_CLASS.to_string()));
        }
        Ok(candidate
            .outputs
            .iter()
            .zip(ids)
            .map(|(spec, id)| JobOutput {
                output: spec.output.clone(),
                data_object_type: spec.data_object_type.clone(),
                id,
                name: spec.name.replace("{id}", activity_id),
                description: spec.description.replace("{id}", activity_id),
            })
            .collect())
    }
}

/// Strips a trailing `.N` iteration suffix, recovering the root id.
fn strip_iteration_suffix(id: &str) -> &str {
    if let Some(pos) = id.rfind('.') {
        let suffix = &id[pos + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return &id[..pos];
        }
    }
    id
}

/// Resolves configured inputs against the accumulated data objects.
///
/// Literals pass through; `{wasInformedBy}` and `{activityId}`
/// placeholders substitute; `do:<type>` references resolve to the
/// accumulated object's URL. A missing required reference fails the job;
/// a missing optional reference is omitted.
fn resolve_inputs(
    candidate: &WorkflowConfig,
    accumulated: &HashMap<String, DataObject>,
    activity_id: &str,
    was_informed_by: &str,
) -> Result<(Map<String, Value>, Vec<DataObject>), SchedulerError> {
    let mut inputs = Map::new();
    let mut referenced = Vec::new();
    let mut seen_ids = HashSet::new();

    for (name, value) in &candidate.inputs {
        let Some(text) = value.as_str() else {
            inputs.insert(name.clone(), value.clone());
            continue;
        };
        if let Some(object_type) = text.strip_prefix("do:") {
            match accumulated.get(object_type) {
                Some(object) => {
                    inputs.insert(name.clone(), Value::String(object.url.clone()));
                    if seen_ids.insert(object.id.clone()) {
                        referenced.push(object.clone());
                    }
                }
                None if candidate.optional_inputs.contains(name) => {
                    debug!(
                        workflow = %candidate.name,
                        input = %name,
                        object_type = object_type,
                        "Omitting unresolved optional input"
                    );
                }
                None => {
                    return Err(SchedulerError::UnresolvedInput {
                        workflow: candidate.name.clone(),
                        input: name.clone(),
                        object_type: object_type.to_string(),
                    });
                }
            }
        } else {
            let resolved = text
                .replace("{wasInformedBy}", was_informed_by)
                .replace("{activityId}", activity_id);
            inputs.insert(name.clone(), Value::String(resolved));
        }
    }

    Ok((inputs, referenced))
}
