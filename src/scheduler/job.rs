//! Job record types persisted in the store's `jobs` collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::records::DataObject;

/// An exclusive, remotely-arbitrated reservation of a job by one site
/// agent. At most one non-empty claim exists at steady state; the remote
/// service rejects concurrent claim attempts with a conflict.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobClaim {
    pub op_id: String,
    pub site_id: String,
}

/// Reference to the workflow definition a job instantiates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobWorkflowRef {
    /// "<name>: <version>" of the workflow definition.
    pub id: String,
}

/// One declared output of a job, with its data object id minted up front
/// so the eventual output record can reference it before the file exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutput {
    /// Output key in the engine's result map.
    pub output: String,
    pub data_object_type: String,
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Captured execution configuration of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct JobConfig {
    pub git_repo: String,
    pub release: String,
    pub wdl: String,
    /// Schema type tag of the execution record this job will produce.
    pub workflow_type: String,
    /// Minted workflow-execution id ("root.iteration").
    pub activity_id: String,
    /// Collection the finished execution record is inserted into.
    pub activity_set: String,
    pub was_informed_by: String,
    /// Id of the node whose existence caused this job to be created.
    pub trigger_activity: String,
    pub iteration: u32,
    pub input_prefix: String,
    /// Resolved input parameter values.
    pub inputs: Map<String, Value>,
    /// Data objects resolved for typed input references.
    #[serde(default)]
    pub input_data_objects: Vec<DataObject>,
    #[serde(default)]
    pub outputs: Vec<JobOutput>,
}

/// A job record: one owed pipeline stage run, claimable by site agents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub workflow: JobWorkflowRef,
    pub created_at: DateTime<Utc>,
    pub config: JobConfig,
    /// Empty until a site agent claims the job.
    #[serde(default)]
    pub claims: Vec<JobClaim>,
}

impl JobRecord {
    pub fn is_claimed(&self) -> bool {
        !self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_record_wire_shape() {
        let json = r#"{
            "id": "nmdc:job-123",
            "workflow": { "id": "Reads QC: v1.0.14" },
            "created_at": "2026-01-05T10:00:00Z",
            "config": {
                "git_repo": "https://example.org/readsqc",
                "release": "v1.0.14",
                "wdl": "rqcfilter.wdl",
                "workflow_type": "nmdc:ReadQcAnalysis",
                "activity_id": "nmdc:wfrqc-1.1",
                "activity_set": "workflow_execution_set",
                "was_informed_by": "nmdc:omprc-1",
                "trigger_activity": "nmdc:omprc-1",
                "iteration": 1,
                "input_prefix": "rqc",
                "inputs": { "input_files": "https://data.example.org/raw" }
            }
        }"#;
        let job: JobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(job.workflow.id, "Reads QC: v1.0.14");
        assert_eq!(job.config.iteration, 1);
        assert!(!job.is_claimed());
        assert!(job.config.outputs.is_empty());
    }

    #[test]
    fn test_claims_roundtrip() {
        let mut job: JobRecord = serde_json::from_value(serde_json::json!({
            "id": "nmdc:job-1",
            "workflow": { "id": "Reads QC: v1.0.14" },
            "created_at": "2026-01-05T10:00:00Z",
            "config": JobConfig::default(),
        }))
        .unwrap();
        job.claims.push(JobClaim {
            op_id: "nmdc:op-1".to_string(),
            site_id: "site-a".to_string(),
        });

        let value = serde_json::to_value(&job).unwrap();
        let parsed: JobRecord = serde_json::from_value(value).unwrap();
        assert!(parsed.is_claimed());
        assert_eq!(parsed.claims[0].op_id, "nmdc:op-1");
    }
}
