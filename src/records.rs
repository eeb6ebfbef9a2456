//! Store document types shared across the graph builder, scheduler, and
//! lifecycle manager.
//!
//! Raw processing records are distinguished by a `type` string. Typing is
//! resolved through a closed registry built from the loaded workflow
//! definitions; a tag matching no definition is an explicit error rather
//! than a silently ignored document.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigSet, WorkflowConfig};
use crate::error::GraphError;

/// An immutable data object minted into the store. Referenced by id from
/// processing records' `has_input`/`has_output`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub md5_checksum: String,
    #[serde(default)]
    pub file_size_bytes: u64,
    #[serde(default)]
    pub data_object_type: String,
}

/// Whether a record documents raw data generation or a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Generation,
    Execution,
}

/// One processing record as stored: either a data-generation record or a
/// workflow-execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub has_input: Vec<String>,
    #[serde(default)]
    pub has_output: Vec<String>,
    /// Root lineage key. Absent on generation records (their own id is the
    /// root).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_informed_by: Option<String>,
    /// Present on generation records only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyte_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_resource: Option<String>,
}

/// Closed mapping from record type tag to the workflow definition that
/// produces it. Built from configuration, so the set of known tags tracks
/// the deployed pipeline definitions.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    by_tag: HashMap<String, (RecordKind, Arc<WorkflowConfig>)>,
}

impl TypeRegistry {
    pub fn from_configs(configs: &ConfigSet) -> Self {
        let mut by_tag = HashMap::new();
        for config in configs.iter() {
            if config.type_tag.is_empty() {
                continue;
            }
            let kind = if config.is_generation() {
                RecordKind::Generation
            } else {
                RecordKind::Execution
            };
            by_tag.insert(config.type_tag.clone(), (kind, config.clone()));
        }
        Self { by_tag }
    }

    /// Resolves a record's type tag, or fails with `UnknownRecordType`.
    pub fn classify(
        &self,
        record: &ProcessRecord,
    ) -> Result<(RecordKind, Arc<WorkflowConfig>), GraphError> {
        self.by_tag
            .get(&record.type_tag)
            .cloned()
            .ok_or_else(|| GraphError::UnknownRecordType {
                id: record.id.clone(),
                type_tag: record.type_tag.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_configs;

    fn registry() -> TypeRegistry {
        let configs = load_configs(
            r#"
workflows:
  - name: Sequencing
    collection: data_generation_set
    type: "nmdc:NucleotideSequencing"
    analyte_category: metagenome
  - name: Reads QC
    collection: workflow_execution_set
    type: "nmdc:ReadQcAnalysis"
    predecessors: [Sequencing]
"#,
        )
        .unwrap();
        TypeRegistry::from_configs(&configs)
    }

    fn record(type_tag: &str) -> ProcessRecord {
        ProcessRecord {
            id: "nmdc:rec-1".to_string(),
            type_tag: type_tag.to_string(),
            name: String::new(),
            has_input: vec![],
            has_output: vec![],
            was_informed_by: None,
            analyte_category: None,
            version: None,
            git_url: None,
            started_at_time: None,
            ended_at_time: None,
            execution_resource: None,
        }
    }

    #[test]
    fn test_classify_generation_and_execution() {
        let registry = registry();
        let (kind, config) = registry
            .classify(&record("nmdc:NucleotideSequencing"))
            .unwrap();
        assert_eq!(kind, RecordKind::Generation);
        assert_eq!(config.name, "Sequencing");

        let (kind, config) = registry.classify(&record("nmdc:ReadQcAnalysis")).unwrap();
        assert_eq!(kind, RecordKind::Execution);
        assert_eq!(config.name, "Reads QC");
    }

    #[test]
    fn test_unknown_tag_is_explicit_error() {
        let registry = registry();
        let err = registry.classify(&record("nmdc:Mystery")).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnknownRecordType { type_tag, .. } if type_tag == "nmdc:Mystery"
        ));
    }

    #[test]
    fn test_data_object_wire_shape() {
        let json = r#"{
            "id": "nmdc:dobj-1",
            "name": "reads.fastq.gz",
            "url": "https://data.example.org/reads.fastq.gz",
            "md5_checksum": "abc123",
            "file_size_bytes": 1024,
            "data_object_type": "Metagenome Raw Reads"
        }"#;
        let obj: DataObject = serde_json::from_str(json).unwrap();
        assert_eq!(obj.id, "nmdc:dobj-1");
        assert_eq!(obj.file_size_bytes, 1024);
        assert_eq!(obj.data_object_type, "Metagenome Raw Reads");
    }
}
