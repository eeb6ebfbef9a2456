//! Document store backed by the remote service's query endpoint.
//!
//! Every trait call becomes a Mongo-style find/insert command posted to
//! `/queries:run`; the service owns the actual query engine.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::StoreError;
use crate::records::{DataObject, ProcessRecord};
use crate::remote::RuntimeApi;
use crate::scheduler::job::JobRecord;

use super::{DocumentStore, DATA_OBJECT_COLLECTION, JOBS_COLLECTION};

pub struct ApiStore {
    runtime: Arc<dyn RuntimeApi>,
}

impl ApiStore {
    pub fn new(runtime: Arc<dyn RuntimeApi>) -> Self {
        Self { runtime }
    }

    async fn find(&self, collection: &str, filter: Value) -> Result<Vec<Value>, StoreError> {
        let command = json!({ "find": collection, "filter": filter });
        let response = self.runtime.run_query(command).await?;
        let batch = response
            .pointer("/cursor/firstBatch")
            .or_else(|| response.pointer("/cursor/batch"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(batch)
    }

    async fn insert(&self, collection: &str, documents: Vec<Value>) -> Result<(), StoreError> {
        let command = json!({ "insert": collection, "documents": documents });
        self.runtime.run_query(command).await?;
        Ok(())
    }

    fn parse_all<T: serde::de::DeserializeOwned>(
        documents: Vec<Value>,
    ) -> Result<Vec<T>, StoreError> {
        documents
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for ApiStore {
    async fn data_objects_by_type(&self, types: &[String]) -> Result<Vec<DataObject>, StoreError> {
        let documents = self
            .find(
                DATA_OBJECT_COLLECTION,
                json!({ "data_object_type": { "$in": types } }),
            )
            .await?;
        Self::parse_all(documents)
    }

    async fn generation_records(
        &self,
        collection: &str,
        analyte_category: &str,
        allowlist: Option<&HashSet<String>>,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let mut filter = json!({ "analyte_category": analyte_category });
        if let Some(ids) = allowlist {
            let ids: Vec<&String> = ids.iter().collect();
            filter["id"] = json!({ "$in": ids });
        }
        let documents = self.find(collection, filter).await?;
        Self::parse_all(documents)
    }

    async fn execution_records(
        &self,
        collection: &str,
        git_url: &str,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let documents = self.find(collection, json!({ "git_url": git_url })).await?;
        Self::parse_all(documents)
    }

    async fn execution_records_for_lineage(
        &self,
        collection: &str,
        type_tag: &str,
        roots: &HashSet<String>,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let mut roots: Vec<&String> = roots.iter().collect();
        roots.sort();
        let documents = self
            .find(
                collection,
                json!({ "type": type_tag, "was_informed_by": { "$in": roots } }),
            )
            .await?;
        Self::parse_all(documents)
    }

    async fn execution_ids_informed_by(
        &self,
        collection: &str,
        type_tag: &str,
        was_informed_by: &str,
    ) -> Result<Vec<String>, StoreError> {
        let documents = self
            .find(
                collection,
                json!({ "type": type_tag, "was_informed_by": was_informed_by }),
            )
            .await?;
        let mut ids: Vec<String> = documents
            .iter()
            .filter_map(|doc| doc.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn jobs_for_workflow(
        &self,
        git_repo: &str,
        release: &str,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let documents = self
            .find(
                JOBS_COLLECTION,
                json!({ "config.git_repo": git_repo, "config.release": release }),
            )
            .await?;
        Self::parse_all(documents)
    }

    async fn unclaimed_jobs(
        &self,
        workflow_ids: &HashSet<String>,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let ids: Vec<&String> = workflow_ids.iter().collect();
        let documents = self
            .find(
                JOBS_COLLECTION,
                json!({ "claims": { "$size": 0 }, "workflow.id": { "$in": ids } }),
            )
            .await?;
        Self::parse_all(documents)
    }

    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.insert(JOBS_COLLECTION, vec![serde_json::to_value(job)?])
            .await
    }

    async fn insert_data_objects(&self, objects: &[DataObject]) -> Result<(), StoreError> {
        let documents = objects
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.insert(DATA_OBJECT_COLLECTION, documents).await
    }

    async fn insert_execution_record(
        &self,
        collection: &str,
        record: &ProcessRecord,
    ) -> Result<(), StoreError> {
        self.insert(collection, vec![serde_json::to_value(record)?])
            .await
    }
}
