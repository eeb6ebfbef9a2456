//! In-memory document store for tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::records::{DataObject, ProcessRecord};
use crate::scheduler::job::JobRecord;

use super::DocumentStore;

#[derive(Default)]
struct MemInner {
    data_objects: Vec<DataObject>,
    records: HashMap<String, Vec<ProcessRecord>>,
    jobs: Vec<JobRecord>,
}

/// HashMap-of-collections store. Mutated through the same trait surface the
/// remote store exposes, plus seeding helpers for tests.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemInner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_data_object(&self, object: DataObject) {
        self.inner.lock().unwrap().data_objects.push(object);
    }

    pub fn add_record(&self, collection: &str, record: ProcessRecord) {
        self.inner
            .lock()
            .unwrap()
            .records
            .entry(collection.to_string())
            .or_default()
            .push(record);
    }

    pub fn add_job(&self, job: JobRecord) {
        self.inner.lock().unwrap().jobs.push(job);
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        self.inner.lock().unwrap().jobs.clone()
    }

    pub fn records_in(&self, collection: &str) -> Vec<ProcessRecord> {
        self.inner
            .lock()
            .unwrap()
            .records
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn data_objects(&self) -> Vec<DataObject> {
        self.inner.lock().unwrap().data_objects.clone()
    }

    /// Marks a job claimed, mirroring the remote claim endpoint's effect.
    pub fn set_claim(&self, job_id: &str, op_id: &str, site_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        for job in &mut inner.jobs {
            if job.id == job_id {
                job.claims.push(crate::scheduler::job::JobClaim {
                    op_id: op_id.to_string(),
                    site_id: site_id.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl DocumentStore for MemStore {
    async fn data_objects_by_type(&self, types: &[String]) -> Result<Vec<DataObject>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .data_objects
            .iter()
            .filter(|o| types.contains(&o.data_object_type))
            .cloned()
            .collect())
    }

    async fn generation_records(
        &self,
        collection: &str,
        analyte_category: &str,
        allowlist: Option<&HashSet<String>>,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let records = inner.records.get(collection).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| r.analyte_category.as_deref() == Some(analyte_category))
            .filter(|r| allowlist.is_none_or(|ids| ids.contains(&r.id)))
            .collect())
    }

    async fn execution_records(
        &self,
        collection: &str,
        git_url: &str,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let records = inner.records.get(collection).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| r.git_url.as_deref() == Some(git_url))
            .collect())
    }

    async fn execution_records_for_lineage(
        &self,
        collection: &str,
        type_tag: &str,
        roots: &HashSet<String>,
    ) -> Result<Vec<ProcessRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let records = inner.records.get(collection).cloned().unwrap_or_default();
        Ok(records
            .into_iter()
            .filter(|r| r.type_tag == type_tag)
            .filter(|r| {
                r.was_informed_by
                    .as_ref()
                    .is_some_and(|root| roots.contains(root))
            })
            .collect())
    }

    async fn execution_ids_informed_by(
        &self,
        collection: &str,
        type_tag: &str,
        was_informed_by: &str,
    ) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut ids: Vec<String> = inner
            .records
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.type_tag == type_tag)
                    .filter(|r| r.was_informed_by.as_deref() == Some(was_informed_by))
                    .map(|r| r.id.clone())
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        Ok(ids)
    }

    async fn jobs_for_workflow(
        &self,
        git_repo: &str,
        release: &str,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.config.git_repo == git_repo && j.config.release == release)
            .cloned()
            .collect())
    }

    async fn unclaimed_jobs(
        &self,
        workflow_ids: &HashSet<String>,
    ) -> Result<Vec<JobRecord>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .jobs
            .iter()
            .filter(|j| j.claims.is_empty() && workflow_ids.contains(&j.workflow.id))
            .cloned()
            .collect())
    }

    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError> {
        self.inner.lock().unwrap().jobs.push(job.clone());
        Ok(())
    }

    async fn insert_data_objects(&self, objects: &[DataObject]) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .data_objects
            .extend_from_slice(objects);
        Ok(())
    }

    async fn insert_execution_record(
        &self,
        collection: &str,
        record: &ProcessRecord,
    ) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .records
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}
