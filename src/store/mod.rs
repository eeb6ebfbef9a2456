//! Document store access.
//!
//! The store itself is an external collaborator; this crate only issues the
//! filtered reads and inserts the scheduler and lifecycle manager need.
//! `DocumentStore` is the seam: `MemStore` backs tests and dry runs,
//! `ApiStore` routes every call through the remote metadata service's
//! query endpoint.

mod memory;
mod remote;

pub use memory::MemStore;
pub use remote::ApiStore;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::records::{DataObject, ProcessRecord};
use crate::scheduler::job::JobRecord;

/// Collection holding data objects.
pub const DATA_OBJECT_COLLECTION: &str = "data_object_set";

/// Collection holding job records.
pub const JOBS_COLLECTION: &str = "jobs";

/// Filtered reads and inserts against the shared document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Data objects whose `data_object_type` is in `types`, across the
    /// whole data object collection. Fetching by type keeps the working
    /// set small; the full collection can be very large.
    async fn data_objects_by_type(&self, types: &[String]) -> Result<Vec<DataObject>, StoreError>;

    /// Data-generation records in `collection` matching `analyte_category`,
    /// optionally restricted to an id allowlist.
    async fn generation_records(
        &self,
        collection: &str,
        analyte_category: &str,
        allowlist: Option<&HashSet<String>>,
    ) -> Result<Vec<ProcessRecord>, StoreError>;

    /// Workflow-execution records in `collection` produced from `git_url`.
    async fn execution_records(
        &self,
        collection: &str,
        git_url: &str,
    ) -> Result<Vec<ProcessRecord>, StoreError>;

    /// Ids of records of `type_tag` in `collection` sharing a lineage key,
    /// sorted ascending. Drives the activity-id iteration count.
    /// Execution records whose lineage key is in the given root set,
    /// regardless of repository URL. Used when the build is restricted to
    /// an id allowlist.
    async fn execution_records_for_lineage(
        &self,
        collection: &str,
        type_tag: &str,
        roots: &HashSet<String>,
    ) -> Result<Vec<ProcessRecord>, StoreError>;

    async fn execution_ids_informed_by(
        &self,
        collection: &str,
        type_tag: &str,
        was_informed_by: &str,
    ) -> Result<Vec<String>, StoreError>;

    /// Jobs whose captured config matches a (git repo, release) pair.
    async fn jobs_for_workflow(
        &self,
        git_repo: &str,
        release: &str,
    ) -> Result<Vec<JobRecord>, StoreError>;

    /// Jobs with no claims whose `workflow.id` is in the allowed set.
    async fn unclaimed_jobs(
        &self,
        workflow_ids: &HashSet<String>,
    ) -> Result<Vec<JobRecord>, StoreError>;

    async fn insert_job(&self, job: &JobRecord) -> Result<(), StoreError>;

    async fn insert_data_objects(&self, objects: &[DataObject]) -> Result<(), StoreError>;

    async fn insert_execution_record(
        &self,
        collection: &str,
        record: &ProcessRecord,
    ) -> Result<(), StoreError>;
}
