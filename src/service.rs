//! Collaborator-facing facade.
//!
//! `Service` is the entire surface a thin HTTP dispatcher needs: one method
//! per REST endpoint, each already mapped from/to the wire JSON shapes in
//! [`crate::wire`]. Binding a socket and routing a method+path to one of
//! these calls is explicitly out of scope for this crate — that belongs to
//! the collaborator.

use tracing::instrument;

use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::error::Error;
use crate::jobs;
use crate::wire::dataset::Dataset;
use crate::wire::job::Job;
use crate::wire::query::{QueryRequest, QueryResponse};
use crate::wire::table::Table;
use crate::wire::tabledata::{InsertAllRequest, InsertAllResponse};

/// The emulator's whole API surface, independent of any transport.
pub struct Service {
    store: CatalogStore,
}

impl Service {
    /// Opens the catalog at `config.data_dir` and attaches the default and
    /// internal projects.
    pub fn open(config: Config) -> Result<Self, Error> {
        let store = CatalogStore::open(config)?;
        store.discover_and_attach_projects()?;
        Ok(Self { store })
    }

    pub fn config(&self) -> &Config {
        self.store.config()
    }

    // -- datasets ---------------------------------------------------------

    #[instrument(skip(self))]
    pub fn list_datasets(&self, project: &str) -> Result<Vec<Dataset>, Error> {
        Ok(self.store.list_datasets(project)?)
    }

    #[instrument(skip(self, dataset))]
    pub fn insert_dataset(&self, project: &str, dataset_id: &str, dataset: Dataset) -> Result<Dataset, Error> {
        Ok(self.store.create_dataset(project, dataset_id, dataset)?)
    }

    pub fn get_dataset(&self, project: &str, dataset_id: &str) -> Result<Dataset, Error> {
        self.store
            .get_dataset(project, dataset_id)?
            .ok_or_else(|| Error::NotFound(format!("dataset {dataset_id}")))
    }

    #[instrument(skip(self, patch))]
    pub fn patch_dataset(&self, project: &str, dataset_id: &str, patch: Dataset) -> Result<Dataset, Error> {
        Ok(self.store.patch_dataset(project, dataset_id, patch)?)
    }

    #[instrument(skip(self, dataset))]
    pub fn update_dataset(&self, project: &str, dataset_id: &str, dataset: Dataset) -> Result<Dataset, Error> {
        Ok(self.store.update_dataset(project, dataset_id, dataset)?)
    }

    #[instrument(skip(self))]
    pub fn delete_dataset(&self, project: &str, dataset_id: &str) -> Result<(), Error> {
        Ok(self.store.delete_dataset(project, dataset_id)?)
    }

    // -- tables -------------------------------------------------------------

    pub fn list_tables(&self, project: &str, dataset_id: &str) -> Result<Vec<Table>, Error> {
        Ok(self.store.list_tables(project, dataset_id)?)
    }

    #[instrument(skip(self, table))]
    pub fn insert_table(&self, project: &str, dataset_id: &str, table_id: &str, table: Table) -> Result<Table, Error> {
        Ok(self.store.create_table(project, dataset_id, table_id, table)?)
    }

    pub fn get_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<Table, Error> {
        self.store
            .get_table(project, dataset_id, table_id)?
            .ok_or_else(|| Error::NotFound(format!("table {table_id}")))
    }

    #[instrument(skip(self))]
    pub fn delete_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<(), Error> {
        Ok(self.store.delete_table(project, dataset_id, table_id)?)
    }

    #[instrument(skip(self, request))]
    pub fn insert_all(
        &self,
        project: &str,
        dataset_id: &str,
        table_id: &str,
        request: InsertAllRequest,
    ) -> Result<InsertAllResponse, Error> {
        Ok(self.store.insert_all(project, dataset_id, table_id, request)?)
    }

    // -- jobs -----------------------------------------------------------

    #[instrument(skip(self, job))]
    pub fn insert_job(&self, project: &str, job: Job) -> Result<Job, Error> {
        let job_id = Some(job.job_reference.job_id.clone()).filter(|id| !id.is_empty());
        let config = job
            .configuration
            .query
            .ok_or_else(|| Error::NotImplemented("non-query job configuration".to_string()))?;
        jobs::submit_query(&self.store, project, job_id, config)
    }

    pub fn get_job(&self, project: &str, job_id: &str) -> Result<Job, Error> {
        jobs::get_job(&self.store, project, job_id)?.ok_or_else(|| Error::NotFound(format!("job {job_id}")))
    }

    pub fn list_jobs(&self, project: &str) -> Result<Vec<Job>, Error> {
        jobs::list_jobs(&self.store, project)
    }

    pub fn cancel_job(&self, project: &str, job_id: &str) -> Result<Job, Error> {
        jobs::cancel_job(&self.store, project, job_id)
    }

    pub fn delete_job(&self, project: &str, job_id: &str) -> Result<(), Error> {
        jobs::delete_job(&self.store, project, job_id)
    }

    pub fn get_query_results(&self, project: &str, job_id: &str) -> Result<QueryResponse, Error> {
        jobs::get_query_results(&self.store, project, job_id)
    }

    // -- synchronous queries ----------------------------------------------

    /// The `jobs.query` shortcut: runs and returns the result
    /// without requiring a follow-up `getQueryResults` call, but still
    /// leaves a job behind for one.
    #[instrument(skip(self, request))]
    pub fn query(&self, project: &str, request: QueryRequest) -> Result<QueryResponse, Error> {
        jobs::run_query(&self.store, project, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::job::{JobConfiguration, JobConfigurationQuery, JobStatus};
    use crate::wire::JobReference;
    use tempfile::tempdir;

    fn service() -> (Service, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        (Service::open(config).unwrap(), dir)
    }

    #[test]
    fn query_round_trips_a_literal_select() {
        let (service, _dir) = service();
        let response = service
            .query(
                "default",
                QueryRequest {
                    query: "SELECT 1 AS a".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(response.total_rows, Some(1));
        assert!(response.job_complete);
    }

    #[test]
    fn insert_job_persists_a_retrievable_job() {
        let (service, _dir) = service();
        let job = Job {
            job_reference: JobReference {
                project_id: "default".to_string(),
                job_id: "my-job".to_string(),
                location: None,
            },
            configuration: JobConfiguration::for_query(JobConfigurationQuery {
                query: "SELECT 1".to_string(),
                ..Default::default()
            }),
            status: JobStatus::default(),
            ..Default::default()
        };
        service.insert_job("default", job).unwrap();
        let fetched = service.get_job("default", "my-job").unwrap();
        assert_eq!(fetched.job_reference.job_id, "my-job");
    }

    #[test]
    fn get_dataset_reports_not_found_for_unknown_dataset() {
        let (service, _dir) = service();
        let err = service.get_dataset("default", "nope").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
