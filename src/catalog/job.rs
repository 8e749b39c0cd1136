//! Job and query-result bookkeeping,
//! layered on the generic payload CRUD in [`super::metadata`].

use tracing::instrument;

use super::{metadata, CatalogStore, Error};

pub type JobRecord = crate::wire::job::Job;
pub type QueryResultRecord = crate::wire::query::QueryResponse;

impl CatalogStore {
    #[instrument(skip(self, job))]
    pub fn create_job(&self, project: &str, job: JobRecord) -> Result<JobRecord, Error> {
        let job_id = job.job_reference.job_id.clone();
        if metadata::get_job(self, project, &job_id)?.is_some() {
            return Err(Error::Engine(format!("job {job_id} already exists")));
        }
        metadata::put_job(self, project, &job_id, &job)?;
        Ok(job)
    }

    pub fn get_job(&self, project: &str, job_id: &str) -> Result<Option<JobRecord>, Error> {
        metadata::get_job(self, project, job_id)
    }

    pub fn list_jobs(&self, project: &str) -> Result<Vec<JobRecord>, Error> {
        metadata::list_jobs(self, project)
    }

    #[instrument(skip(self))]
    pub fn delete_job(&self, project: &str, job_id: &str) -> Result<(), Error> {
        if metadata::get_job(self, project, job_id)?.is_none() {
            return Err(Error::Engine(format!("job {job_id} does not exist")));
        }
        metadata::delete_job(self, project, job_id)?;
        metadata::delete_query_result(self, project, job_id)?;
        Ok(())
    }

    pub fn get_query_result(&self, project: &str, job_id: &str) -> Result<Option<QueryResultRecord>, Error> {
        metadata::get_query_result(self, project, job_id)
    }

    pub fn put_query_result(&self, project: &str, job_id: &str, result: &QueryResultRecord) -> Result<(), Error> {
        metadata::put_query_result(self, project, job_id, result)
    }
}
