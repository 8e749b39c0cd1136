//! The job manager.
//!
//! Implements the async job protocol as a synchronous completion: every
//! submitted query job runs to `DONE` before `submit`/`run_query` returns
//!. Cancellation is a no-op
//! passthrough for the same reason — there is never a running job to stop.

use tracing::instrument;
use uuid::Uuid;

use crate::catalog::{now_epoch_seconds, CatalogStore, JobRecord, QueryResultRecord};
use crate::executor;
use crate::wire::job::{
    BiEngineStatistics, Job, JobConfiguration, JobConfigurationQuery, JobState, JobStatistics,
    JobStatisticsQuery, JobStatus, SessionInfo,
};
use crate::wire::query::{QueryRequest, QueryResponse};
use crate::wire::JobReference;
use crate::Error;

/// Submits a `jobs.insert` query job, running it to completion before
/// returning. The configuration's own `jobReference.jobId` is honored when
/// present; otherwise one is generated.
#[instrument(skip(store, config))]
pub fn submit_query(store: &CatalogStore, project: &str, job_id: Option<String>, config: JobConfigurationQuery) -> Result<Job, Error> {
    let job_id = job_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let default_dataset = config.default_dataset.as_ref().map(|r| r.dataset_id.clone());

    let (job, result) = run_and_persist(store, project, &job_id, &config, default_dataset.as_deref())?;
    store.put_query_result(project, &job_id, &result)?;
    let job = store.create_job(project, job)?;
    Ok(job)
}

/// Runs the synchronous `queries` shortcut: like [`submit_query`], but
/// returns the [`QueryResponse`] directly rather than the wrapping [`Job`].
/// Still creates and persists a job record, since `jobs.getQueryResults`
/// must be able to find it afterward.
#[instrument(skip(store, request))]
pub fn run_query(store: &CatalogStore, project: &str, request: QueryRequest) -> Result<QueryResponse, Error> {
    let job_id = Uuid::new_v4().to_string();
    let config = JobConfigurationQuery {
        query: request.query,
        query_parameters: request.query_parameters,
        default_dataset: request.default_dataset.clone(),
        ..Default::default()
    };
    let default_dataset = request.default_dataset.map(|r| r.dataset_id);

    if request.dry_run {
        return dry_run(store, project, &job_id, &config, default_dataset.as_deref());
    }

    let (job, result) = run_and_persist(store, project, &job_id, &config, default_dataset.as_deref())?;
    store.put_query_result(project, &job_id, &result)?;
    store.create_job(project, job)?;
    Ok(result)
}

fn run_and_persist(
    store: &CatalogStore,
    project: &str,
    job_id: &str,
    config: &JobConfigurationQuery,
    default_dataset: Option<&str>,
) -> Result<(JobRecord, QueryResultRecord), Error> {
    let statement_type = crate::wire::job::detect_statement_type(&JobConfiguration::for_query(config.clone()));
    let start = now_epoch_seconds();
    let execution = executor::execute(
        store,
        project,
        default_dataset,
        &config.query,
        config.query_parameters.as_deref().unwrap_or(&[]),
    )?;
    let end = now_epoch_seconds();

    let job_reference = JobReference {
        project_id: project.to_string(),
        job_id: job_id.to_string(),
        location: None,
    };
    let total_rows = execution.total_rows;
    let job = Job {
        kind: "bigquery#job".to_string(),
        etag: String::new(),
        id: Some(format!("{project}:{job_id}")),
        self_link: None,
        job_reference: job_reference.clone(),
        configuration: JobConfiguration::for_query(config.clone()),
        status: JobStatus::done(),
        statistics: Some(JobStatistics {
            creation_time: Some(start),
            start_time: Some(start),
            end_time: Some(end),
            query: Some(JobStatisticsQuery {
                statement_type: statement_type.map(str::to_string),
                total_bytes_processed: Some(0),
                total_bytes_billed: Some(0),
                cache_hit: Some(false),
                bi_engine_statistics: Some(BiEngineStatistics::disabled()),
                dml_stats: execution.dml_stats.clone(),
            }),
            session_info: Some(SessionInfo { session_id: Uuid::new_v4().to_string() }),
        }),
        user_email: None,
    };

    let result = QueryResponse {
        kind: "bigquery#queryResponse".to_string(),
        schema_: Some(execution.schema),
        job_reference,
        total_rows: Some(total_rows),
        page_token: None,
        rows: Some(execution.rows),
        total_bytes_processed: Some(0),
        job_complete: true,
        errors: Vec::new(),
        cache_hit: Some(false),
    };

    Ok((job, result))
}

/// Validates `config.query` without executing it, per the `dryRun` flag.
/// Neither a job nor a query result is persisted.
fn dry_run(
    store: &CatalogStore,
    project: &str,
    job_id: &str,
    config: &JobConfigurationQuery,
    default_dataset: Option<&str>,
) -> Result<QueryResponse, Error> {
    let dataset = default_dataset.unwrap_or(&store.config().default_dataset_id).to_string();
    let parameter_names: Vec<String> = config
        .query_parameters
        .as_deref()
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .map(|(i, p)| p.name.clone().unwrap_or_else(|| format!("param{i}")))
        .collect();
    let ctx = crate::translate::TranslateContext {
        default_project: Some(project),
        default_dataset: Some(&dataset),
        federation_connection_id: &store.config().federation_connection_id,
        parameter_names: &parameter_names,
        catalog: store,
    };
    crate::translate::translate(&config.query, &ctx)?;

    Ok(QueryResponse {
        kind: "bigquery#queryResponse".to_string(),
        schema_: None,
        job_reference: JobReference {
            project_id: project.to_string(),
            job_id: job_id.to_string(),
            location: None,
        },
        total_rows: Some(0),
        page_token: None,
        rows: None,
        total_bytes_processed: Some(0),
        job_complete: true,
        errors: Vec::new(),
        cache_hit: Some(false),
    })
}

pub fn get_job(store: &CatalogStore, project: &str, job_id: &str) -> Result<Option<Job>, Error> {
    Ok(store.get_job(project, job_id)?)
}

pub fn list_jobs(store: &CatalogStore, project: &str) -> Result<Vec<Job>, Error> {
    Ok(store.list_jobs(project)?)
}

pub fn delete_job(store: &CatalogStore, project: &str, job_id: &str) -> Result<(), Error> {
    store.delete_job(project, job_id)?;
    Ok(())
}

/// No-op: every job this emulator runs has already completed synchronously
/// by the time a client could ask to cancel it.
pub fn cancel_job(store: &CatalogStore, project: &str, job_id: &str) -> Result<Job, Error> {
    store
        .get_job(project, job_id)?
        .ok_or_else(|| Error::NotFound(format!("job {job_id}")))
}

pub fn get_query_results(store: &CatalogStore, project: &str, job_id: &str) -> Result<QueryResponse, Error> {
    store
        .get_query_result(project, job_id)?
        .ok_or_else(|| Error::NotFound(format!("query results for job {job_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    fn store() -> (CatalogStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        (CatalogStore::open(config).unwrap(), dir)
    }

    #[test]
    fn submit_query_runs_to_done_synchronously() {
        let (store, _dir) = store();
        let config = JobConfigurationQuery {
            query: "SELECT 1 AS a".to_string(),
            ..Default::default()
        };
        let job = submit_query(&store, "default", None, config).unwrap();
        assert_eq!(job.status.state, JobState::Done);
    }

    #[test]
    fn get_query_results_returns_persisted_rows() {
        let (store, _dir) = store();
        let config = JobConfigurationQuery {
            query: "SELECT 1 AS a".to_string(),
            ..Default::default()
        };
        let job = submit_query(&store, "default", Some("job1".to_string()), config).unwrap();
        let job_id = job.job_reference.job_id.clone();
        let result = get_query_results(&store, "default", &job_id).unwrap();
        assert_eq!(result.total_rows, Some(1));
    }

    #[test]
    fn cancel_job_is_a_passthrough_on_a_done_job() {
        let (store, _dir) = store();
        let config = JobConfigurationQuery {
            query: "SELECT 1".to_string(),
            ..Default::default()
        };
        let job = submit_query(&store, "default", Some("job2".to_string()), config).unwrap();
        let cancelled = cancel_job(&store, "default", &job.job_reference.job_id).unwrap();
        assert_eq!(cancelled.status.state, JobState::Done);
    }
}
