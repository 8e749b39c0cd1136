//! Internal metadata tables: `datasets`, `jobs`,
//! `query_results`, plus reserved `tables`/`models`/`routines` stubs. Each
//! row is `(project, ...key..., payload json)`; the payload is the wire
//! entity serialized as JSON text, keeping the metadata catalog
//! schema-light so new wire fields don't require a migration.

use serde::{de::DeserializeOwned, Serialize};

use super::{quote_ident, CatalogStore, Error};
use crate::wire::dataset::Dataset;
use crate::wire::job::Job;
use crate::wire::query::QueryResponse;
use crate::wire::table::Table;

pub(super) fn create_metadata_tables(store: &CatalogStore) -> Result<(), Error> {
    let internal = quote_ident(&store.config().internal_project_id);
    let dataset = quote_ident(&store.config().internal_dataset_id);
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.datasets (
            project VARCHAR NOT NULL, dataset_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, dataset_id)
        );
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.tables (
            project VARCHAR NOT NULL, dataset_id VARCHAR NOT NULL, table_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, dataset_id, table_id)
        );
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.jobs (
            project VARCHAR NOT NULL, job_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, job_id)
        );
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.query_results (
            project VARCHAR NOT NULL, job_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, job_id)
        );
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.models (
            project VARCHAR NOT NULL, dataset_id VARCHAR NOT NULL, model_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, dataset_id, model_id)
        );
        CREATE TABLE IF NOT EXISTS {internal}.{dataset}.routines (
            project VARCHAR NOT NULL, dataset_id VARCHAR NOT NULL, routine_id VARCHAR NOT NULL, payload JSON NOT NULL,
            PRIMARY KEY (project, dataset_id, routine_id)
        );
        "#
    );
    store.with_connection(|conn| conn.execute_batch(&ddl).map_err(Error::from))
}

fn internal_table(store: &CatalogStore, name: &str) -> String {
    format!(
        "{}.{}.{}",
        quote_ident(&store.config().internal_project_id),
        quote_ident(&store.config().internal_dataset_id),
        name
    )
}

fn get_payload<T: DeserializeOwned>(store: &CatalogStore, table: &str, key_cols: &[&str], key_vals: &[&str]) -> Result<Option<T>, Error> {
    let qualified = internal_table(store, table);
    let predicate = key_cols
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("SELECT payload FROM {qualified} WHERE {predicate}");
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let params = duckdb::params_from_iter(key_vals.iter());
        let mut rows = stmt.query(params)?;
        if let Some(row) = rows.next()? {
            let payload: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&payload)?))
        } else {
            Ok(None)
        }
    })
}

fn put_payload<T: Serialize>(
    store: &CatalogStore,
    table: &str,
    key_cols: &[&str],
    key_vals: &[&str],
    value: &T,
) -> Result<(), Error> {
    let qualified = internal_table(store, table);
    let payload = serde_json::to_string(value)?;
    let all_cols = key_cols.iter().chain(std::iter::once(&"payload")).copied().collect::<Vec<_>>();
    let placeholders = all_cols.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
    let sql = format!(
        "INSERT INTO {qualified} ({}) VALUES ({placeholders}) ON CONFLICT ({}) DO UPDATE SET payload = EXCLUDED.payload",
        all_cols.join(", "),
        key_cols.join(", "),
    );
    let mut all_vals: Vec<&str> = key_vals.to_vec();
    all_vals.push(&payload);
    store.with_connection(|conn| {
        conn.execute(&sql, duckdb::params_from_iter(all_vals.iter()))?;
        Ok(())
    })
}

fn delete_payload(store: &CatalogStore, table: &str, key_cols: &[&str], key_vals: &[&str]) -> Result<(), Error> {
    let qualified = internal_table(store, table);
    let predicate = key_cols
        .iter()
        .map(|c| format!("{c} = ?"))
        .collect::<Vec<_>>()
        .join(" AND ");
    let sql = format!("DELETE FROM {qualified} WHERE {predicate}");
    store.with_connection(|conn| {
        conn.execute(&sql, duckdb::params_from_iter(key_vals.iter()))?;
        Ok(())
    })
}

pub(super) fn get_dataset(store: &CatalogStore, project: &str, dataset_id: &str) -> Result<Option<Dataset>, Error> {
    get_payload(store, "datasets", &["project", "dataset_id"], &[project, dataset_id])
}

pub(super) fn put_dataset(store: &CatalogStore, project: &str, dataset_id: &str, dataset: &Dataset) -> Result<(), Error> {
    put_payload(store, "datasets", &["project", "dataset_id"], &[project, dataset_id], dataset)
}

pub(super) fn delete_dataset(store: &CatalogStore, project: &str, dataset_id: &str) -> Result<(), Error> {
    delete_payload(store, "datasets", &["project", "dataset_id"], &[project, dataset_id])
}

pub(super) fn get_job(store: &CatalogStore, project: &str, job_id: &str) -> Result<Option<Job>, Error> {
    get_payload(store, "jobs", &["project", "job_id"], &[project, job_id])
}

pub(super) fn put_job(store: &CatalogStore, project: &str, job_id: &str, job: &Job) -> Result<(), Error> {
    put_payload(store, "jobs", &["project", "job_id"], &[project, job_id], job)
}

pub(super) fn delete_job(store: &CatalogStore, project: &str, job_id: &str) -> Result<(), Error> {
    delete_payload(store, "jobs", &["project", "job_id"], &[project, job_id])
}

pub(super) fn list_jobs(store: &CatalogStore, project: &str) -> Result<Vec<Job>, Error> {
    let qualified = internal_table(store, "jobs");
    let sql = format!("SELECT payload FROM {qualified} WHERE project = ?");
    store.with_connection(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([project], |row| row.get::<_, String>(0))?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(serde_json::from_str(&row?)?);
        }
        Ok(jobs)
    })
}

pub(super) fn get_query_result(store: &CatalogStore, project: &str, job_id: &str) -> Result<Option<QueryResponse>, Error> {
    get_payload(store, "query_results", &["project", "job_id"], &[project, job_id])
}

pub(super) fn put_query_result(store: &CatalogStore, project: &str, job_id: &str, result: &QueryResponse) -> Result<(), Error> {
    put_payload(store, "query_results", &["project", "job_id"], &[project, job_id], result)
}

pub(super) fn delete_query_result(store: &CatalogStore, project: &str, job_id: &str) -> Result<(), Error> {
    delete_payload(store, "query_results", &["project", "job_id"], &[project, job_id])
}

pub(super) fn get_table(store: &CatalogStore, project: &str, dataset_id: &str, table_id: &str) -> Result<Option<Table>, Error> {
    get_payload(store, "tables", &["project", "dataset_id", "table_id"], &[project, dataset_id, table_id])
}

pub(super) fn put_table(store: &CatalogStore, project: &str, dataset_id: &str, table_id: &str, table: &Table) -> Result<(), Error> {
    put_payload(store, "tables", &["project", "dataset_id", "table_id"], &[project, dataset_id, table_id], table)
}

pub(super) fn delete_table(store: &CatalogStore, project: &str, dataset_id: &str, table_id: &str) -> Result<(), Error> {
    delete_payload(store, "tables", &["project", "dataset_id", "table_id"], &[project, dataset_id, table_id])
}
