//! The catalog store.
//!
//! One process-wide engine connection with every known project attached,
//! plus the internal metadata tables that back dataset/job/query-result
//! bookkeeping. Each project is a separate attached database file; schemas
//! within it are datasets. New projects are attached lazily, and an
//! idempotent `ATTACH IF NOT EXISTS` re-scan picks up any database file
//! created since the store was opened.

pub mod ddl;
mod job;
mod metadata;
mod table;

use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{debug, instrument};

use crate::config::Config;
use crate::wire::dataset::Dataset;
use crate::wire::DatasetReference;

pub use job::{JobRecord, QueryResultRecord};
pub use table::TableIdentity;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Engine(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::Engine(err.to_string())
    }
}

/// Strips surrounding back-tick, single-, or double-quote characters from a
/// user-supplied identifier.
pub fn strip_quotes(identifier: &str) -> &str {
    identifier.trim_matches(|c| c == '`' || c == '\'' || c == '"')
}

/// Wraps a bare identifier in double quotes so hyphenated names survive
/// re-emission into generated SQL.
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", strip_quotes(identifier).replace('"', "\"\""))
}

/// Joins non-empty `(project, dataset, table)` components with `.`, each
/// wrapped in double quotes.
pub fn qualified_name(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| quote_ident(p))
        .collect::<Vec<_>>()
        .join(".")
}

/// The catalog store: a single `duckdb` connection with every project
/// attached, guarded by a mutex because `duckdb::Connection` is not `Sync`
///.
pub struct CatalogStore {
    conn: Mutex<duckdb::Connection>,
    config: Config,
}

impl CatalogStore {
    /// Opens the store, ensuring the default and internal project
    /// attachments and their default schemas exist.
    #[instrument(skip(config))]
    pub fn open(config: Config) -> Result<Self, Error> {
        fs::create_dir_all(&config.data_dir)?;
        let conn = duckdb::Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            config,
        };
        store.ensure_attached(&store.config.default_project_id.clone())?;
        store.ensure_attached(&store.config.internal_project_id.clone())?;
        store.ensure_schema(&store.config.default_project_id.clone(), &store.config.default_dataset_id.clone())?;
        store.ensure_schema(&store.config.internal_project_id.clone(), &store.config.internal_dataset_id.clone())?;
        metadata::create_metadata_tables(&store)?;
        Ok(store)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn project_path(&self, project: &str) -> PathBuf {
        self.config.data_dir.join(format!("{project}.duckdb"))
    }

    /// Attaches a project's storage file if it is not already attached.
    /// Idempotent and safe under concurrent first use: `ATTACH IF NOT
    /// EXISTS` is a single statement the engine itself de-duplicates.
    #[instrument(skip(self))]
    pub fn ensure_attached(&self, project: &str) -> Result<(), Error> {
        let path = self.project_path(project);
        let sql = format!(
            "ATTACH IF NOT EXISTS '{}' AS {}",
            path.display(),
            quote_ident(project)
        );
        let conn = self.conn.lock().expect("catalog connection poisoned");
        conn.execute_batch(&sql)?;
        debug!(project, "project attached");
        Ok(())
    }

    /// Attaches every `*.duckdb` file under the data directory that isn't
    /// attached yet, so projects created in a previous process are visible
    /// without the caller naming them explicitly.
    pub fn discover_and_attach_projects(&self) -> Result<(), Error> {
        for entry in fs::read_dir(&self.config.data_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("duckdb") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    self.ensure_attached(stem)?;
                }
            }
        }
        Ok(())
    }

    fn ensure_schema(&self, project: &str, dataset: &str) -> Result<(), Error> {
        let sql = format!(
            "CREATE SCHEMA IF NOT EXISTS {}.{}",
            quote_ident(project),
            quote_ident(dataset)
        );
        let conn = self.conn.lock().expect("catalog connection poisoned");
        conn.execute_batch(&sql)?;
        Ok(())
    }

    pub(crate) fn with_connection<T>(&self, f: impl FnOnce(&duckdb::Connection) -> Result<T, Error>) -> Result<T, Error> {
        let conn = self.conn.lock().expect("catalog connection poisoned");
        f(&conn)
    }

    /// Enumerates schemas attached to `project` from the engine's own
    /// catalog, backfilling any schema with no metadata row with a
    /// synthetic [`Dataset`] record.
    #[instrument(skip(self))]
    pub fn list_datasets(&self, project: &str) -> Result<Vec<Dataset>, Error> {
        self.ensure_attached(project)?;
        let schema_names = self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT schema_name FROM information_schema.schemata WHERE catalog_name = ? ORDER BY schema_name",
            )?;
            let rows = stmt
                .query_map([project], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let mut datasets = Vec::with_capacity(schema_names.len());
        for dataset_id in schema_names {
            if dataset_id == "information_schema" || dataset_id == "pg_catalog" || dataset_id == "main" {
                continue;
            }
            let existing = metadata::get_dataset(self, project, &dataset_id)?;
            let dataset = existing.unwrap_or_else(|| {
                Dataset::synthetic(
                    DatasetReference {
                        project_id: project.to_string(),
                        dataset_id: dataset_id.clone(),
                    },
                    now_epoch_seconds(),
                )
            });
            datasets.push(dataset);
        }
        Ok(datasets)
    }

    #[instrument(skip(self, dataset))]
    pub fn create_dataset(&self, project: &str, dataset_id: &str, mut dataset: Dataset) -> Result<Dataset, Error> {
        self.ensure_attached(project)?;
        if self.schema_exists(project, dataset_id)? {
            return Err(Error::Engine(format!("dataset {dataset_id} already exists")));
        }
        dataset.dataset_reference = DatasetReference {
            project_id: project.to_string(),
            dataset_id: dataset_id.to_string(),
        };
        let now = now_epoch_seconds();
        dataset.creation_time.get_or_insert(now);
        dataset.last_modified_time = Some(now);
        metadata::put_dataset(self, project, dataset_id, &dataset)?;
        self.ensure_schema(project, dataset_id)?;
        Ok(dataset)
    }

    #[instrument(skip(self))]
    pub fn delete_dataset(&self, project: &str, dataset_id: &str) -> Result<(), Error> {
        let sql = format!(
            "DROP SCHEMA {}.{} CASCADE",
            quote_ident(project),
            quote_ident(dataset_id)
        );
        self.with_connection(|conn| conn.execute_batch(&sql).map_err(Error::from))?;
        metadata::delete_dataset(self, project, dataset_id)?;
        Ok(())
    }

    pub fn get_dataset(&self, project: &str, dataset_id: &str) -> Result<Option<Dataset>, Error> {
        if !self.schema_exists(project, dataset_id)? {
            return Ok(None);
        }
        let existing = metadata::get_dataset(self, project, dataset_id)?;
        Ok(Some(existing.unwrap_or_else(|| {
            Dataset::synthetic(
                DatasetReference {
                    project_id: project.to_string(),
                    dataset_id: dataset_id.to_string(),
                },
                now_epoch_seconds(),
            )
        })))
    }

    /// Partial merge of `patch` onto the stored dataset.
    pub fn patch_dataset(&self, project: &str, dataset_id: &str, patch: Dataset) -> Result<Dataset, Error> {
        let mut current = self
            .get_dataset(project, dataset_id)?
            .ok_or_else(|| Error::Engine(format!("dataset {dataset_id} does not exist")))?;
        current.merge_patch(patch);
        current.last_modified_time = Some(now_epoch_seconds());
        metadata::put_dataset(self, project, dataset_id, &current)?;
        Ok(current)
    }

    /// Full replace of the stored dataset.
    pub fn update_dataset(&self, project: &str, dataset_id: &str, mut dataset: Dataset) -> Result<Dataset, Error> {
        if self.get_dataset(project, dataset_id)?.is_none() {
            return Err(Error::Engine(format!("dataset {dataset_id} does not exist")));
        }
        dataset.last_modified_time = Some(now_epoch_seconds());
        metadata::put_dataset(self, project, dataset_id, &dataset)?;
        Ok(dataset)
    }

    fn schema_exists(&self, project: &str, dataset_id: &str) -> Result<bool, Error> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT 1 FROM information_schema.schemata WHERE catalog_name = ? AND schema_name = ?",
            )?;
            Ok(stmt.exists([project, dataset_id])?)
        })
    }
}

pub(crate) fn now_epoch_seconds() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_quotes_handles_all_three_quote_styles() {
        assert_eq!(strip_quotes("`a`"), "a");
        assert_eq!(strip_quotes("'a'"), "a");
        assert_eq!(strip_quotes("\"a\""), "a");
        assert_eq!(strip_quotes("a"), "a");
    }

    #[test]
    fn qualified_name_skips_empty_components() {
        assert_eq!(qualified_name(&["p", "", "t"]), "\"p\".\"t\"");
        assert_eq!(qualified_name(&["p", "d", "t"]), "\"p\".\"d\".\"t\"");
    }

    #[test]
    fn quote_ident_wraps_hyphenated_identifiers() {
        assert_eq!(quote_ident("my-project"), "\"my-project\"");
    }
}
