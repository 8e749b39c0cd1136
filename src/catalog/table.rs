//! Table CRUD and `tabledata.insertAll`.

use tracing::instrument;

use super::{ddl, metadata, now_epoch_seconds, qualified_name, CatalogStore, Error};
use crate::error::ErrorProto;
use crate::translate::{self, TableLister};
use crate::value;
use crate::wire::tabledata::{InsertAllRequest, InsertAllResponse, InsertErrors};
use crate::wire::table::{Table, TableSchema, TableType};
use crate::wire::TableReference;

/// A resolved `(project, dataset, table)` coordinate, with its quoted,
/// fully-qualified SQL name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableIdentity {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableIdentity {
    pub fn new(project: impl Into<String>, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            dataset: dataset.into(),
            table: table.into(),
        }
    }

    pub fn qualified(&self) -> String {
        qualified_name(&[&self.project, &self.dataset, &self.table])
    }
}

impl CatalogStore {
    #[instrument(skip(self, table))]
    pub fn create_table(&self, project: &str, dataset_id: &str, table_id: &str, mut table: Table) -> Result<Table, Error> {
        if self.table_exists(project, dataset_id, table_id)? {
            return Err(Error::Engine(format!("table {table_id} already exists")));
        }
        table.kind = "bigquery#table".to_string();
        table.table_reference = TableReference {
            project_id: project.to_string(),
            dataset_id: dataset_id.to_string(),
            table_id: table_id.to_string(),
        };
        table.table_type = TableType::Table;
        let now = now_epoch_seconds();
        table.creation_time.get_or_insert(now);

        let schema = table.schema_.clone().unwrap_or_default();
        let identity = TableIdentity::new(project, dataset_id, table_id);
        let ddl_sql = ddl::schema_to_create_table_sql(&schema, &identity.qualified());
        self.with_connection(|conn| conn.execute_batch(&ddl_sql).map_err(Error::from))?;
        metadata::put_table(self, project, dataset_id, table_id, &table)?;
        Ok(table)
    }

    pub fn get_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<Option<Table>, Error> {
        if !self.table_exists(project, dataset_id, table_id)? {
            return Ok(None);
        }
        let identity = TableIdentity::new(project, dataset_id, table_id);
        let mut table = metadata::get_table(self, project, dataset_id, table_id)?.unwrap_or_else(|| Table {
            kind: "bigquery#table".to_string(),
            table_reference: TableReference {
                project_id: project.to_string(),
                dataset_id: dataset_id.to_string(),
                table_id: table_id.to_string(),
            },
            table_type: TableType::Table,
            creation_time: Some(now_epoch_seconds()),
            schema_: Some(TableSchema::default()),
            ..Default::default()
        });
        let count: i64 = self.with_connection(|conn| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", identity.qualified()), [], |row| row.get(0))
                .map_err(Error::from)
        })?;
        table.num_rows = Some(count as u64);
        Ok(Some(table))
    }

    pub fn list_tables(&self, project: &str, dataset_id: &str) -> Result<Vec<Table>, Error> {
        let names = self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT table_name FROM information_schema.tables WHERE table_catalog = ? AND table_schema = ? ORDER BY table_name",
            )?;
            let rows = stmt
                .query_map([project, dataset_id], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            if let Some(table) = self.get_table(project, dataset_id, &name)? {
                tables.push(table);
            }
        }
        Ok(tables)
    }

    #[instrument(skip(self))]
    pub fn delete_table(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<(), Error> {
        let identity = TableIdentity::new(project, dataset_id, table_id);
        self.with_connection(|conn| {
            conn.execute_batch(&format!("DROP TABLE {}", identity.qualified()))
                .map_err(Error::from)
        })?;
        metadata::delete_table(self, project, dataset_id, table_id)?;
        Ok(())
    }

    fn table_exists(&self, project: &str, dataset_id: &str, table_id: &str) -> Result<bool, Error> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT 1 FROM information_schema.tables WHERE table_catalog = ? AND table_schema = ? AND table_name = ?",
            )?;
            Ok(stmt.exists([project, dataset_id, table_id])?)
        })
    }

    /// Inserts streaming rows as parameterized `INSERT ... VALUES (?, ...)`
    /// statements. Missing-field filling (`value::fill_missing_fields`)
    /// lets callers send rows with differing key sets; any column absent
    /// from a row is bound as `NULL`. Per-row failures are collected into
    /// [`InsertAllResponse::insert_errors`] rather than aborting the batch.
    #[instrument(skip(self, request))]
    pub fn insert_all(&self, project: &str, dataset_id: &str, table_id: &str, request: InsertAllRequest) -> Result<InsertAllResponse, Error> {
        let table = self
            .get_table(project, dataset_id, table_id)?
            .ok_or_else(|| Error::Engine(format!("table {table_id} does not exist")))?;
        let schema = table.schema_.unwrap_or_default();
        let columns: Vec<String> = schema.fields.iter().map(|f| f.name.clone()).collect();

        let mut rows: Vec<Vec<(String, serde_json::Value)>> = request
            .rows
            .iter()
            .map(|row| row.json_.clone().into_iter().collect())
            .collect();
        value::fill_missing_fields(&mut rows);

        let identity = TableIdentity::new(project, dataset_id, table_id);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            identity.qualified(),
            columns.join(", "),
            placeholders,
        );
        let mut insert_errors = Vec::new();
        self.with_connection(|conn| {
            for (index, row) in rows.iter().enumerate() {
                let bound: Vec<duckdb::types::Value> = columns
                    .iter()
                    .map(|column| {
                        row.iter()
                            .find(|(key, _)| key == column)
                            .map(|(_, value)| json_value_to_duckdb_value(value))
                            .unwrap_or(duckdb::types::Value::Null)
                    })
                    .collect();
                let params: Vec<&dyn duckdb::ToSql> = bound.iter().map(|v| v as &dyn duckdb::ToSql).collect();
                if let Err(err) = conn.execute(&sql, params.as_slice()) {
                    insert_errors.push(InsertErrors {
                        index: index as u32,
                        errors: vec![ErrorProto {
                            domain: "global".to_string(),
                            reason: "invalid".to_string(),
                            message: err.to_string(),
                        }],
                    });
                }
            }
            Ok(())
        })?;

        Ok(InsertAllResponse {
            kind: "bigquery#tableDataInsertAllResponse".to_string(),
            insert_errors,
        })
    }
}

fn json_value_to_duckdb_value(value: &serde_json::Value) -> duckdb::types::Value {
    use duckdb::types::Value as V;
    match value {
        serde_json::Value::Null => V::Null,
        serde_json::Value::Bool(b) => V::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                V::BigInt(i)
            } else if let Some(f) = n.as_f64() {
                V::Double(f)
            } else {
                V::Text(n.to_string())
            }
        }
        serde_json::Value::String(s) => V::Text(s.clone()),
        other => V::Text(other.to_string()),
    }
}

impl TableLister for CatalogStore {
    fn tables_with_prefix(&self, project: &str, dataset: &str, prefix: &str) -> Result<Vec<String>, translate::Error> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT table_name FROM information_schema.tables WHERE table_catalog = ? AND table_schema = ? AND table_name LIKE ? ORDER BY table_name",
            )?;
            let pattern = format!("{prefix}%");
            let rows = stmt
                .query_map([project, dataset, pattern.as_str()], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .map_err(|err| translate::Error::Parse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_name_quotes_every_part() {
        let identity = TableIdentity::new("p", "d", "t");
        assert_eq!(identity.qualified(), "\"p\".\"d\".\"t\"");
    }

    #[test]
    fn string_literal_escapes_single_quotes() {
        assert_eq!(json_value_to_sql_literal(&serde_json::json!("o'clock")), "'o''clock'");
    }

    #[test]
    fn null_literal_is_bare_null() {
        assert_eq!(json_value_to_sql_literal(&serde_json::Value::Null), "NULL");
    }
}
