//! The query executor.
//!
//! Runs one translated script against the catalog's engine connection:
//! resolves the session's default dataset, binds JS UDFs and `@name`
//! parameters ahead of execution, executes each
//! statement in order, and keeps the last statement's result set — matching
//! BigQuery's own "last statement's SELECT wins" script semantics.

use tracing::{debug, instrument};

use crate::catalog::{quote_ident, CatalogStore};
use crate::translate::{self, TranslateContext};
use crate::udf;
use crate::value::{self, EngineValue};
use crate::wire::job::DmlStats;
use crate::wire::query::QueryParameter;
use crate::wire::table::TableSchema;
use crate::wire::tabledata::Tuple;
use crate::Error;

/// The outcome of running one script: the last `SELECT`'s shaped result, or
/// an empty result for a script whose last statement was DDL/DML, plus DML
/// row-count statistics for the last INSERT/UPDATE/DELETE.
#[derive(Default)]
pub struct ExecutionResult {
    pub schema: TableSchema,
    pub rows: Vec<Tuple>,
    pub total_rows: u64,
    pub dml_stats: Option<DmlStats>,
}

/// Executes `sql` against `project`, using `default_dataset` (falling back
/// to the catalog's configured default) as the session's default schema.
#[instrument(skip(store, sql, parameters))]
pub fn execute(
    store: &CatalogStore,
    project: &str,
    default_dataset: Option<&str>,
    sql: &str,
    parameters: &[QueryParameter],
) -> Result<ExecutionResult, Error> {
    let dataset = default_dataset.unwrap_or(&store.config().default_dataset_id).to_string();
    let engine_params = value::wire_parameters_to_engine_map(parameters)?;
    let parameter_names: Vec<String> = engine_params.iter().map(|(name, _)| name.clone()).collect();

    let ctx = TranslateContext {
        default_project: Some(project),
        default_dataset: Some(&dataset),
        federation_connection_id: &store.config().federation_connection_id,
        parameter_names: &parameter_names,
        catalog: store,
    };
    let translated = translate::translate(sql, &ctx)?;

    let mut last_rows: Option<(Vec<String>, Vec<Vec<EngineValue>>)> = None;
    let mut dml_stats = None;

    store.with_connection(|conn| {
        conn.execute_batch(&format!("USE {}.{}", quote_ident(project), quote_ident(&dataset)))?;

        for statement in &translated.statements {
            let bound = udf::bind_calls(&statement.sql, &translated.udfs)
                .map_err(|err| crate::catalog::Error::Engine(err.to_string()))?;
            let bound = substitute_parameters(&bound, &engine_params);
            debug!(sql = %bound, "executing translated statement");

            if is_select_like(&bound) {
                let mut stmt = conn.prepare(&bound)?;
                let column_count = stmt.column_count();
                let column_names: Vec<String> = (0..column_count)
                    .map(|i| stmt.column_name(i).map(|s| s.to_string()).unwrap_or_default())
                    .collect();
                let mut rows_cursor = stmt.query([])?;
                let mut rows = Vec::new();
                while let Some(row) = rows_cursor.next()? {
                    let mut values = Vec::with_capacity(column_count);
                    for i in 0..column_count {
                        let raw: duckdb::types::Value = row.get(i)?;
                        values.push(duckdb_value_to_engine(raw));
                    }
                    rows.push(values);
                }
                last_rows = Some((column_names, rows));
                dml_stats = None;
            } else {
                let affected = conn.execute(&bound, [])?;
                dml_stats = dml_stats_for(&bound, affected);
                last_rows = None;
            }
        }
        Ok(())
    })?;

    match last_rows {
        Some((names, rows)) => {
            let fields = value::infer_schema(&names, &rows);
            let total_rows = rows.len() as u64;
            let tuples = rows
                .iter()
                .map(|row| Tuple {
                    f: row.iter().map(value::engine_value_to_cell).collect(),
                })
                .collect();
            Ok(ExecutionResult {
                schema: TableSchema { fields },
                rows: tuples,
                total_rows,
                dml_stats,
            })
        }
        None => Ok(ExecutionResult {
            dml_stats,
            ..Default::default()
        }),
    }
}

fn is_select_like(sql: &str) -> bool {
    let upper = sql.trim_start().to_uppercase();
    upper.starts_with("SELECT") || upper.starts_with("WITH")
}

fn dml_stats_for(sql: &str, affected: usize) -> Option<DmlStats> {
    let upper = sql.trim_start().to_uppercase();
    if upper.starts_with("INSERT") {
        Some(DmlStats {
            inserted_row_count: Some(affected as i64),
            ..Default::default()
        })
    } else if upper.starts_with("UPDATE") {
        Some(DmlStats {
            updated_row_count: Some(affected as i64),
            ..Default::default()
        })
    } else if upper.starts_with("DELETE") {
        Some(DmlStats {
            deleted_row_count: Some(affected as i64),
            ..Default::default()
        })
    } else {
        None
    }
}

/// Replaces `@name` tokens with their literal value ahead of execution,
/// rather than relying on the engine's own parameter binding — the
/// translator already cross-compiles dialects textually, so this keeps
/// parameter handling in the same layer.
fn substitute_parameters(sql: &str, params: &[(String, EngineValue)]) -> String {
    let mut output = sql.to_string();
    for (name, value) in params {
        let token = format!("@{name}");
        let literal = value::engine_value_to_sql_literal(value);
        output = replace_word(&output, &token, &literal);
    }
    output
}

fn replace_word(haystack: &str, token: &str, replacement: &str) -> String {
    let mut result = String::new();
    let mut rest = haystack;
    while let Some(pos) = rest.find(token) {
        let after = pos + token.len();
        let boundary_ok = rest
            .as_bytes()
            .get(after)
            .map(|b| !b.is_ascii_alphanumeric() && *b != b'_')
            .unwrap_or(true);
        result.push_str(&rest[..pos]);
        if boundary_ok {
            result.push_str(replacement);
        } else {
            result.push_str(&rest[pos..after]);
        }
        rest = &rest[after..];
    }
    result.push_str(rest);
    result
}

/// Converts one engine-returned cell into [`EngineValue`]. Unrecognized
/// variants fall back to their debug text rather than failing the whole
/// row, since the wire model always accepts a string-shaped cell.
fn duckdb_value_to_engine(value: duckdb::types::Value) -> EngineValue {
    use duckdb::types::Value as V;
    match value {
        V::Null => EngineValue::Null,
        V::Boolean(b) => EngineValue::Bool(b),
        V::TinyInt(i) => EngineValue::Int(i as i64),
        V::SmallInt(i) => EngineValue::Int(i as i64),
        V::Int(i) => EngineValue::Int(i as i64),
        V::BigInt(i) => EngineValue::Int(i),
        V::UTinyInt(i) => EngineValue::Int(i as i64),
        V::USmallInt(i) => EngineValue::Int(i as i64),
        V::UInt(i) => EngineValue::Int(i as i64),
        V::UBigInt(i) => EngineValue::Int(i as i64),
        V::Float(f) => EngineValue::Float(f as f64),
        V::Double(f) => EngineValue::Float(f),
        V::Decimal(d) => EngineValue::Decimal(d.to_string()),
        V::Text(s) => EngineValue::Text(s),
        V::Blob(b) => EngineValue::Bytes(b),
        other => EngineValue::Text(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_parameters_replaces_word_bounded_tokens() {
        let params = vec![("id".to_string(), EngineValue::Int(7))];
        let out = substitute_parameters("SELECT * FROM t WHERE id = @id", &params);
        assert_eq!(out, "SELECT * FROM t WHERE id = 7");
    }

    #[test]
    fn substitute_parameters_does_not_touch_longer_names() {
        let params = vec![("id".to_string(), EngineValue::Int(7))];
        let out = substitute_parameters("SELECT @identity", &params);
        assert_eq!(out, "SELECT @identity");
    }

    #[test]
    fn is_select_like_recognizes_with_clause() {
        assert!(is_select_like("WITH x AS (SELECT 1) SELECT * FROM x"));
    }

    #[test]
    fn dml_stats_for_insert_counts_affected_rows() {
        let stats = dml_stats_for("INSERT INTO t VALUES (1)", 3).unwrap();
        assert_eq!(stats.inserted_row_count, Some(3));
    }
}
