//! The SQL translator.
//!
//! Parses source-dialect SQL, classifies each statement, rewrites table
//! references (wildcard expansion, `EXTERNAL_QUERY` federation), and emits
//! target-dialect SQL. Pure: this module holds no persisted state. Table
//! existence lookups needed for wildcard expansion are supplied by the
//! caller through the [`TableLister`] trait so this module never depends
//! on [`crate::catalog`] directly.

mod external_query;
mod wildcard;

use sqlparser::ast::Statement;
use sqlparser::dialect::{BigQueryDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

use crate::udf::{self, UdfDeclaration};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Parse(String),
    #[error("wildcard pattern {pattern} matched no tables in {scopes}")]
    WildcardNoMatch { pattern: String, scopes: String },
    #[error("EXTERNAL_QUERY requires a connection id literal matching the configured federation id")]
    BadExternalQueryConnection,
    #[error("EXTERNAL_QUERY requires a string literal SQL argument")]
    BadExternalQuerySql,
    #[error("parameter {0} referenced by EXTERNAL_QUERY was not supplied")]
    MissingParameter(String),
}

/// What one source statement turned out to be.
pub enum Classification {
    /// A `CREATE [TEMP] FUNCTION ... LANGUAGE js AS "..."` declaration.
    /// Handed to the UDF binder; produces no emitted SQL.
    JsUdf(UdfDeclaration),
    /// An ordinary query or DDL/DML statement, possibly rewritten.
    Ordinary(Statement),
}

/// One rewritten, emitted statement ready for the engine, plus the subset
/// of parameter names it actually references.
#[derive(Debug)]
pub struct TranslatedStatement {
    pub sql: String,
    pub referenced_parameters: Vec<String>,
}

/// The full result of translating a (possibly multi-statement) script:
/// UDF declarations to bind, in source order, plus the rewritten ordinary
/// statements to execute.
#[derive(Debug)]
pub struct TranslationOutput {
    pub udfs: Vec<UdfDeclaration>,
    pub statements: Vec<TranslatedStatement>,
}

/// Supplies table-existence lookups for wildcard expansion. Implemented by [`crate::catalog::CatalogStore`].
pub trait TableLister {
    /// Tables in `(project, dataset)` whose bare name starts with `prefix`,
    /// sorted lexically.
    fn tables_with_prefix(&self, project: &str, dataset: &str, prefix: &str) -> Result<Vec<String>, Error>;
}

/// Per-request translation context.
pub struct TranslateContext<'a> {
    pub default_project: Option<&'a str>,
    pub default_dataset: Option<&'a str>,
    pub federation_connection_id: &'a str,
    pub parameter_names: &'a [String],
    pub catalog: &'a dyn TableLister,
}

/// Parses `sql` (possibly multiple statements) in the source dialect,
/// classifies, rewrites, and emits each. UDF declarations are filtered out
/// of the returned list (the caller binds them via [`crate::udf`] and moves
/// on); only the other statements carry forward to execution.
///
/// Splits on top-level `;` *before* invoking the generic parser: BigQuery's
/// `LANGUAGE js` function DDL has no portable generic-SQL grammar, so a
/// statement containing one would fail a whole-script parse. Each
/// individual statement is classified first; only non-UDF statements are
/// handed to `sqlparser`.
pub fn translate(sql: &str, ctx: &TranslateContext) -> Result<TranslationOutput, Error> {
    let mut statements = Vec::new();
    let mut udfs = Vec::new();
    for raw_statement in split_statements(sql) {
        let raw_statement = raw_statement.trim();
        if raw_statement.is_empty() {
            continue;
        }
        match classify(raw_statement)? {
            Classification::JsUdf(decl) => udfs.push(decl),
            Classification::Ordinary(mut statement) => {
                wildcard::rewrite_wildcards(&mut statement, ctx)?;
                external_query::rewrite_external_queries(&mut statement, ctx)?;
                let emitted = statement.to_string();
                let referenced = scope_parameters(&emitted, ctx.parameter_names);
                statements.push(TranslatedStatement {
                    sql: emitted,
                    referenced_parameters: referenced,
                });
            }
        }
    }
    Ok(TranslationOutput { udfs, statements })
}

/// Splits a multi-statement script on top-level `;`, respecting single- and
/// double-quoted string literals so a `;` inside a literal (or inside a
/// UDF's JS body) is not treated as a statement boundary.
fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ';' => {
                    statements.push(std::mem::take(&mut current));
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        statements.push(current);
    }
    statements
}

/// Classifies one raw source statement. UDF
/// declarations are detected textually; everything else is parsed through
/// `sqlparser`'s BigQuery dialect, with a parse failure surfacing as
/// `InvalidQuery` (HTTP 400).
fn classify(raw_statement: &str) -> Result<Classification, Error> {
    if let Some(decl) = udf::parse_udf_declaration(raw_statement) {
        return Ok(Classification::JsUdf(decl));
    }
    let mut statements =
        Parser::parse_sql(&BigQueryDialect {}, raw_statement).map_err(|e| Error::Parse(e.to_string()))?;
    let statement = statements
        .pop()
        .ok_or_else(|| Error::Parse("empty statement".to_string()))?;
    Ok(Classification::Ordinary(statement))
}

/// Returns the subset of `known` parameter names that literally appear as
/// `@name` in the emitted SQL, so the executor only forwards parameters the
/// final statement actually references.
fn scope_parameters(sql: &str, known: &[String]) -> Vec<String> {
    known
        .iter()
        .filter(|name| sql.contains(&format!("@{name}")))
        .cloned()
        .collect()
}

/// Parses `sql_text` in the federated source's own dialect (Postgres),
/// `EXTERNAL_QUERY` rewrite.
pub(crate) fn parse_federated(sql_text: &str) -> Result<Vec<Statement>, Error> {
    Parser::parse_sql(&PostgreSqlDialect {}, sql_text).map_err(|e| Error::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoTables;
    impl TableLister for NoTables {
        fn tables_with_prefix(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn simple_select_round_trips() {
        let ctx = TranslateContext {
            default_project: None,
            default_dataset: None,
            federation_connection_id: "external",
            parameter_names: &[],
            catalog: &NoTables,
        };
        let out = translate("SELECT 1 AS a", &ctx).unwrap();
        assert_eq!(out.statements.len(), 1);
        assert!(out.statements[0].sql.to_uppercase().contains("SELECT"));
    }

    #[test]
    fn parse_failure_is_invalid_query() {
        let ctx = TranslateContext {
            default_project: None,
            default_dataset: None,
            federation_connection_id: "external",
            parameter_names: &[],
            catalog: &NoTables,
        };
        let err = translate("SELEKT 1", &ctx).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn udf_declaration_is_classified_and_dropped() {
        let ctx = TranslateContext {
            default_project: None,
            default_dataset: None,
            federation_connection_id: "external",
            parameter_names: &[],
            catalog: &NoTables,
        };
        let sql = "CREATE TEMP FUNCTION mul(x FLOAT64, y FLOAT64) RETURNS FLOAT64 LANGUAGE js AS \"return x*y;\"";
        let out = translate(sql, &ctx).unwrap();
        assert!(out.statements.is_empty());
        assert_eq!(out.udfs.len(), 1);
        assert_eq!(out.udfs[0].name, "mul");
    }
}
