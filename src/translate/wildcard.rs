//! Wildcard table-name expansion.

use sqlparser::ast::{
    Query, Select, SelectItem, SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::BigQueryDialect;
use sqlparser::parser::Parser;

use super::{Error, TranslateContext};

pub(super) fn rewrite_wildcards(statement: &mut Statement, ctx: &TranslateContext) -> Result<(), Error> {
    match statement {
        Statement::Query(query) => rewrite_query(query, ctx),
        _ => Ok(()),
    }
}

fn rewrite_query(query: &mut Query, ctx: &TranslateContext) -> Result<(), Error> {
    rewrite_set_expr(&mut query.body, ctx)
}

fn rewrite_set_expr(expr: &mut SetExpr, ctx: &TranslateContext) -> Result<(), Error> {
    match expr {
        SetExpr::Select(select) => rewrite_select(select, ctx),
        SetExpr::Query(query) => rewrite_query(query, ctx),
        SetExpr::SetOperation { left, right, .. } => {
            rewrite_set_expr(left, ctx)?;
            rewrite_set_expr(right, ctx)
        }
        _ => Ok(()),
    }
}

fn rewrite_select(select: &mut Select, ctx: &TranslateContext) -> Result<(), Error> {
    for twj in &mut select.from {
        rewrite_table_with_joins(twj, ctx)?;
    }
    Ok(())
}

fn rewrite_table_with_joins(twj: &mut TableWithJoins, ctx: &TranslateContext) -> Result<(), Error> {
    rewrite_table_factor(&mut twj.relation, ctx)?;
    for join in &mut twj.joins {
        rewrite_table_factor(&mut join.relation, ctx)?;
    }
    Ok(())
}

fn rewrite_table_factor(factor: &mut TableFactor, ctx: &TranslateContext) -> Result<(), Error> {
    let TableFactor::Table { name, alias, .. } = factor else {
        return Ok(());
    };
    let parts: Vec<String> = name.0.iter().map(|ident| ident.value.clone()).collect();
    let Some(last) = parts.last() else { return Ok(()) };
    if !last.ends_with('*') {
        return Ok(());
    }
    let prefix = last.trim_end_matches('*').to_string();

    // The table reference's own project/dataset win over the request
    // default when both are set; only a bare `dataset.table*` or
    // `table*` falls back to the request's default scope.
    let (project, dataset) = match parts.len() {
        3 => (parts[0].clone(), parts[1].clone()),
        2 => (
            ctx.default_project.map(str::to_string).unwrap_or_default(),
            parts[0].clone(),
        ),
        _ => (
            ctx.default_project.map(str::to_string).unwrap_or_default(),
            ctx.default_dataset.map(str::to_string).unwrap_or_default(),
        ),
    };

    let matches = ctx.catalog.tables_with_prefix(&project, &dataset, &prefix)?;
    if matches.is_empty() {
        return Err(Error::WildcardNoMatch {
            pattern: name.to_string(),
            scopes: format!("{project}.{dataset}"),
        });
    }

    let branches: Vec<String> = matches
        .iter()
        .map(|table| {
            let suffix = table.strip_prefix(&prefix).unwrap_or(table);
            format!(
                "SELECT *, '{suffix}' AS _TABLE_SUFFIX FROM \"{project}\".\"{dataset}\".\"{table}\"",
                suffix = suffix.replace('\'', "''"),
            )
        })
        .collect();
    let union_sql = branches.join(" UNION ALL ");

    let alias_name = alias
        .as_ref()
        .map(|a| a.name.value.clone())
        .unwrap_or_else(|| prefix.clone());

    let derived = parse_derived_table(&union_sql, &alias_name)?;
    *factor = derived;
    Ok(())
}

/// Parses `SELECT * FROM (<subquery>) AS <alias>` and extracts the derived
/// [`TableFactor`], so we can splice a freshly-built UNION subquery into an
/// existing AST without hand-constructing every nested node.
fn parse_derived_table(subquery_sql: &str, alias: &str) -> Result<TableFactor, Error> {
    let wrapped = format!("SELECT * FROM ({subquery_sql}) AS \"{alias}\"");
    let mut statements =
        Parser::parse_sql(&BigQueryDialect {}, &wrapped).map_err(|e| Error::Parse(e.to_string()))?;
    let statement = statements.pop().ok_or_else(|| Error::Parse("empty wildcard rewrite".to_string()))?;
    let Statement::Query(query) = statement else {
        return Err(Error::Parse("wildcard rewrite did not parse as a query".to_string()));
    };
    let SetExpr::Select(select) = *query.body else {
        return Err(Error::Parse("wildcard rewrite did not parse as a select".to_string()));
    };
    let mut select = select;
    let twj = select
        .from
        .pop()
        .ok_or_else(|| Error::Parse("wildcard rewrite produced no FROM clause".to_string()))?;
    Ok(twj.relation)
}

#[allow(dead_code)]
fn is_star(item: &SelectItem) -> bool {
    matches!(item, SelectItem::Wildcard(_))
}
