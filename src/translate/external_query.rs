//! `EXTERNAL_QUERY` federation rewrite.
//!
//! `EXTERNAL_QUERY(connection_id, sql_text)` is BigQuery's table-valued
//! function for federated queries. We recognize it as a table function call
//! in a `FROM` clause, validate the connection id against the one configured
//! connection this emulator understands, reparse `sql_text` in the
//! federated source's own dialect, and inline it as a derived table
//! qualified against the attached federated catalog.

use sqlparser::ast::{
    Expr, FunctionArg, FunctionArgExpr, Query, Select, SetExpr, Statement, TableFactor,
    TableWithJoins, Value as AstValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use super::{Error, TranslateContext};

pub(super) fn rewrite_external_queries(statement: &mut Statement, ctx: &TranslateContext) -> Result<(), Error> {
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
    let TableFactor::Table { name, alias, args, .. } = factor else {
        return Ok(());
    };
    if !name.0.last().is_some_and(|ident| ident.value.eq_ignore_ascii_case("external_query")) {
        return Ok(());
    }
    let Some(table_args) = args else {
        return Err(Error::BadExternalQuerySql);
    };
    let mut literals = table_args.args.iter().filter_map(string_literal);
    let connection_id = literals.next().ok_or(Error::BadExternalQueryConnection)?;
    let sql_text = literals.next().ok_or(Error::BadExternalQuerySql)?;

    if connection_id != ctx.federation_connection_id {
        return Err(Error::BadExternalQueryConnection);
    }

    for name in referenced_parameters(&sql_text) {
        if !ctx.parameter_names.iter().any(|known| known == &name) {
            return Err(Error::MissingParameter(name));
        }
    }

    let federated = super::parse_federated(&sql_text)?;
    let cte_names = federated
        .iter()
        .flat_map(collect_cte_names)
        .collect::<Vec<_>>();

    let mut rewritten = federated;
    for stmt in &mut rewritten {
        qualify_bare_tables(stmt, &connection_id, &cte_names);
    }
    let federated_sql = rewritten
        .iter()
        .map(Statement::to_string)
        .collect::<Vec<_>>()
        .join("; ");

    let alias_name = alias
        .as_ref()
        .map(|a| a.name.value.clone())
        .unwrap_or_else(|| "external_query".to_string());

    *factor = parse_derived_table(&federated_sql, &alias_name)?;
    Ok(())
}

fn string_literal(arg: &FunctionArg) -> Option<String> {
    let expr = match arg {
        FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => expr,
        FunctionArg::Named { arg: FunctionArgExpr::Expr(expr), .. } => expr,
        _ => return None,
    };
    match expr {
        Expr::Value(AstValue::SingleQuotedString(s)) | Expr::Value(AstValue::DoubleQuotedString(s)) => {
            Some(s.clone())
        }
        _ => None,
    }
}

fn referenced_parameters(sql_text: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = sql_text.char_indices().peekable();
    while let Some((_, c)) = chars.next() {
        if c != '@' {
            continue;
        }
        let mut name = String::new();
        while let Some((_, c)) = chars.peek() {
            if c.is_alphanumeric() || *c == '_' {
                name.push(*c);
                chars.next();
            } else {
                break;
            }
        }
        if !name.is_empty() {
            names.push(name);
        }
    }
    names
}

fn collect_cte_names(statement: &Statement) -> Vec<String> {
    let Statement::Query(query) = statement else {
        return Vec::new();
    };
    query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| cte.alias.name.value.clone())
        .collect()
}

/// Qualifies bare, non-CTE table references in `statement` with the
/// federated catalog name attached for `connection_id`, under the default
/// `public` schema.
fn qualify_bare_tables(statement: &mut Statement, connection_id: &str, cte_names: &[String]) {
    if let Statement::Query(query) = statement {
        qualify_in_query(query, connection_id, cte_names);
    }
}

fn qualify_in_query(query: &mut Query, connection_id: &str, cte_names: &[String]) {
    qualify_in_set_expr(&mut query.body, connection_id, cte_names);
}

fn qualify_in_set_expr(expr: &mut SetExpr, connection_id: &str, cte_names: &[String]) {
    match expr {
        SetExpr::Select(select) => {
            for twj in &mut select.from {
                qualify_factor(&mut twj.relation, connection_id, cte_names);
                for join in &mut twj.joins {
                    qualify_factor(&mut join.relation, connection_id, cte_names);
                }
            }
        }
        SetExpr::Query(query) => qualify_in_query(query, connection_id, cte_names),
        SetExpr::SetOperation { left, right, .. } => {
            qualify_in_set_expr(left, connection_id, cte_names);
            qualify_in_set_expr(right, connection_id, cte_names);
        }
        _ => {}
    }
}

fn qualify_factor(factor: &mut TableFactor, connection_id: &str, cte_names: &[String]) {
    let TableFactor::Table { name, .. } = factor else { return };
    if name.0.len() != 1 {
        return;
    }
    let bare = name.0[0].value.clone();
    if cte_names.iter().any(|cte| cte == &bare) {
        return;
    }
    name.0 = vec![
        sqlparser::ast::Ident::new(connection_id),
        sqlparser::ast::Ident::new("public"),
        sqlparser::ast::Ident::new(bare),
    ];
}

fn parse_derived_table(subquery_sql: &str, alias: &str) -> Result<TableFactor, Error> {
    let wrapped = format!("SELECT * FROM ({subquery_sql}) AS \"{alias}\"");
    let mut statements =
        Parser::parse_sql(&GenericDialect {}, &wrapped).map_err(|e| Error::Parse(e.to_string()))?;
    let statement = statements.pop().ok_or_else(|| Error::Parse("empty EXTERNAL_QUERY rewrite".to_string()))?;
    let Statement::Query(query) = statement else {
        return Err(Error::Parse("EXTERNAL_QUERY rewrite did not parse as a query".to_string()));
    };
    let SetExpr::Select(select) = *query.body else {
        return Err(Error::Parse("EXTERNAL_QUERY rewrite did not parse as a select".to_string()));
    };
    let mut select = select;
    let twj = select
        .from
        .pop()
        .ok_or_else(|| Error::Parse("EXTERNAL_QUERY rewrite produced no FROM clause".to_string()))?;
    Ok(twj.relation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_parameters_finds_at_names() {
        let names = referenced_parameters("SELECT * FROM t WHERE id = @id AND name = @name");
        assert_eq!(names, vec!["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn referenced_parameters_empty_when_none_present() {
        assert!(referenced_parameters("SELECT * FROM t").is_empty());
    }
}
