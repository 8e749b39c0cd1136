//! The JS UDF binder.
//!
//! Recognizes `CREATE [TEMP] FUNCTION name(args) RETURNS type LANGUAGE js
//! AS "body"` declarations and executes their JS bodies in an
//! embedded interpreter. The declaration is detected textually, ahead of
//! the generic SQL parser — see `translate::classify` — because the DDL's
//! quoted JS body is not portable SQL grammar.

use js::{Context, Runtime};

use crate::value::EngineType;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("js runtime error: {0}")]
    Runtime(String),
    #[error("js evaluation error: {0}")]
    Eval(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// One formal argument of a JS UDF: its name and its declared engine type
///.
#[derive(Clone, Debug, PartialEq)]
pub struct UdfArgument {
    pub name: String,
    pub engine_type: EngineType,
}

/// A parsed `CREATE FUNCTION ... LANGUAGE js` declaration.
#[derive(Clone, Debug, PartialEq)]
pub struct UdfDeclaration {
    pub name: String,
    pub temporary: bool,
    pub arguments: Vec<UdfArgument>,
    pub return_type: EngineType,
    pub body: String,
}

/// Textually recognizes a JS UDF declaration, case-insensitively, returning
/// `None` for anything else (an ordinary statement, to be handed to
/// `sqlparser` instead).
pub fn parse_udf_declaration(raw_statement: &str) -> Option<UdfDeclaration> {
    let upper = raw_statement.to_uppercase();
    if !upper.trim_start().starts_with("CREATE") {
        return None;
    }
    if !upper.contains("LANGUAGE") || !contains_word(&upper, "JS") {
        return None;
    }

    let temporary = contains_word(&upper, "TEMP") || contains_word(&upper, "TEMPORARY");

    let function_kw = find_word(&upper, "FUNCTION")?;
    let after_function = &raw_statement[function_kw + "FUNCTION".len()..];
    let paren_open = after_function.find('(')?;
    let name = after_function[..paren_open].trim().to_string();
    if name.is_empty() {
        return None;
    }

    let paren_close = matching_close_paren(after_function, paren_open)?;
    let arg_list = &after_function[paren_open + 1..paren_close];
    let arguments = parse_arguments(arg_list);

    let rest = &after_function[paren_close + 1..];
    let rest_upper = rest.to_uppercase();
    let return_type = find_word(&rest_upper, "RETURNS")
        .map(|idx| {
            let after_returns = rest[idx + "RETURNS".len()..].trim_start();
            let type_name: String = after_returns
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            bigquery_type_to_engine(&type_name)
        })
        .unwrap_or(EngineType::Varchar);

    let as_idx = find_word(&rest_upper, "AS")?;
    let after_as = &rest[as_idx + 2..];
    let body = extract_quoted_body(after_as)?;

    Some(UdfDeclaration {
        name,
        temporary,
        arguments,
        return_type,
        body,
    })
}

fn contains_word(haystack: &str, word: &str) -> bool {
    find_word(haystack, word).is_some()
}

fn find_word(haystack: &str, word: &str) -> Option<usize> {
    let bytes = haystack.as_bytes();
    let wlen = word.len();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(word) {
        let idx = start + pos;
        let before_ok = idx == 0 || !bytes[idx - 1].is_ascii_alphanumeric();
        let after_ok = idx + wlen >= bytes.len() || !bytes[idx + wlen].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(idx);
        }
        start = idx + 1;
    }
    None
}

fn matching_close_paren(text: &str, open_idx: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices().skip(open_idx) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_arguments(arg_list: &str) -> Vec<UdfArgument> {
    arg_list
        .split(',')
        .filter_map(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            let mut parts = raw.split_whitespace();
            let name = parts.next()?.to_string();
            let type_name = parts.next().unwrap_or("STRING");
            Some(UdfArgument {
                name,
                engine_type: bigquery_type_to_engine(type_name),
            })
        })
        .collect()
}

fn bigquery_type_to_engine(name: &str) -> EngineType {
    match name.to_uppercase().as_str() {
        "INT64" | "INTEGER" => EngineType::Bigint,
        "FLOAT64" | "FLOAT" => EngineType::Double,
        "NUMERIC" | "DECIMAL" => EngineType::Decimal,
        "BOOL" | "BOOLEAN" => EngineType::Boolean,
        "BYTES" => EngineType::Blob,
        "DATE" => EngineType::Date,
        "TIME" => EngineType::Time,
        "TIMESTAMP" | "DATETIME" => EngineType::Timestamp,
        "JSON" => EngineType::Json,
        _ => EngineType::Varchar,
    }
}

/// Extracts the JS body from `"..."`, handling `\"` escapes the way the
/// source's single-quote-tolerant DDL parser does.
fn extract_quoted_body(text: &str) -> Option<String> {
    let text = text.trim_start();
    let quote = text.chars().next()?;
    if quote != '"' && quote != '\'' {
        return None;
    }
    let mut body = String::new();
    let mut chars = text.chars().skip(1);
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                body.push(escaped);
            }
            continue;
        }
        if c == quote {
            return Some(body);
        }
        body.push(c);
    }
    None
}

/// Runs a JS UDF body against positional engine-native arguments, returning
/// the result coerced to the declared return type. Executes in a fresh
/// embedded JS context per call: UDFs are pure text substitutions with no
/// cross-call state.
pub fn invoke(decl: &UdfDeclaration, args: &[crate::value::EngineValue]) -> Result<crate::value::EngineValue, Error> {
    let runtime = Runtime::new().map_err(|e| Error::Runtime(e.to_string()))?;
    let context = Context::full(&runtime).map_err(|e| Error::Runtime(e.to_string()))?;

    let arg_names = decl
        .arguments
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let args_json: Vec<serde_json::Value> = args.iter().map(engine_value_to_json).collect();
    let args_literal = serde_json::to_string(&args_json)?;

    let script = format!(
        "(function() {{ var __bq_udf = function({arg_names}) {{ {body} }}; \
         var __bq_args = {args_literal}; \
         return JSON.stringify(__bq_udf.apply(null, __bq_args)); }})()",
        body = decl.body,
    );

    let result: String = context
        .with(|ctx| ctx.eval::<String, _>(script.into_bytes()))
        .map_err(|e| Error::Eval(e.to_string()))?;
    let json: serde_json::Value = serde_json::from_str(&result)?;
    Ok(json_to_engine_value(&json, &decl.return_type))
}

fn engine_value_to_json(value: &crate::value::EngineValue) -> serde_json::Value {
    use crate::value::EngineValue;
    match value {
        EngineValue::Null => serde_json::Value::Null,
        EngineValue::Bool(b) => serde_json::Value::Bool(*b),
        EngineValue::Int(i) => serde_json::json!(i),
        EngineValue::Float(f) => serde_json::json!(f),
        EngineValue::Decimal(s) | EngineValue::Text(s) | EngineValue::Json(s) => serde_json::Value::String(s.clone()),
        EngineValue::Bytes(b) => serde_json::Value::String(base64::Engine::encode(&base64::prelude::BASE64_STANDARD, b)),
        EngineValue::Date(d) => serde_json::Value::String(d.to_string()),
        EngineValue::Time(t) => serde_json::Value::String(t.to_string()),
        EngineValue::Timestamp(ts) => serde_json::Value::String(ts.to_string()),
        EngineValue::List(items) => serde_json::Value::Array(items.iter().map(engine_value_to_json).collect()),
        EngineValue::Struct(fields) => {
            let mut map = serde_json::Map::new();
            for (name, v) in fields {
                map.insert(name.clone(), engine_value_to_json(v));
            }
            serde_json::Value::Object(map)
        }
    }
}

/// Replaces calls to declared UDFs whose arguments are all literals with
/// their evaluated result, so the engine never sees the `LANGUAGE js`
/// function name. A call whose arguments
/// reference columns rather than literals is left untouched; binding a
/// UDF as a native scalar function callable per-row is out of scope here.
pub fn bind_calls(sql: &str, udfs: &[UdfDeclaration]) -> Result<String, Error> {
    let mut output = sql.to_string();
    for decl in udfs {
        loop {
            let Some((call_start, paren_open)) = find_call(&output, &decl.name) else {
                break;
            };
            let Some(paren_close) = matching_close_paren(&output, paren_open) else {
                break;
            };
            let arg_text = &output[paren_open + 1..paren_close];
            let Some(values) = parse_literal_args(arg_text) else {
                break;
            };
            let result = invoke(decl, &values)?;
            let literal = crate::value::engine_value_to_sql_literal(&result);
            output.replace_range(call_start..paren_close + 1, &literal);
        }
    }
    Ok(output)
}

fn find_call(haystack: &str, name: &str) -> Option<(usize, usize)> {
    let upper_hay = haystack.to_uppercase();
    let upper_name = name.to_uppercase();
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(rel) = upper_hay[start..].find(&upper_name) {
        let idx = start + rel;
        let before_ok = idx == 0 || (!bytes[idx - 1].is_ascii_alphanumeric() && bytes[idx - 1] != b'_');
        let after_idx = idx + name.len();
        if before_ok {
            let rest = &haystack[after_idx..];
            let trimmed_len = rest.trim_start().len();
            let paren_pos = after_idx + (rest.len() - trimmed_len);
            if haystack.as_bytes().get(paren_pos) == Some(&b'(') {
                return Some((idx, paren_pos));
            }
        }
        start = idx + 1;
    }
    None
}

fn parse_literal_args(text: &str) -> Option<Vec<crate::value::EngineValue>> {
    if text.trim().is_empty() {
        return Some(Vec::new());
    }
    split_top_level_commas(text)
        .into_iter()
        .map(|part| parse_literal(part.trim()))
        .collect()
}

fn split_top_level_commas(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in text.chars() {
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
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => parts.push(std::mem::take(&mut current)),
                _ => current.push(c),
            },
        }
    }
    parts.push(current);
    parts
}

fn parse_literal(text: &str) -> Option<crate::value::EngineValue> {
    use crate::value::EngineValue;
    if text.eq_ignore_ascii_case("null") {
        return Some(EngineValue::Null);
    }
    if text.eq_ignore_ascii_case("true") {
        return Some(EngineValue::Bool(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(EngineValue::Bool(false));
    }
    if let Some(inner) = text.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        return Some(EngineValue::Text(inner.replace("''", "'")));
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(EngineValue::Int(i));
    }
    if let Ok(f) = text.parse::<f64>() {
        return Some(EngineValue::Float(f));
    }
    None
}

fn json_to_engine_value(value: &serde_json::Value, return_type: &EngineType) -> crate::value::EngineValue {
    use crate::value::EngineValue;
    match value {
        serde_json::Value::Null => EngineValue::Null,
        serde_json::Value::Bool(b) => EngineValue::Bool(*b),
        serde_json::Value::Number(n) => match return_type {
            EngineType::Integer | EngineType::Bigint | EngineType::Smallint | EngineType::Tinyint => {
                EngineValue::Int(n.as_i64().unwrap_or_default())
            }
            _ => EngineValue::Float(n.as_f64().unwrap_or_default()),
        },
        serde_json::Value::String(s) => EngineValue::Text(s.clone()),
        other => EngineValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_temp_function_declaration() {
        let sql = "CREATE TEMP FUNCTION mul(x FLOAT64, y FLOAT64) RETURNS FLOAT64 LANGUAGE js AS \"return x*y;\"";
        let decl = parse_udf_declaration(sql).unwrap();
        assert!(decl.temporary);
        assert_eq!(decl.name, "mul");
        assert_eq!(decl.arguments.len(), 2);
        assert_eq!(decl.arguments[0].name, "x");
        assert_eq!(decl.return_type, EngineType::Double);
        assert_eq!(decl.body, "return x*y;");
    }

    #[test]
    fn ordinary_select_is_not_a_udf() {
        assert!(parse_udf_declaration("SELECT 1").is_none());
    }

    #[test]
    fn untyped_argument_defaults_to_string() {
        let sql = "CREATE FUNCTION f(x) RETURNS STRING LANGUAGE js AS \"return x;\"";
        let decl = parse_udf_declaration(sql).unwrap();
        assert_eq!(decl.arguments[0].engine_type, EngineType::Varchar);
    }

    #[test]
    fn escaped_quote_survives_body_extraction() {
        let sql = "CREATE FUNCTION f() RETURNS STRING LANGUAGE js AS \"return \\\"hi\\\";\"";
        let decl = parse_udf_declaration(sql).unwrap();
        assert_eq!(decl.body, "return \"hi\";");
    }

    #[test]
    fn find_call_locates_word_bounded_name() {
        let (start, paren) = find_call("SELECT mul(3, 15) AS r", "mul").unwrap();
        assert_eq!(&"SELECT mul(3, 15) AS r"[start..paren], "mul");
    }

    #[test]
    fn find_call_skips_substring_matches() {
        assert!(find_call("SELECT mulligan(3)", "mul").is_none());
    }

    #[test]
    fn parse_literal_args_splits_on_top_level_commas() {
        let values = parse_literal_args("3, 15").unwrap();
        assert_eq!(values, vec![crate::value::EngineValue::Int(3), crate::value::EngineValue::Int(15)]);
    }

    #[test]
    fn parse_literal_args_bails_on_identifiers() {
        assert!(parse_literal_args("some_column, 2").is_none());
    }
}
