//! Type and value conversion between the embedded engine and the wire model.
//!
//! Pure conversions between the embedded engine's native value/type model
//! and the wire model: column-type mapping, value encoding (timestamps as
//! microseconds, bytes as base64, numerics as `BigDecimal` strings), and
//! filling in schema fields a row's JSON payload left unset. Deliberately
//! engine-library-agnostic: [`EngineValue`] and
//! [`EngineType`] are a neutral intermediate so this module stays testable
//! without a live `duckdb::Connection` — [`crate::catalog`] is the only
//! place that converts to/from `duckdb::types::Value`.

use std::collections::BTreeMap;

use base64::prelude::BASE64_STANDARD;
use base64::Engine as _;
use time::{Date, OffsetDateTime, Time};

use crate::wire::table::{FieldMode, FieldType, TableFieldSchema};
use crate::wire::tabledata::{Cell, Tuple, Value as WireValue};
use crate::wire::query::{QueryParameter, QueryParameterType, QueryParameterValue};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unsupported engine type: {0}")]
    UnsupportedEngineType(String),
    #[error("invalid parameter value for type {type_}: {value}")]
    InvalidParameterValue { type_: String, value: String },
    #[error("struct field {0} missing a value")]
    MissingStructField(String),
    #[error(transparent)]
    ParseDate(#[from] time::error::Parse),
    #[error(transparent)]
    ParseComponentRange(#[from] time::error::ComponentRange),
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

/// The embedded engine's logical column type, lower-cased exactly as the
/// engine itself names it.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineType {
    Integer,
    Bigint,
    Smallint,
    Tinyint,
    Float,
    Double,
    Decimal,
    Varchar,
    /// `varchar` carrying the engine's `JSON` logical-type alias.
    VarcharJson,
    Blob,
    Boolean,
    Date,
    Time,
    Timestamp,
    TimestampWithTz,
    Json,
    List(Box<EngineType>),
    Struct(Vec<(String, EngineType)>),
}

/// The embedded engine's native runtime value, independent of any particular
/// driver crate's representation.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Decimal/numeric values kept as their canonical string form to avoid
    /// float round-off.
    Decimal(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(Date),
    Time(Time),
    Timestamp(OffsetDateTime),
    Json(String),
    List(Vec<EngineValue>),
    /// Ordered `(field name, value)` pairs — order is the declaration order.
    Struct(Vec<(String, EngineValue)>),
}

/// Maps one engine column type to its wire `(type, mode)` pair.
///
/// `mode` only ever comes back `REPEATED` here (for `List`); scalar
/// nullability is a property of observed data, not of the type tag, so
/// callers combine this with [`infer_mode`] or with the engine's own
/// not-null flag.
pub fn engine_type_to_wire(engine_type: &EngineType) -> Result<(FieldType, Option<Vec<TableFieldSchema>>, FieldMode), Error> {
    Ok(match engine_type {
        EngineType::Integer | EngineType::Bigint | EngineType::Smallint | EngineType::Tinyint => {
            (FieldType::Integer, None, FieldMode::Nullable)
        }
        EngineType::Float | EngineType::Double | EngineType::Decimal => (FieldType::Float, None, FieldMode::Nullable),
        EngineType::Varchar => (FieldType::String, None, FieldMode::Nullable),
        EngineType::VarcharJson | EngineType::Json => (FieldType::Json, None, FieldMode::Nullable),
        EngineType::Blob => (FieldType::Bytes, None, FieldMode::Nullable),
        EngineType::Boolean => (FieldType::Boolean, None, FieldMode::Nullable),
        EngineType::Date => (FieldType::Date, None, FieldMode::Nullable),
        EngineType::Time => (FieldType::Time, None, FieldMode::Nullable),
        EngineType::Timestamp | EngineType::TimestampWithTz => (FieldType::Timestamp, None, FieldMode::Nullable),
        EngineType::List(child) => {
            if let EngineType::Struct(fields) = child.as_ref() {
                let fields = struct_fields_to_wire(fields)?;
                (FieldType::Record, Some(fields), FieldMode::Repeated)
            } else {
                let (child_type, _, _) = engine_type_to_wire(child)?;
                (child_type, None, FieldMode::Repeated)
            }
        }
        EngineType::Struct(fields) => {
            let fields = struct_fields_to_wire(fields)?;
            (FieldType::Record, Some(fields), FieldMode::Nullable)
        }
    })
}

fn struct_fields_to_wire(fields: &[(String, EngineType)]) -> Result<Vec<TableFieldSchema>, Error> {
    fields
        .iter()
        .map(|(name, engine_type)| {
            let (field_type, nested, mode) = engine_type_to_wire(engine_type)?;
            Ok(TableFieldSchema {
                name: name.clone(),
                field_type,
                mode,
                fields: nested,
                range_element_type: None,
                description: None,
            })
        })
        .collect()
}

/// Converts one engine-native value into its wire [`Cell`].
pub fn engine_value_to_cell(value: &EngineValue) -> Cell {
    match value {
        EngineValue::Null => Cell::null(),
        EngineValue::Bool(b) => Cell::scalar(if *b { "true" } else { "false" }),
        EngineValue::Int(i) => Cell::scalar(i.to_string()),
        EngineValue::Float(f) => Cell::scalar(format_float(*f)),
        EngineValue::Decimal(s) => Cell::scalar(s.clone()),
        EngineValue::Text(s) => Cell::scalar(s.clone()),
        EngineValue::Json(s) => Cell::scalar(s.clone()),
        EngineValue::Bytes(b) => Cell::scalar(BASE64_STANDARD.encode(b)),
        EngineValue::Date(d) => Cell::scalar(d.to_string()),
        EngineValue::Time(t) => Cell::scalar(t.to_string()),
        EngineValue::Timestamp(ts) => Cell::scalar(timestamp_to_micros(*ts).to_string()),
        EngineValue::List(items) => Cell::array(items.iter().map(engine_value_to_cell).collect()),
        EngineValue::Struct(fields) => Cell::nested(Tuple {
            f: fields.iter().map(|(_, v)| engine_value_to_cell(v)).collect(),
        }),
    }
}

fn format_float(f: f64) -> String {
    f.to_string()
}

/// Integer microseconds since the Unix epoch. Computed via integer
/// nanosecond arithmetic rather than `(timestamp_seconds * 1e6) as i128`,
/// which can drift on float rounding for large timestamps.
pub fn timestamp_to_micros(ts: OffsetDateTime) -> i128 {
    ts.unix_timestamp_nanos() / 1_000
}

pub fn micros_to_timestamp(micros: i128) -> Result<OffsetDateTime, Error> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(micros * 1_000)?)
}

/// Converts the wire type/value tree of one [`QueryParameter`] into an
/// engine-native value.
pub fn wire_parameter_to_engine_value(
    param_type: &QueryParameterType,
    param_value: &QueryParameterValue,
) -> Result<EngineValue, Error> {
    let invalid = |value: &str| Error::InvalidParameterValue {
        type_: param_type.type_.clone(),
        value: value.to_string(),
    };
    match param_type.type_.as_str() {
        "STRING" => Ok(EngineValue::Text(param_value.value.clone().unwrap_or_default())),
        "INT64" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            Ok(EngineValue::Int(raw.parse::<i64>()?))
        }
        "FLOAT64" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            Ok(EngineValue::Float(raw.parse::<f64>()?))
        }
        "NUMERIC" | "BIGNUMERIC" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            Ok(EngineValue::Float(raw.parse::<f64>()?))
        }
        "BOOL" | "BOOLEAN" => {
            let raw = param_value.value.as_deref().unwrap_or("false");
            Ok(EngineValue::Bool(raw.eq_ignore_ascii_case("true")))
        }
        "BYTES" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            Ok(EngineValue::Bytes(BASE64_STANDARD.decode(raw)?))
        }
        "DATE" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            let format = time::macros::format_description!("[year]-[month]-[day]");
            Ok(EngineValue::Date(Date::parse(raw, format)?))
        }
        "TIME" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            let format = time::macros::format_description!("[hour]:[minute]:[second]");
            Ok(EngineValue::Time(Time::parse(raw, format)?))
        }
        "TIMESTAMP" | "DATETIME" => {
            let raw = param_value.value.as_deref().ok_or_else(|| invalid(""))?;
            Ok(EngineValue::Timestamp(parse_wire_timestamp(raw)?))
        }
        "ARRAY" => {
            let element_type = param_type
                .array_type
                .as_deref()
                .ok_or_else(|| invalid("missing arrayType"))?;
            let values = param_value.array_values.as_deref().unwrap_or(&[]);
            let items = values
                .iter()
                .map(|v| wire_parameter_to_engine_value(element_type, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(EngineValue::List(items))
        }
        "STRUCT" => {
            let struct_types = param_type
                .struct_types
                .as_deref()
                .ok_or_else(|| invalid("missing structTypes"))?;
            let empty = BTreeMap::new();
            let struct_values: BTreeMap<String, QueryParameterValue> = param_value
                .struct_values
                .clone()
                .map(|m| m.into_iter().collect())
                .unwrap_or(empty);
            let mut fields = Vec::with_capacity(struct_types.len());
            for field in struct_types {
                let name = field.name.clone().unwrap_or_default();
                let value = struct_values
                    .get(&name)
                    .ok_or_else(|| Error::MissingStructField(name.clone()))?;
                fields.push((name, wire_parameter_to_engine_value(&field.type_, value)?));
            }
            Ok(EngineValue::Struct(fields))
        }
        other => Err(Error::UnsupportedEngineType(other.to_string())),
    }
}

/// Parses `%Y-%m-%d %H:%M:%S[%z]`, defaulting to UTC when no offset is
/// present, matching the wire format the REST API emits for timestamps.
fn parse_wire_timestamp(raw: &str) -> Result<OffsetDateTime, Error> {
    if raw.contains('+') || raw.matches('-').count() > 2 {
        let format = time::macros::format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
        );
        Ok(OffsetDateTime::parse(raw, format)?)
    } else {
        let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let primitive = time::PrimitiveDateTime::parse(raw, format)?;
        Ok(primitive.assume_utc())
    }
}

/// Converts a full parameter list into the engine's `name -> value` map.
/// Positional parameters acquire synthetic names `param0..paramN-1` in
/// order.
pub fn wire_parameters_to_engine_map(
    params: &[QueryParameter],
) -> Result<Vec<(String, EngineValue)>, Error> {
    let mut output = Vec::with_capacity(params.len());
    let mut unnamed = 0usize;
    for param in params {
        let value = wire_parameter_to_engine_value(&param.parameter_type, &param.parameter_value)?;
        let name = match &param.name {
            Some(name) => name.clone(),
            None => {
                let name = format!("param{unnamed}");
                unnamed += 1;
                name
            }
        };
        output.push((name, value));
    }
    Ok(output)
}

/// Running per-column type observation used by [`infer_schema`].
#[derive(Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
enum Observed {
    #[default]
    Unseen,
    Boolean,
    Integer,
    Float,
    Datetime,
    DateOnly,
    Bytes,
    String,
}

/// Infers a wire schema from untyped result tuples: each column's type is
/// the least upper bound of the types observed across all rows (booleans
/// first, then integer, float, datetime, date, bytes, default STRING);
/// `INTEGER + FLOAT` promotes to `FLOAT`; anything else mixed promotes to
/// `STRING`. A column is `REQUIRED` iff no row held a null for it
///.
pub fn infer_schema(column_names: &[String], rows: &[Vec<EngineValue>]) -> Vec<TableFieldSchema> {
    let mut observed = vec![Observed::Unseen; column_names.len()];
    let mut saw_null = vec![false; column_names.len()];

    for row in rows {
        for (i, value) in row.iter().enumerate() {
            let this = match value {
                EngineValue::Null => {
                    saw_null[i] = true;
                    continue;
                }
                EngineValue::Bool(_) => Observed::Boolean,
                EngineValue::Int(_) => Observed::Integer,
                EngineValue::Float(_) | EngineValue::Decimal(_) => Observed::Float,
                EngineValue::Timestamp(_) => Observed::Datetime,
                EngineValue::Date(_) | EngineValue::Time(_) => Observed::DateOnly,
                EngineValue::Bytes(_) => Observed::Bytes,
                EngineValue::Text(_) | EngineValue::Json(_) | EngineValue::List(_) | EngineValue::Struct(_) => {
                    Observed::String
                }
            };
            observed[i] = promote(observed[i], this);
        }
    }

    column_names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let field_type = match observed[i] {
                Observed::Unseen | Observed::String => FieldType::String,
                Observed::Boolean => FieldType::Boolean,
                Observed::Integer => FieldType::Integer,
                Observed::Float => FieldType::Float,
                Observed::Datetime => FieldType::Timestamp,
                Observed::DateOnly => FieldType::Date,
                Observed::Bytes => FieldType::Bytes,
            };
            TableFieldSchema {
                name: name.clone(),
                field_type,
                mode: if saw_null[i] { FieldMode::Nullable } else { FieldMode::Required },
                fields: None,
                range_element_type: None,
                description: None,
            }
        })
        .collect()
}

fn promote(current: Observed, next: Observed) -> Observed {
    use Observed::*;
    match (current, next) {
        (Unseen, other) => other,
        (a, b) if a == b => a,
        (Integer, Float) | (Float, Integer) => Float,
        _ => String,
    }
}

/// Renders an engine value as a SQL literal for direct inlining into
/// generated statements — used for constant-folded JS UDF calls and for
/// substituting `@name` query parameters ahead of execution, since the
/// translator already cross-compiles dialects textually rather than
/// relying on the engine's own parameter binding. Composite values aren't
/// expected to be inlined this way and fall back to a quoted debug form.
pub fn engine_value_to_sql_literal(value: &EngineValue) -> String {
    match value {
        EngineValue::Null => "NULL".to_string(),
        EngineValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        EngineValue::Int(i) => i.to_string(),
        // `{f}` drops the fractional part for whole numbers (`45.0` ->
        // `"45"`), which would re-parse as an INTEGER literal and lose the
        // column's FLOAT type; `{f:?}` always keeps a decimal point.
        EngineValue::Float(f) => format!("{f:?}"),
        EngineValue::Decimal(s) | EngineValue::Text(s) | EngineValue::Json(s) => {
            format!("'{}'", s.replace('\'', "''"))
        }
        EngineValue::Bytes(b) => format!("'{}'", BASE64_STANDARD.encode(b)),
        EngineValue::Date(d) => format!("DATE '{d}'"),
        EngineValue::Time(t) => format!("TIME '{t}'"),
        EngineValue::Timestamp(ts) => format!("TIMESTAMP '{ts}'"),
        EngineValue::List(_) | EngineValue::Struct(_) => {
            format!("'{}'", format!("{value:?}").replace('\'', "''"))
        }
    }
}

/// Computes the union of keys across a list of row maps and fills any
/// missing key with `null`, so positional binding works uniformly.
pub fn fill_missing_fields(rows: &mut [Vec<(String, serde_json::Value)>]) {
    let mut all_keys: Vec<String> = Vec::new();
    for row in rows.iter() {
        for (key, _) in row.iter() {
            if !all_keys.contains(key) {
                all_keys.push(key.clone());
            }
        }
    }
    for row in rows.iter_mut() {
        for key in &all_keys {
            if !row.iter().any(|(k, _)| k == key) {
                row.push((key.clone(), serde_json::Value::Null));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_engine_value_becomes_omitted_cell() {
        let cell = engine_value_to_cell(&EngineValue::Null);
        assert!(cell.v.is_none());
    }

    #[test]
    fn boolean_becomes_lowercase_string() {
        let cell = engine_value_to_cell(&EngineValue::Bool(true));
        assert_eq!(cell.v, Some(WireValue::String("true".to_string())));
    }

    #[test]
    fn timestamp_is_integer_microseconds_no_fractional_suffix() {
        let ts = OffsetDateTime::from_unix_timestamp(1_672_531_200).unwrap();
        let cell = engine_value_to_cell(&EngineValue::Timestamp(ts));
        assert_eq!(cell.v, Some(WireValue::String("1672531200000000".to_string())));
    }

    #[test]
    fn bytes_round_trip_through_base64() {
        let cell = engine_value_to_cell(&EngineValue::Bytes(vec![1, 2, 3]));
        assert_eq!(cell.v, Some(WireValue::String(BASE64_STANDARD.encode([1, 2, 3]))));
    }

    #[test]
    fn positional_parameters_get_synthetic_names_in_order() {
        let params = vec![
            QueryParameter {
                name: None,
                parameter_type: QueryParameterType::scalar("STRING"),
                parameter_value: QueryParameterValue {
                    value: Some("a".to_string()),
                    ..Default::default()
                },
            },
            QueryParameter {
                name: None,
                parameter_type: QueryParameterType::scalar("STRING"),
                parameter_value: QueryParameterValue {
                    value: Some("b".to_string()),
                    ..Default::default()
                },
            },
        ];
        let mapped = wire_parameters_to_engine_map(&params).unwrap();
        assert_eq!(mapped[0].0, "param0");
        assert_eq!(mapped[1].0, "param1");
    }

    #[test]
    fn named_parameter_keeps_its_name() {
        let params = vec![QueryParameter {
            name: Some("arg".to_string()),
            parameter_type: QueryParameterType::scalar("STRING"),
            parameter_value: QueryParameterValue {
                value: Some("one".to_string()),
                ..Default::default()
            },
        }];
        let mapped = wire_parameters_to_engine_map(&params).unwrap();
        assert_eq!(mapped[0].0, "arg");
        assert_eq!(mapped[0].1, EngineValue::Text("one".to_string()));
    }

    #[test]
    fn int64_parameter_parses_string_value() {
        let value = wire_parameter_to_engine_value(
            &QueryParameterType::scalar("INT64"),
            &QueryParameterValue {
                value: Some("42".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(value, EngineValue::Int(42));
    }

    #[test]
    fn integer_and_float_promote_to_float() {
        let names = vec!["x".to_string()];
        let rows = vec![vec![EngineValue::Int(1)], vec![EngineValue::Float(1.5)]];
        let schema = infer_schema(&names, &rows);
        assert_eq!(schema[0].field_type, FieldType::Float);
    }

    #[test]
    fn column_with_a_null_row_is_nullable() {
        let names = vec!["x".to_string()];
        let rows = vec![vec![EngineValue::Int(1)], vec![EngineValue::Null]];
        let schema = infer_schema(&names, &rows);
        assert_eq!(schema[0].mode, FieldMode::Nullable);
    }

    #[test]
    fn column_never_null_is_required() {
        let names = vec!["x".to_string()];
        let rows = vec![vec![EngineValue::Int(1)], vec![EngineValue::Int(2)]];
        let schema = infer_schema(&names, &rows);
        assert_eq!(schema[0].mode, FieldMode::Required);
    }

    #[test]
    fn sql_literal_escapes_string_quotes() {
        assert_eq!(engine_value_to_sql_literal(&EngineValue::Text("o'clock".to_string())), "'o''clock'");
    }

    #[test]
    fn sql_literal_for_null_is_bare_null() {
        assert_eq!(engine_value_to_sql_literal(&EngineValue::Null), "NULL");
    }

    #[test]
    fn fill_missing_fields_unions_keys_with_null() {
        let mut rows = vec![
            vec![("a".to_string(), serde_json::json!(1))],
            vec![
                ("a".to_string(), serde_json::json!(2)),
                ("b".to_string(), serde_json::json!(3)),
            ],
        ];
        fill_missing_fields(&mut rows);
        assert_eq!(rows[0].len(), 2);
        assert!(rows[0].iter().any(|(k, v)| k == "b" && v.is_null()));
    }
}
