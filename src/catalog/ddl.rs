//! Schema → DDL generation: renders a [`TableSchema`] as a DuckDB
//! `CREATE TABLE` statement.

use crate::wire::table::{FieldMode, FieldType, TableFieldSchema, TableSchema};

fn field_type_sql(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String => "STRING",
        FieldType::Bytes => "BYTES",
        FieldType::Integer => "INT64",
        FieldType::Float => "FLOAT64",
        FieldType::Numeric => "NUMERIC",
        FieldType::Bignumeric => "BIGNUMERIC",
        FieldType::Boolean => "BOOL",
        FieldType::Timestamp => "TIMESTAMP",
        FieldType::Date => "DATE",
        FieldType::Time => "TIME",
        FieldType::Datetime => "DATETIME",
        FieldType::Geography => "GEOGRAPHY",
        FieldType::Json => "JSON",
        FieldType::Record => "RECORD",
        FieldType::Range => "RANGE",
    }
}

/// Emits `col type mode` for one field. RECORD/STRUCT fields recurse into
/// `STRUCT<child1 t1, child2 t2, ...>`; RANGE fields carry their element
/// type as `RANGE<DATE|DATETIME|TIMESTAMP>`; REPEATED wraps in `ARRAY<T>`.
pub fn field_to_sql(field: &TableFieldSchema) -> String {
    let sql_type = if matches!(field.field_type, FieldType::Record) {
        let subfields = field
            .fields
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .map(field_to_sql)
            .collect::<Vec<_>>()
            .join(", ");
        format!("STRUCT<{subfields}>")
    } else if matches!(field.field_type, FieldType::Range) {
        let element = field
            .range_element_type
            .as_ref()
            .map(|r| field_type_sql(r.field_type))
            .unwrap_or("DATE");
        format!("RANGE<{element}>")
    } else {
        field_type_sql(field.field_type).to_string()
    };

    if matches!(field.mode, FieldMode::Repeated) {
        return format!("{} ARRAY<{}>", field.name, sql_type);
    }
    let nullable = if matches!(field.mode, FieldMode::Required) {
        " NOT NULL"
    } else {
        ""
    };
    format!("{} {}{}", field.name, sql_type, nullable)
}

/// Emits `CREATE TABLE <name> (col1 t1, col2 t2, ...)`.
pub fn schema_to_create_table_sql(schema: &TableSchema, table_name: &str) -> String {
    let columns = schema.fields.iter().map(field_to_sql).collect::<Vec<_>>().join(", ");
    format!("CREATE TABLE {table_name} ({columns})")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, field_type: FieldType, mode: FieldMode) -> TableFieldSchema {
        TableFieldSchema {
            name: name.to_string(),
            field_type,
            mode,
            fields: None,
            range_element_type: None,
            description: None,
        }
    }

    #[test]
    fn required_field_emits_not_null() {
        let sql = field_to_sql(&field("id", FieldType::Integer, FieldMode::Required));
        assert_eq!(sql, "id INT64 NOT NULL");
    }

    #[test]
    fn nullable_field_has_no_suffix() {
        let sql = field_to_sql(&field("id", FieldType::Integer, FieldMode::Nullable));
        assert_eq!(sql, "id INT64");
    }

    #[test]
    fn repeated_field_wraps_in_array() {
        let sql = field_to_sql(&field("tags", FieldType::String, FieldMode::Repeated));
        assert_eq!(sql, "tags ARRAY<STRING>");
    }

    #[test]
    fn record_field_recurses_into_struct() {
        let mut nested = field("addr", FieldType::Record, FieldMode::Nullable);
        nested.fields = Some(vec![field("city", FieldType::String, FieldMode::Nullable)]);
        let sql = field_to_sql(&nested);
        assert_eq!(sql, "addr STRUCT<city STRING>");
    }

    #[test]
    fn range_field_carries_its_element_type() {
        let mut f = field("window", FieldType::Range, FieldMode::Nullable);
        f.range_element_type = Some(crate::wire::table::RangeElementType {
            field_type: FieldType::Timestamp,
        });
        let sql = field_to_sql(&f);
        assert_eq!(sql, "window RANGE<TIMESTAMP>");
    }

    #[test]
    fn full_schema_to_create_table() {
        let schema = TableSchema {
            fields: vec![
                field("id", FieldType::Integer, FieldMode::Required),
                field("ts", FieldType::Timestamp, FieldMode::Nullable),
            ],
        };
        let sql = schema_to_create_table_sql(&schema, "\"p\".\"d\".\"t1\"");
        assert_eq!(sql, "CREATE TABLE \"p\".\"d\".\"t1\" (id INT64 NOT NULL, ts TIMESTAMP)");
    }
}
