//! Wire model for `Table`, `TableSchema`, `TableFieldSchema`.
//!
//! Follows the REST schema's exhaustive field-type/mode list, in the same
//! serde idiom used elsewhere in this crate (`rename_all = "camelCase"`,
//! `Option<T>` + omit-if-unset for everything the producer may not have
//! set).

use serde::{Deserialize, Serialize};

use super::TableReference;

/// `type` wire field, named `field_type` here because `type` is a Rust
/// keyword — the same "reserved identifier" collision calls
/// out for `schema`/`json`/`copy`, just one Rust forces regardless.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    #[default]
    String,
    Bytes,
    Integer,
    Float,
    Numeric,
    Bignumeric,
    Boolean,
    Timestamp,
    Date,
    Time,
    Datetime,
    Geography,
    Json,
    Record,
    Range,
}

/// `mode` wire field: NULLABLE | REQUIRED | REPEATED.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldMode {
    #[default]
    Nullable,
    Required,
    Repeated,
}

/// One column of a [`TableSchema`].
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableFieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub mode: FieldMode,
    /// Present iff `field_type == Record`.
    pub fields: Option<Vec<TableFieldSchema>>,
    /// Present iff `field_type == Range`; names the element type (DATE, DATETIME, or TIMESTAMP).
    pub range_element_type: Option<RangeElementType>,
    pub description: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeElementType {
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Ordered list of fields. Wire key is `schema`, aliased here to the safe
/// Rust field name `schema_` field-aliasing contract.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchema {
    pub fields: Vec<TableFieldSchema>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    #[default]
    Table,
    View,
    ExternalTable,
    MaterializedView,
    Snapshot,
}

/// The `Table` wire entity.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    pub table_reference: TableReference,
    pub friendly_name: Option<String>,
    pub description: Option<String>,
    /// Wire key `schema`; see [`TableSchema`] doc for the aliasing note.
    #[serde(rename = "schema")]
    pub schema_: Option<TableSchema>,
    #[serde(default)]
    pub table_type: TableType,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub creation_time: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub num_rows: Option<u64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub num_bytes: Option<i64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableList {
    pub kind: String,
    pub tables: Vec<Table>,
    pub total_items: usize,
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_key_serializes_unaliased() {
        let table = Table {
            schema_: Some(TableSchema {
                fields: vec![TableFieldSchema {
                    name: "id".into(),
                    field_type: FieldType::Integer,
                    mode: FieldMode::Nullable,
                    fields: None,
                    range_element_type: None,
                    description: None,
                }],
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&table).unwrap();
        assert!(json.get("schema").is_some());
        assert_eq!(json["schema"]["fields"][0]["type"], "INTEGER");
    }
}
