//! Row/cell wire model ("f/v" nesting) and the `tabledata.*` request/response
//! bodies.
//!
//! The producer side here omits `v` entirely for a null cell rather than
//! emit `"v": null` (a client-side reader can afford an explicit `Null`
//! variant since it only ever *reads* the field; a producer has to decide
//! whether to emit the key at all). That is modeled here as
//! `Cell.v: Option<Value>` with `skip_serializing_if` instead of a fourth
//! `Value` variant.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::wire::error::ErrorProto;

/// A cell value: scalar string, nested row, or array of cells. Never `null`
/// as a serialized variant — a null cell is `Cell { v: None }`.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Array(Vec<Cell>),
    Struct(Tuple),
}

/// One value slot in a row. `v` is omitted on the wire when the underlying
/// engine value was `NULL`.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<Value>,
}

impl Cell {
    pub fn null() -> Self {
        Self { v: None }
    }

    pub fn scalar(s: impl Into<String>) -> Self {
        Self {
            v: Some(Value::String(s.into())),
        }
    }

    pub fn array(cells: Vec<Cell>) -> Self {
        Self {
            v: Some(Value::Array(cells)),
        }
    }

    pub fn nested(row: Tuple) -> Self {
        Self {
            v: Some(Value::Struct(row)),
        }
    }
}

/// A row: an ordered list of cells.
#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tuple {
    pub f: Vec<Cell>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDataRequest {
    pub start_index: Option<u64>,
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
    pub selected_fields: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchDataResponse {
    pub kind: String,
    pub etag: String,
    #[serde(deserialize_with = "crate::wire::from_str")]
    pub total_rows: u64,
    pub page_token: Option<String>,
    pub rows: Option<Vec<Tuple>>,
}

/// One row of an `insertAll` request body: `{insertId, json: {...}}`. The
/// wire key `json` is aliased to `json_` field-aliasing
/// contract (`json` collides with reserved identifiers elsewhere).
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRow {
    pub insert_id: Option<String>,
    #[serde(rename = "json")]
    pub json_: HashMap<String, JsonValue>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRequest {
    #[serde(default)]
    pub skip_invalid_rows: bool,
    #[serde(default)]
    pub ignore_unknown_values: bool,
    pub template_suffix: Option<String>,
    pub rows: Vec<InsertAllRow>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertErrors {
    pub index: u32,
    pub errors: Vec<ErrorProto>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllResponse {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insert_errors: Vec<InsertErrors>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_cell_omits_v() {
        let cell = Cell::null();
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn scalar_cell_round_trips() {
        let cell = Cell::scalar("45");
        let json = serde_json::to_string(&cell).unwrap();
        let back: Cell = serde_json::from_str(&json).unwrap();
        assert_eq!(cell, back);
    }

    #[test]
    fn json_field_aliases_to_json_key() {
        let mut row = HashMap::new();
        row.insert("id".to_string(), serde_json::json!(1));
        let insert_row = InsertAllRow {
            insert_id: None,
            json_: row,
        };
        let json = serde_json::to_value(&insert_row).unwrap();
        assert!(json.get("json").is_some());
    }
}
