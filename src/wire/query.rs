//! Wire model for `QueryParameter` (type tree + value tree) and the
//! synchronous `queries` request/response bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::table::TableSchema;
use super::tabledata::Tuple;
use super::{DatasetReference, JobReference};
use crate::error::ErrorProto;

/// A parameter's type tree: scalar, or `ARRAY`/`STRUCT`/`RANGE` recursing
/// into element/field types.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterType {
    #[serde(rename = "type")]
    pub type_: String,
    pub array_type: Option<Box<QueryParameterType>>,
    pub struct_types: Option<Vec<StructType>>,
    pub range_element_type: Option<Box<QueryParameterType>>,
}

impl QueryParameterType {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            type_: name.into(),
            array_type: None,
            struct_types: None,
            range_element_type: None,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructType {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_: QueryParameterType,
    pub description: Option<String>,
}

/// A parameter's value tree, mirroring the shape of its [`QueryParameterType`].
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterValue {
    pub value: Option<String>,
    pub array_values: Option<Vec<QueryParameterValue>>,
    pub struct_values: Option<HashMap<String, QueryParameterValue>>,
    pub range_value: Option<RangeValue>,
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeValue {
    pub start: Option<Box<QueryParameterValue>>,
    pub end: Option<Box<QueryParameterValue>>,
}

/// A single named-or-positional query parameter. `name` is `None` for
/// positional parameters; the value bridge assigns synthetic `param0`,
/// `param1`, ... names when translating these into the engine's parameter
/// map.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    pub name: Option<String>,
    pub parameter_type: QueryParameterType,
    pub parameter_value: QueryParameterValue,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub max_results: Option<u32>,
    pub default_dataset: Option<DatasetReference>,
    pub timeout_ms: Option<u32>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub use_legacy_sql: bool,
    pub parameter_mode: Option<String>,
    pub query_parameters: Option<Vec<QueryParameter>>,
    pub location: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(default)]
    pub kind: String,
    #[serde(rename = "schema")]
    pub schema_: Option<TableSchema>,
    pub job_reference: JobReference,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub total_rows: Option<u64>,
    pub page_token: Option<String>,
    pub rows: Option<Vec<Tuple>>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub total_bytes_processed: Option<i64>,
    pub job_complete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
    pub cache_hit: Option<bool>,
}
