//! The wire schema model.
//!
//! Every entity transported over the HTTP boundary, with the warehouse's
//! wire conventions: camelCase keys, integers/timestamps carried as JSON
//! strings, and "present but unset" fields omitted from serialized output
//! rather than emitted as `null`. No algorithms live in this module; the
//! algorithms that fill, infer, or convert these types live in
//! [`crate::value`], [`crate::catalog`], and [`crate::translate`].

pub mod dataset;
pub mod error;
pub mod job;
pub mod query;
pub mod table;
pub mod tabledata;

use serde::{de, Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::fmt::Display;
use std::str::FromStr;

/// Deserializes a BigQuery-style stringified integer/number into `T`.
///
/// The wire format carries numerics as JSON strings to dodge precision
/// loss in JS clients.
pub fn from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: de::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    T::from_str(&s).map_err(de::Error::custom)
}

/// Like [`from_str`] but tolerant of an absent/null field, yielding `None`.
pub fn from_str_option<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    let s: Result<JsonValue, _> = Deserialize::deserialize(deserializer);
    match s {
        Ok(JsonValue::String(s)) => T::from_str(&s).map_err(de::Error::custom).map(Some),
        Ok(JsonValue::Number(n)) => T::from_str(&n.to_string()).map_err(de::Error::custom).map(Some),
        Ok(JsonValue::Null) | Err(_) => Ok(None),
        Ok(_) => Err(de::Error::custom("expected a string or number")),
    }
}

/// `(project, dataset)` reference, embedded wherever a dataset is named.
#[derive(Clone, PartialEq, Eq, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    pub project_id: String,
    pub dataset_id: String,
}

/// `(project, dataset, table)` reference, embedded wherever a table is named.
#[derive(Clone, PartialEq, Eq, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

/// `(project, job_id)` reference, embedded wherever a job is named.
#[derive(Clone, PartialEq, Eq, Debug, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    pub location: Option<String>,
}
