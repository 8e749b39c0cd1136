//! Wire model for `Job` and its configuration/statistics trees.
//!
//! Trimmed to the subset this emulator actually produces (query jobs,
//! synchronously `DONE`) while keeping the tagged-union shape
//! (`job: {query, load, extract, copy}`, exactly one populated) the real
//! API uses, so control-plane jobs this emulator doesn't implement still
//! round-trip as `NotImplemented` rather than failing to deserialize.

use serde::{Deserialize, Serialize};

use super::query::QueryParameter;
use super::{DatasetReference, JobReference, TableReference};
use crate::error::ErrorProto;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    #[default]
    Pending,
    Running,
    Done,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    pub error_result: Option<ErrorProto>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorProto>,
}

impl JobStatus {
    pub fn done() -> Self {
        Self {
            state: JobState::Done,
            error_result: None,
            errors: Vec::new(),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationQuery {
    pub query: String,
    pub query_parameters: Option<Vec<QueryParameter>>,
    #[serde(default)]
    pub use_legacy_sql: bool,
    pub default_dataset: Option<DatasetReference>,
    pub destination_table: Option<TableReference>,
    pub create_disposition: Option<String>,
    pub write_disposition: Option<String>,
    pub priority: Option<String>,
    pub parameter_mode: Option<String>,
}

/// Stub for `JobConfiguration.load`; load jobs surface as `NotImplemented`.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationLoad {
    pub destination_table: Option<TableReference>,
    pub source_uris: Option<Vec<String>>,
}

/// Stub for `JobConfiguration.extract`; extract jobs surface as `NotImplemented`.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationExtract {
    pub source_table: Option<TableReference>,
    pub destination_uris: Option<Vec<String>>,
}

/// Stub for `JobConfiguration.copy`; copy jobs surface as `NotImplemented`.
/// Wire key `copy` is aliased to `copy_` since `copy` is a reserved Rust
/// identifier — the same collision `field` aliasing handles elsewhere in
/// this module.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfigurationCopy {
    pub source_table: Option<TableReference>,
    pub destination_table: Option<TableReference>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfiguration {
    pub job_type: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    pub query: Option<JobConfigurationQuery>,
    pub load: Option<JobConfigurationLoad>,
    pub extract: Option<JobConfigurationExtract>,
    #[serde(rename = "copy")]
    pub copy_: Option<JobConfigurationCopy>,
    pub labels: Option<std::collections::HashMap<String, String>>,
}

impl JobConfiguration {
    pub fn for_query(query: JobConfigurationQuery) -> Self {
        Self {
            job_type: Some("QUERY".to_string()),
            query: Some(query),
            ..Default::default()
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiEngineMode {
    #[default]
    AccelerationModeUnspecified,
    Disabled,
    Partial,
    Full,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BiEngineCode {
    #[default]
    CodeUnspecified,
    NoReservation,
    InsufficientReservation,
    UnsupportedSqlText,
    InputTooLarge,
    OtherReason,
    TableExcluded,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiEngineReason {
    pub code: BiEngineCode,
    pub message: String,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiEngineStatistics {
    pub bi_engine_mode: Option<BiEngineMode>,
    pub bi_engine_reasons: Option<Vec<BiEngineReason>>,
}

impl BiEngineStatistics {
    /// The emulator never accelerates via BI Engine, so this is always the
    /// reported shape.
    pub fn disabled() -> Self {
        Self {
            bi_engine_mode: Some(BiEngineMode::Disabled),
            bi_engine_reasons: Some(vec![BiEngineReason {
                code: BiEngineCode::OtherReason,
                message: "BI Engine acceleration is not available in the local emulator".to_string(),
            }]),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DmlStats {
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub inserted_row_count: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub deleted_row_count: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub updated_row_count: Option<i64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatisticsQuery {
    pub statement_type: Option<String>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub total_bytes_processed: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub total_bytes_billed: Option<i64>,
    pub cache_hit: Option<bool>,
    pub bi_engine_statistics: Option<BiEngineStatistics>,
    pub dml_stats: Option<DmlStats>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub creation_time: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub start_time: Option<i64>,
    #[serde(default, deserialize_with = "super::from_str_option")]
    pub end_time: Option<i64>,
    pub query: Option<JobStatisticsQuery>,
    pub session_info: Option<SessionInfo>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub etag: String,
    pub id: Option<String>,
    pub self_link: Option<String>,
    pub job_reference: JobReference,
    pub configuration: JobConfiguration,
    pub status: JobStatus,
    pub statistics: Option<JobStatistics>,
    pub user_email: Option<String>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub kind: String,
    pub jobs: Vec<Job>,
    pub next_page_token: Option<String>,
}

/// Detects the job's statement type from the leading keyword of its query
/// text.
pub fn detect_statement_type(config: &JobConfiguration) -> Option<&'static str> {
    let query = config.query.as_ref()?;
    let trimmed = query.query.trim_start();
    let first_word = trimmed.split_whitespace().next().unwrap_or("").to_uppercase();
    Some(match first_word.as_str() {
        "SELECT" | "WITH" => "SELECT",
        "INSERT" => "INSERT",
        "UPDATE" => "UPDATE",
        "DELETE" => "DELETE",
        "MERGE" => "MERGE",
        "CREATE" if trimmed.to_uppercase().contains("FUNCTION") => "CREATE_FUNCTION",
        "CREATE" => "CREATE_TABLE",
        "DROP" => "DROP_TABLE",
        _ => "SCRIPT",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_select() {
        let config = JobConfiguration::for_query(JobConfigurationQuery {
            query: "SELECT 1".to_string(),
            ..Default::default()
        });
        assert_eq!(detect_statement_type(&config), Some("SELECT"));
    }

    #[test]
    fn detects_create_function() {
        let config = JobConfiguration::for_query(JobConfigurationQuery {
            query: "CREATE TEMP FUNCTION f() RETURNS INT64 LANGUAGE js AS \"return 1;\"".to_string(),
            ..Default::default()
        });
        assert_eq!(detect_statement_type(&config), Some("CREATE_FUNCTION"));
    }

    #[test]
    fn copy_key_serializes_unaliased() {
        let config = JobConfiguration {
            copy_: Some(JobConfigurationCopy::default()),
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert!(json.get("copy").is_some());
    }
}
