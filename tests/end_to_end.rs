//! End-to-end scenarios exercising [`bq_emulator_core::Service`] the way a
//! collaborator HTTP dispatcher would: one call per endpoint, wire types in
//! and out.

use bq_emulator_core::config::Config;
use bq_emulator_core::service::Service;
use bq_emulator_core::wire::dataset::Dataset;
use bq_emulator_core::wire::job::{JobConfigurationQuery, JobConfiguration, JobState};
use bq_emulator_core::wire::query::{QueryParameter, QueryParameterType, QueryParameterValue, QueryRequest};
use bq_emulator_core::wire::table::{FieldMode, FieldType, Table, TableFieldSchema, TableSchema};
use bq_emulator_core::wire::tabledata::{InsertAllRequest, InsertAllRow};

fn service() -> (Service, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    (Service::open(config).unwrap(), dir)
}

fn field(name: &str, field_type: FieldType) -> TableFieldSchema {
    TableFieldSchema {
        name: name.to_string(),
        field_type,
        mode: FieldMode::Nullable,
        fields: None,
        range_element_type: None,
        description: None,
    }
}

#[test]
fn minimal_select() {
    let (service, _dir) = service();
    let response = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT 1 AS a".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    assert!(response.job_complete);
    assert_eq!(response.total_rows, Some(1));
    let schema = response.schema_.unwrap();
    assert_eq!(schema.fields.len(), 1);
    assert_eq!(schema.fields[0].name, "a");
    assert_eq!(schema.fields[0].field_type, FieldType::Integer);
    let rows = response.rows.unwrap();
    assert_eq!(rows[0].f[0].v, Some(bq_emulator_core::wire::tabledata::Value::String("1".to_string())));
}

#[test]
fn create_insert_select_round_trips_rows() {
    let (service, _dir) = service();
    service
        .insert_dataset("p", "d", Dataset::default())
        .unwrap();
    service
        .insert_table(
            "p",
            "d",
            "t1",
            Table {
                schema_: Some(TableSchema {
                    fields: vec![field("id", FieldType::Integer), field("ts", FieldType::Timestamp)],
                }),
                ..Default::default()
            },
        )
        .unwrap();

    let mut request = InsertAllRequest::default();
    for (id, ts) in [(1, "2023-01-01 00:00:00"), (2, "2023-01-02 00:00:00")] {
        let mut row = std::collections::HashMap::new();
        row.insert("id".to_string(), serde_json::json!(id));
        row.insert("ts".to_string(), serde_json::json!(ts));
        request.rows.push(InsertAllRow { insert_id: None, json_: row });
    }
    let inserted = service.insert_all("p", "d", "t1", request).unwrap();
    assert!(inserted.insert_errors.is_empty());

    let response = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT id FROM p.d.t1 ORDER BY id".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(response.total_rows, Some(2));
    let rows = response.rows.unwrap();
    assert_eq!(
        rows[0].f[0].v,
        Some(bq_emulator_core::wire::tabledata::Value::String("1".to_string()))
    );
    assert_eq!(
        rows[1].f[0].v,
        Some(bq_emulator_core::wire::tabledata::Value::String("2".to_string()))
    );
}

#[test]
fn json_column_field_access() {
    let (service, _dir) = service();
    service.insert_dataset("p", "d", Dataset::default()).unwrap();
    service
        .insert_table(
            "p",
            "d",
            "t2",
            Table {
                schema_: Some(TableSchema {
                    fields: vec![field("data", FieldType::Json)],
                }),
                ..Default::default()
            },
        )
        .unwrap();

    let mut row = std::collections::HashMap::new();
    row.insert("data".to_string(), serde_json::json!(r#"{"x":1,"y":2,"$tricky":"z"}"#));
    let request = InsertAllRequest {
        rows: vec![InsertAllRow { insert_id: None, json_: row }],
        ..Default::default()
    };
    service.insert_all("p", "d", "t2", request).unwrap();

    let response = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT data->>'x' AS x FROM p.d.t2".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(response.total_rows, Some(1));
}

#[test]
fn named_parameter_filters_a_single_row() {
    let (service, _dir) = service();
    service.insert_dataset("p", "d", Dataset::default()).unwrap();
    service
        .insert_table(
            "p",
            "d",
            "t3",
            Table {
                schema_: Some(TableSchema {
                    fields: vec![field("data", FieldType::String)],
                }),
                ..Default::default()
            },
        )
        .unwrap();
    let mut request = InsertAllRequest::default();
    for value in ["one", "two", "three"] {
        let mut row = std::collections::HashMap::new();
        row.insert("data".to_string(), serde_json::json!(value));
        request.rows.push(InsertAllRow { insert_id: None, json_: row });
    }
    service.insert_all("p", "d", "t3", request).unwrap();

    let response = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT * FROM p.d.t3 WHERE data = @arg".to_string(),
                query_parameters: Some(vec![QueryParameter {
                    name: Some("arg".to_string()),
                    parameter_type: QueryParameterType::scalar("STRING"),
                    parameter_value: QueryParameterValue {
                        value: Some("one".to_string()),
                        ..Default::default()
                    },
                }]),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(response.total_rows, Some(1));
    let rows = response.rows.unwrap();
    assert_eq!(
        rows[0].f[0].v,
        Some(bq_emulator_core::wire::tabledata::Value::String("one".to_string()))
    );
}

#[test]
fn wildcard_union_carries_table_suffix() {
    let (service, _dir) = service();
    service.insert_dataset("p", "d", Dataset::default()).unwrap();
    for (suffix, id) in [("1", 1), ("2", 2), ("3", 3)] {
        let table_id = format!("t{suffix}");
        service
            .insert_table(
                "p",
                "d",
                &table_id,
                Table {
                    schema_: Some(TableSchema { fields: vec![field("id", FieldType::Integer)] }),
                    ..Default::default()
                },
            )
            .unwrap();
        let mut row = std::collections::HashMap::new();
        row.insert("id".to_string(), serde_json::json!(id));
        service
            .insert_all(
                "p",
                "d",
                &table_id,
                InsertAllRequest {
                    rows: vec![InsertAllRow { insert_id: None, json_: row }],
                    ..Default::default()
                },
            )
            .unwrap();
    }

    let response = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT * FROM p.d.t*".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(response.total_rows, Some(3));
}

#[test]
fn js_udf_call_is_constant_folded_and_executed() {
    let (service, _dir) = service();
    let response = service
        .query(
            "p",
            QueryRequest {
                query: "CREATE TEMP FUNCTION mul(x FLOAT64, y FLOAT64) RETURNS FLOAT64 LANGUAGE js AS \"return x*y;\"; SELECT mul(3,15) AS r".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(response.job_complete);
    let schema = response.schema_.unwrap();
    assert_eq!(schema.fields[0].name, "r");
    let rows = response.rows.unwrap();
    assert_eq!(
        rows[0].f[0].v,
        Some(bq_emulator_core::wire::tabledata::Value::String("45".to_string()))
    );
}

#[test]
fn job_lifecycle_insert_get_results_delete() {
    let (service, _dir) = service();
    let job = bq_emulator_core::wire::job::Job {
        job_reference: bq_emulator_core::wire::JobReference {
            project_id: "p".to_string(),
            job_id: "job-1".to_string(),
            location: None,
        },
        configuration: JobConfiguration::for_query(JobConfigurationQuery {
            query: "SELECT 1".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    let submitted = service.insert_job("p", job).unwrap();
    assert_eq!(submitted.status.state, JobState::Done);

    let results = service.get_query_results("p", "job-1").unwrap();
    assert_eq!(results.total_rows, Some(1));

    service.delete_job("p", "job-1").unwrap();
    assert!(service.get_job("p", "job-1").is_err());
}

#[test]
fn missing_dataset_maps_to_not_found() {
    let (service, _dir) = service();
    let err = service.get_dataset("p", "nope").unwrap_err();
    let (status, _) = bq_emulator_core::error::map_error(&err);
    assert_eq!(status, 404);
}

#[test]
fn wildcard_with_no_matching_tables_is_invalid_query() {
    let (service, _dir) = service();
    service.insert_dataset("p", "d", Dataset::default()).unwrap();
    let err = service
        .query(
            "p",
            QueryRequest {
                query: "SELECT * FROM p.d.nomatch*".to_string(),
                ..Default::default()
            },
        )
        .unwrap_err();
    let (status, _) = bq_emulator_core::error::map_error(&err);
    assert_eq!(status, 400);
}
