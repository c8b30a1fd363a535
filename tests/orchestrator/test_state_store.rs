use chrono::Utc;
use lakeflow::core::orchestrator::record::{
    ExecutionRecord, ExecutionStatus, StepRecord, StepStatus,
};
use lakeflow::core::orchestrator::store::{self, ExecutionStatePaths};
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

fn sample_record() -> ExecutionRecord {
    let mut record = ExecutionRecord::new(
        "demo-ingestion".to_string(),
        "ab".repeat(32),
        json!({"source": "object-storage"}),
    );
    record.status = ExecutionStatus::Completed;
    record.completed_at = Some(Utc::now());
    record.steps.push(StepRecord {
        step_id: "run_transform_job".to_string(),
        branch: Some("transform".to_string()),
        result_key: "etl_job".to_string(),
        attempts: 2,
        started_at: record.started_at,
        completed_at: Utc::now(),
        status: StepStatus::Success,
        output: json!({"run_id": "jr-0001"}),
        error: None,
    });
    record
}

#[test]
fn save_then_load_round_trips_the_record() {
    let workspace = TempDir::new().expect("workspace");
    let record = sample_record();
    store::save_execution(workspace.path(), &record).expect("saved");

    let paths = ExecutionStatePaths::new(workspace.path(), &record.execution_id);
    assert!(paths.execution_file.exists());
    assert!(!paths.execution_file.with_extension("tmp").exists());

    let loaded = store::load_execution(workspace.path(), &record.execution_id).expect("loaded");
    assert_eq!(loaded.execution_id, record.execution_id);
    assert_eq!(loaded.status, ExecutionStatus::Completed);
    assert_eq!(loaded.stack_name, "demo-ingestion");
    assert_eq!(loaded.steps.len(), 1);
    assert_eq!(loaded.steps[0].attempts, 2);
    assert_eq!(loaded.trigger_payload, json!({"source": "object-storage"}));
}

#[test]
fn save_overwrites_earlier_state_transitions() {
    let workspace = TempDir::new().expect("workspace");
    let mut record = sample_record();
    record.status = ExecutionStatus::Running;
    record.completed_at = None;
    store::save_execution(workspace.path(), &record).expect("saved running");

    record.status = ExecutionStatus::Failed;
    record.completed_at = Some(Utc::now());
    store::save_execution(workspace.path(), &record).expect("saved terminal");

    let loaded = store::load_execution(workspace.path(), &record.execution_id).expect("loaded");
    assert_eq!(loaded.status, ExecutionStatus::Failed);
    assert!(loaded.completed_at.is_some());
}

#[test]
fn list_returns_executions_oldest_first() {
    let workspace = TempDir::new().expect("workspace");
    let mut first = sample_record();
    first.started_at = Utc::now() - chrono::Duration::minutes(5);
    let second = sample_record();
    store::save_execution(workspace.path(), &second).expect("saved second");
    store::save_execution(workspace.path(), &first).expect("saved first");

    let listed = store::list_executions(workspace.path()).expect("listed");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].execution_id, first.execution_id);
    assert_eq!(listed[1].execution_id, second.execution_id);
}

#[test]
fn loading_an_unknown_execution_errors() {
    let workspace = TempDir::new().expect("workspace");
    let err = store::load_execution(workspace.path(), &Uuid::new_v4()).expect_err("missing");
    assert!(err.message.contains("failed to read"));
}
