use lakeflow::core::stack::grants::{
    self, bucket_objects_resource, crawler_resource, job_resource, topic_resource,
    workflow_resource, Action, Principal,
};
use lakeflow::core::stack::{self, Stack};
use std::io::Write;
use tempfile::NamedTempFile;

fn stack_yaml(completion: &str) -> String {
    format!(
        r#"
version: "1"
name: demo-ingestion
buckets:
  - name: src-bucket
    role: source
  - name: dst-bucket
    role: destination
catalog:
  database: demo_db
crawler:
  name: demo-crawler
  completion: {completion}
transform_job:
  name: demo-etl
  script_location: store://scripts/etl.py
topic:
  name: demo-topic
  subscriptions:
    - email: ops@example.com
"#
    )
}

fn build_stack(completion: &str) -> Stack {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", stack_yaml(completion)).unwrap();
    stack::assemble_from_file(file.path()).expect("valid stack")
}

#[test]
fn derived_grants_cover_every_step_action() {
    let stack = build_stack("await_completion");
    let grants = &stack.grants;

    assert!(grants.allows(
        Principal::EventBus,
        Action::WorkflowStartExecution,
        &workflow_resource("demo-ingestion")
    ));
    assert!(grants.allows(
        Principal::WorkflowEngine,
        Action::CatalogStartCrawl,
        &crawler_resource("demo-crawler")
    ));
    assert!(grants.allows(
        Principal::WorkflowEngine,
        Action::CatalogGetCrawl,
        &crawler_resource("demo-crawler")
    ));
    assert!(grants.allows(
        Principal::WorkflowEngine,
        Action::BatchStartJobRun,
        &job_resource("demo-etl")
    ));
    assert!(grants.allows(
        Principal::WorkflowEngine,
        Action::BatchGetJobRun,
        &job_resource("demo-etl")
    ));
    assert!(grants.allows(
        Principal::WorkflowEngine,
        Action::TopicPublish,
        &topic_resource("demo-topic")
    ));
    assert!(grants.allows(
        Principal::BatchEngine,
        Action::StorageGetObject,
        "bucket/src-bucket/report.csv"
    ));
    assert!(grants.allows(
        Principal::BatchEngine,
        Action::StoragePutObject,
        "bucket/dst-bucket/report.parquet"
    ));
}

#[test]
fn grants_stay_least_privilege() {
    let stack = build_stack("await_completion");
    let grants = &stack.grants;

    assert!(!grants.allows(
        Principal::WorkflowEngine,
        Action::StoragePutObject,
        &bucket_objects_resource("dst-bucket")
    ));
    assert!(!grants.allows(
        Principal::BatchEngine,
        Action::TopicPublish,
        &topic_resource("demo-topic")
    ));
    assert!(!grants.allows(
        Principal::EventBus,
        Action::BatchStartJobRun,
        &job_resource("demo-etl")
    ));
    assert!(!grants.allows(
        Principal::BatchEngine,
        Action::StoragePutObject,
        "bucket/src-bucket/report.csv"
    ));
}

#[test]
fn start_only_mode_drops_the_poll_grant() {
    let stack = build_stack("start_only");
    assert!(stack.grants.allows(
        Principal::WorkflowEngine,
        Action::CatalogStartCrawl,
        &crawler_resource("demo-crawler")
    ));
    assert!(!stack.grants.allows(
        Principal::WorkflowEngine,
        Action::CatalogGetCrawl,
        &crawler_resource("demo-crawler")
    ));
}

#[test]
fn coverage_check_flags_a_missing_principal() {
    let stack = build_stack("await_completion");
    grants::verify_coverage(&stack.grants, &stack.definition, &stack.manifest)
        .expect("derived grants cover all steps");

    let stripped = stack.grants.without_principal(Principal::BatchEngine);
    let err = grants::verify_coverage(&stripped, &stack.definition, &stack.manifest)
        .expect_err("stripped grants must fail coverage");
    assert_eq!(err.code, "LFW-AUTH-001");
    assert!(err.message.contains("batch-engine"));
}
