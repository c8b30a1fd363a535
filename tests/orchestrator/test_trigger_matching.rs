use lakeflow::core::event::StorageEvent;
use lakeflow::core::orchestrator::{store, ExecutionEngine};
use lakeflow::core::services::sim::{InMemoryTopic, SimulatedBatchJob, SimulatedCrawler};
use lakeflow::core::services::ServiceSet;
use lakeflow::core::stack::{self, Principal, Stack};
use lakeflow::core::trigger::{TriggerRouter, TriggerRule};
use serde_json::{json, Value};
use std::io::Write;
use std::sync::Arc;
use tempfile::{NamedTempFile, TempDir};

const STACK_YAML: &str = r#"
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
transform_job:
  name: demo-etl
  script_location: store://scripts/etl.py
topic:
  name: demo-topic
  subscriptions:
    - email: ops@example.com
workflow:
  retry_backoff_ms: 100
  retry_jitter_ms: 0
  poll_interval_ms: 50
"#;

fn build_stack() -> Stack {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", STACK_YAML).unwrap();
    stack::assemble_from_file(file.path()).expect("valid stack")
}

fn object_created(source: &str, detail_type: &str, bucket: &str) -> Value {
    json!({
        "source": source,
        "detail-type": detail_type,
        "detail": {
            "bucket": {"name": bucket},
            "object": {"key": "report.csv"}
        }
    })
}

#[test]
fn rule_matches_only_the_configured_shape() {
    let stack = build_stack();
    let router = TriggerRouter::for_stack(&stack).expect("router");

    let matched = StorageEvent::parse(&object_created(
        "object-storage",
        "Object Created",
        "src-bucket",
    ))
    .unwrap();
    assert!(router.route(&matched).is_some());

    for payload in [
        object_created("object-storage", "Object Created", "dst-bucket"),
        object_created("object-storage", "Object Removed", "src-bucket"),
        object_created("message-bus", "Object Created", "src-bucket"),
    ] {
        let event = StorageEvent::parse(&payload).unwrap();
        assert!(router.route(&event).is_none());
    }
}

#[test]
fn duplicate_rules_are_rejected() {
    let mut router = TriggerRouter::new();
    let rule = TriggerRule::object_created("object-storage", "src-bucket", "demo-ingestion");
    router.register(rule.clone()).expect("first registration");
    let err = router.register(rule).expect_err("duplicate registration");
    assert_eq!(err.code, "LFW-TRG-001");
}

#[tokio::test(start_paused = true)]
async fn non_matching_event_starts_nothing() {
    let stack = Arc::new(build_stack());
    let state_dir = TempDir::new().expect("state dir");
    let services = ServiceSet {
        crawler: Arc::new(SimulatedCrawler::new()),
        batch: Arc::new(SimulatedBatchJob::new()),
        topic: Arc::new(InMemoryTopic::new(vec!["ops@example.com".to_string()])),
    };
    let engine = ExecutionEngine::new(
        Arc::clone(&stack),
        services,
        state_dir.path().to_path_buf(),
    );

    let payload = object_created("object-storage", "Object Created", "other-bucket");
    let outcome = engine.handle_event(&payload).await.expect("no error");
    assert!(outcome.is_none());
    assert!(store::list_executions(state_dir.path())
        .expect("listing")
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_start_execution_grant_errors_at_the_eventing_layer() {
    let stack = Arc::new(build_stack());
    let state_dir = TempDir::new().expect("state dir");
    let services = ServiceSet {
        crawler: Arc::new(SimulatedCrawler::new()),
        batch: Arc::new(SimulatedBatchJob::new()),
        topic: Arc::new(InMemoryTopic::new(vec!["ops@example.com".to_string()])),
    };
    let engine = ExecutionEngine::new(
        Arc::clone(&stack),
        services,
        state_dir.path().to_path_buf(),
    )
    .with_grant_set(stack.grants.without_principal(Principal::EventBus));

    let payload = object_created("object-storage", "Object Created", "src-bucket");
    let err = engine.handle_event(&payload).await.expect_err("auth error");
    assert_eq!(err.code, "LFW-AUTH-001");
    assert!(store::list_executions(state_dir.path())
        .expect("listing")
        .is_empty());
}
