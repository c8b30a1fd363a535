use lakeflow::core::orchestrator::{ExecutionEngine, ExecutionStatus, StepStatus};
use lakeflow::core::services::sim::{
    InMemoryTopic, ScriptedOutcome, SimulatedBatchJob, SimulatedCrawler,
};
use lakeflow::core::services::ServiceSet;
use lakeflow::core::stack::{self, Stack};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
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
  max_retries: 1
  timeout_seconds: 600
topic:
  name: demo-topic
  subscriptions:
    - email: ops@example.com
workflow:
  execution_timeout_seconds: 900
  retry_backoff_ms: 100
  retry_jitter_ms: 0
  poll_interval_ms: 5000
"#;

struct Harness {
    crawler: Arc<SimulatedCrawler>,
    batch: Arc<SimulatedBatchJob>,
    topic: Arc<InMemoryTopic>,
    _state_dir: TempDir,
    engine: ExecutionEngine,
}

fn harness() -> Harness {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", STACK_YAML).unwrap();
    let stack: Stack = stack::assemble_from_file(file.path()).expect("valid stack");
    let crawler = Arc::new(SimulatedCrawler::new());
    let batch = Arc::new(SimulatedBatchJob::new());
    let topic = Arc::new(InMemoryTopic::new(vec!["ops@example.com".to_string()]));
    let services = ServiceSet {
        crawler: crawler.clone(),
        batch: batch.clone(),
        topic: topic.clone(),
    };
    let state_dir = TempDir::new().expect("state dir");
    let engine = ExecutionEngine::new(
        Arc::new(stack),
        services,
        state_dir.path().to_path_buf(),
    );
    Harness {
        crawler,
        batch,
        topic,
        _state_dir: state_dir,
        engine,
    }
}

#[tokio::test(start_paused = true)]
async fn job_budget_fires_before_the_execution_budget() {
    let harness = harness();
    // runs 11 minutes; the 10 minute job budget wins, well before 15 minutes
    harness
        .batch
        .enqueue(ScriptedOutcome::success_after(Duration::from_secs(660)));

    let started = tokio::time::Instant::now();
    let record = harness
        .engine
        .run_execution(json!({}))
        .await
        .expect("execution ran");
    let elapsed = started.elapsed();

    assert_eq!(record.status, ExecutionStatus::Failed);
    let transform = record.step("run_transform_job").expect("transform step recorded");
    assert_eq!(transform.status, StepStatus::Failed);
    assert_eq!(transform.error.as_ref().expect("error summary").code, "LFW-TIME-002");
    // a timed-out attempt is not retried
    assert_eq!(transform.attempts, 1);
    assert_eq!(harness.batch.start_count(), 1);
    assert!(elapsed >= Duration::from_secs(600));
    assert!(elapsed < Duration::from_secs(900));
    assert!(harness.topic.published().is_empty());
}

#[tokio::test(start_paused = true)]
async fn execution_budget_forces_timed_out_regardless_of_branch_progress() {
    let harness = harness();
    // crawl completion never arrives within the execution budget
    harness
        .crawler
        .enqueue(ScriptedOutcome::success_after(Duration::from_secs(3_600)));
    harness
        .batch
        .enqueue(ScriptedOutcome::success_after(Duration::from_secs(1)));

    let started = tokio::time::Instant::now();
    let record = harness
        .engine
        .run_execution(json!({}))
        .await
        .expect("execution ran");
    let elapsed = started.elapsed();

    assert_eq!(record.status, ExecutionStatus::TimedOut);
    assert_eq!(record.failure.as_ref().expect("failure summary").code, "LFW-TIME-001");
    // the parallel node never joined, so no branch record was written
    assert!(record.steps.is_empty());
    assert!(elapsed >= Duration::from_secs(900));
    assert!(elapsed < Duration::from_secs(1_000));
    assert!(harness.topic.published().is_empty());
    assert!(record.completed_at.is_some());
}
