use lakeflow::core::stack::manifest::{CompletionMode, StackManifest};
use std::io::Write;
use tempfile::NamedTempFile;

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
  bookmark_enabled: true
  metrics_enabled: true
topic:
  name: demo-topic
  subscriptions:
    - email: ops@example.com
"#;

fn write_manifest(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    write!(file, "{}", yaml).unwrap();
    file
}

#[test]
fn loads_manifest_with_defaults() {
    let file = write_manifest(STACK_YAML);
    let (manifest, hash) = StackManifest::load_from_file(file.path()).expect("valid manifest");
    assert_eq!(manifest.name, "demo-ingestion");
    assert_eq!(manifest.source_bucket(), "src-bucket");
    assert_eq!(manifest.destination_bucket(), "dst-bucket");
    assert_eq!(manifest.crawler.completion, CompletionMode::AwaitCompletion);
    assert_eq!(manifest.catalog.table_prefix, "demo_");
    assert_eq!(manifest.transform_job.max_retries, 1);
    assert_eq!(manifest.transform_job.timeout_seconds, 600);
    assert_eq!(manifest.workflow.execution_timeout_seconds, 900);
    assert_eq!(manifest.trigger.source, "object-storage");
    assert_eq!(hash.len(), 64);
}

#[test]
fn job_arguments_carry_buckets_and_flags() {
    let file = write_manifest(STACK_YAML);
    let (manifest, _) = StackManifest::load_from_file(file.path()).expect("valid manifest");
    let args = manifest.job_arguments();
    assert_eq!(
        args,
        vec![
            (
                "--job-bookmark-option".to_string(),
                "job-bookmark-enable".to_string()
            ),
            ("--enable-metrics".to_string(), String::new()),
            ("--source_bucket".to_string(), "src-bucket".to_string()),
            ("--destination_bucket".to_string(), "dst-bucket".to_string()),
        ]
    );
}

#[test]
fn rejects_missing_destination_bucket() {
    let yaml = STACK_YAML.replace(
        "  - name: dst-bucket\n    role: destination\n",
        "",
    );
    let file = write_manifest(&yaml);
    let err = StackManifest::load_from_file(file.path()).expect_err("no destination bucket");
    assert!(err.message.contains("Destination"));
}

#[test]
fn rejects_duplicate_bucket_names() {
    let yaml = STACK_YAML.replace("name: dst-bucket", "name: src-bucket");
    let file = write_manifest(&yaml);
    let err = StackManifest::load_from_file(file.path()).expect_err("duplicate names");
    assert!(err.message.contains("duplicate bucket name"));
}

#[test]
fn rejects_job_timeout_at_or_above_execution_timeout() {
    let yaml = format!(
        "{}workflow:\n  execution_timeout_seconds: 600\n",
        STACK_YAML
    );
    let file = write_manifest(&yaml);
    let err = StackManifest::load_from_file(file.path()).expect_err("timeout ordering");
    assert!(err.message.contains("transform_job.timeout_seconds"));
}

#[test]
fn rejects_unsupported_version() {
    let yaml = STACK_YAML.replace("version: \"1\"", "version: \"2\"");
    let file = write_manifest(&yaml);
    let err = StackManifest::load_from_file(file.path()).expect_err("bad version");
    assert!(err.message.contains("unsupported manifest version"));
}
