#![allow(clippy::result_large_err)] // Manifest APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

const SUPPORTED_VERSION: &str = "1";

fn default_source() -> String {
    "object-storage".to_string()
}

fn default_table_prefix() -> String {
    "demo_".to_string()
}

fn default_max_retries() -> u32 {
    1
}

fn default_job_timeout_seconds() -> u64 {
    600
}

fn default_worker_count() -> u32 {
    2
}

fn default_worker_type() -> String {
    "standard".to_string()
}

fn default_execution_timeout_seconds() -> u64 {
    900
}

fn default_success_message() -> String {
    "The transform job and metadata crawl have completed successfully!".to_string()
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_retry_jitter_ms() -> u64 {
    250
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// Root document for a declarative stack definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StackManifest {
    pub version: String,
    pub name: String,
    pub buckets: Vec<BucketSpec>,
    pub catalog: CatalogSpec,
    pub crawler: CrawlerSpec,
    pub transform_job: TransformJobSpec,
    pub topic: TopicSpec,
    #[serde(default)]
    pub trigger: TriggerSettings,
    #[serde(default)]
    pub workflow: WorkflowSettings,
}

/// A named bucket and the role it plays in the stack.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BucketSpec {
    pub name: String,
    pub role: BucketRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketRole {
    Source,
    Destination,
}

/// Metadata catalog the crawler populates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogSpec {
    pub database: String,
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
}

/// Crawler identity and how its branch treats completion.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerSpec {
    pub name: String,
    #[serde(default)]
    pub completion: CompletionMode,
}

/// Whether the crawl branch blocks until the crawler reports a terminal
/// state, or returns once the start call is accepted. `StartOnly` leaves
/// crawl failures unobserved by the workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionMode {
    #[default]
    AwaitCompletion,
    StartOnly,
}

/// Batch transform job identity and run budget.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransformJobSpec {
    pub name: String,
    pub script_location: String,
    #[serde(default)]
    pub bookmark_enabled: bool,
    #[serde(default)]
    pub metrics_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_job_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_worker_count")]
    pub worker_count: u32,
    #[serde(default = "default_worker_type")]
    pub worker_type: String,
}

/// Notification topic and its subscribers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TopicSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Subscription {
    pub email: String,
}

/// Trigger predicate settings. The detail type is always "Object Created";
/// the matched bucket is always the stack's source bucket.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TriggerSettings {
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

/// Execution settings applied to every workflow run of the stack.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowSettings {
    #[serde(default = "default_execution_timeout_seconds")]
    pub execution_timeout_seconds: u64,
    #[serde(default = "default_success_message")]
    pub success_message: String,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            execution_timeout_seconds: default_execution_timeout_seconds(),
            success_message: default_success_message(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl StackManifest {
    /// Load and validate a stack manifest from a YAML file. Environment
    /// variables override manifest values before validation. Returns the
    /// manifest together with the SHA-256 of the file contents.
    pub fn load_from_file(path: &Path) -> Result<(Self, String), AppError> {
        let bytes = fs::read(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read {}: {}", path.display(), err),
            )
        })?;
        let mut manifest: StackManifest = serde_yaml::from_slice(&bytes).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("failed to parse {}: {}", path.display(), err),
            )
        })?;
        manifest.apply_env_overrides();
        manifest.validate()?;
        Ok((manifest, crate::core::stack::compute_sha256_hex(&bytes)))
    }

    /// Environment variables take precedence over manifest values.
    fn apply_env_overrides(&mut self) {
        if let Ok(name) = env::var("LAKEFLOW_SOURCE_BUCKET") {
            if let Some(bucket) = self
                .buckets
                .iter_mut()
                .find(|b| b.role == BucketRole::Source)
            {
                bucket.name = name;
            }
        }
        if let Ok(name) = env::var("LAKEFLOW_DESTINATION_BUCKET") {
            if let Some(bucket) = self
                .buckets
                .iter_mut()
                .find(|b| b.role == BucketRole::Destination)
            {
                bucket.name = name;
            }
        }
        if let Ok(name) = env::var("LAKEFLOW_TOPIC_NAME") {
            self.topic.name = name;
        }
        if let Ok(value) = env::var("LAKEFLOW_EXECUTION_TIMEOUT_SECONDS") {
            if let Ok(seconds) = value.parse::<u64>() {
                self.workflow.execution_timeout_seconds = seconds;
            }
        }
        if let Ok(value) = env::var("LAKEFLOW_JOB_TIMEOUT_SECONDS") {
            if let Ok(seconds) = value.parse::<u64>() {
                self.transform_job.timeout_seconds = seconds;
            }
        }
    }

    /// Validate the manifest against schema requirements.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.version != SUPPORTED_VERSION {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!(
                    "unsupported manifest version {}, expected {}",
                    self.version, SUPPORTED_VERSION
                ),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "stack name must not be empty",
            ));
        }

        let mut names = HashSet::new();
        for bucket in &self.buckets {
            if bucket.name.trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    "bucket name must not be empty",
                ));
            }
            if !names.insert(bucket.name.clone()) {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("duplicate bucket name: {}", bucket.name),
                ));
            }
        }
        self.bucket_with_role(BucketRole::Source)?;
        self.bucket_with_role(BucketRole::Destination)?;

        for (field, value) in [
            ("catalog.database", &self.catalog.database),
            ("crawler.name", &self.crawler.name),
            ("transform_job.name", &self.transform_job.name),
            ("transform_job.script_location", &self.transform_job.script_location),
            ("topic.name", &self.topic.name),
            ("trigger.source", &self.trigger.source),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("{} must not be empty", field),
                ));
            }
        }

        if self.transform_job.timeout_seconds == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "transform_job.timeout_seconds must be >= 1",
            ));
        }
        if self.workflow.execution_timeout_seconds == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "workflow.execution_timeout_seconds must be >= 1",
            ));
        }
        if self.transform_job.timeout_seconds >= self.workflow.execution_timeout_seconds {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "transform_job.timeout_seconds must be below workflow.execution_timeout_seconds",
            ));
        }
        if self.workflow.poll_interval_ms == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "workflow.poll_interval_ms must be >= 1",
            ));
        }
        if self.transform_job.worker_count == 0 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "transform_job.worker_count must be >= 1",
            ));
        }

        Ok(())
    }

    /// Return the single bucket declared with the given role.
    pub fn bucket_with_role(&self, role: BucketRole) -> Result<&BucketSpec, AppError> {
        let mut matches = self.buckets.iter().filter(|b| b.role == role);
        let bucket = matches.next().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("manifest declares no {:?} bucket", role),
            )
        })?;
        if matches.next().is_some() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("manifest declares more than one {:?} bucket", role),
            ));
        }
        Ok(bucket)
    }

    pub fn source_bucket(&self) -> &str {
        // validate() guarantees exactly one source bucket
        self.buckets
            .iter()
            .find(|b| b.role == BucketRole::Source)
            .map(|b| b.name.as_str())
            .unwrap_or_default()
    }

    pub fn destination_bucket(&self) -> &str {
        self.buckets
            .iter()
            .find(|b| b.role == BucketRole::Destination)
            .map(|b| b.name.as_str())
            .unwrap_or_default()
    }

    /// Arguments passed to every run of the transform job.
    pub fn job_arguments(&self) -> Vec<(String, String)> {
        let mut args = Vec::new();
        if self.transform_job.bookmark_enabled {
            args.push((
                "--job-bookmark-option".to_string(),
                "job-bookmark-enable".to_string(),
            ));
        }
        if self.transform_job.metrics_enabled {
            args.push(("--enable-metrics".to_string(), String::new()));
        }
        args.push((
            "--source_bucket".to_string(),
            self.source_bucket().to_string(),
        ));
        args.push((
            "--destination_bucket".to_string(),
            self.destination_bucket().to_string(),
        ));
        args
    }
}
