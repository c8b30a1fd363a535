use crate::core::error::AppError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Version embedded in persisted execution files.
pub const EXECUTION_FORMAT_VERSION: &str = "1";

fn default_trigger_payload_value() -> Value {
    Value::Object(Map::new())
}

/// Terminal and in-flight states of one workflow execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    #[default]
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "Running",
            ExecutionStatus::Completed => "Completed",
            ExecutionStatus::Failed => "Failed",
            ExecutionStatus::TimedOut => "TimedOut",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

/// Step outcome for persisted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
        }
    }
}

/// Simplified summary of errors persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppErrorSummary {
    pub code: String,
    pub category: String,
    pub message: String,
}

/// Create a persistable summary of an AppError.
pub fn summarize_error(error: &AppError) -> AppErrorSummary {
    AppErrorSummary {
        code: error.code.clone(),
        category: format!("{:?}", error.category),
        message: error.message.clone(),
    }
}

/// Run record for one step of an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step_id: String,
    pub branch: Option<String>,
    pub result_key: String,
    pub attempts: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: StepStatus,
    pub output: Value,
    pub error: Option<AppErrorSummary>,
}

impl StepRecord {
    pub fn duration_ms(&self) -> u64 {
        self.completed_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Workflow execution metadata persisted under `.lakeflow/state/executions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub format_version: String,
    pub execution_id: Uuid,
    pub stack_name: String,
    pub manifest_hash: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    #[serde(default = "default_trigger_payload_value")]
    pub trigger_payload: Value,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub failure: Option<AppErrorSummary>,
}

impl ExecutionRecord {
    pub fn new(stack_name: String, manifest_hash: String, trigger_payload: Value) -> Self {
        ExecutionRecord {
            format_version: EXECUTION_FORMAT_VERSION.to_string(),
            execution_id: Uuid::new_v4(),
            stack_name,
            manifest_hash,
            started_at: Utc::now(),
            completed_at: None,
            status: ExecutionStatus::Running,
            trigger_payload,
            steps: Vec::new(),
            failure: None,
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|step| step.step_id == step_id)
    }
}
