#![allow(clippy::result_large_err)] // Store module returns AppError to preserve structured diagnostic context.

use crate::core::error::AppError;
use crate::core::orchestrator::record::{ExecutionRecord, ExecutionStatus};
use crate::core::types::ErrorCategory;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Paths under `<workspace>/.lakeflow/state/executions/<execution_id>`.
pub struct ExecutionStatePaths {
    pub execution_dir: PathBuf,
    pub execution_file: PathBuf,
}

impl ExecutionStatePaths {
    pub fn new(workspace_root: &Path, execution_id: &Uuid) -> Self {
        let execution_dir = Self::base(workspace_root).join(execution_id.to_string());
        let execution_file = execution_dir.join("execution.json");
        Self {
            execution_dir,
            execution_file,
        }
    }

    pub fn base(workspace_root: &Path) -> PathBuf {
        workspace_root.join(".lakeflow/state/executions")
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to create directory {}: {}", parent.display(), err),
            )
        })?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, data).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to write {}: {}", tmp_path.display(), err),
        )
    })?;
    fs::rename(&tmp_path, path).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!(
                "failed to rename {} -> {}: {}",
                tmp_path.display(),
                path.display(),
                err
            ),
        )
    })?;
    Ok(())
}

pub fn save_execution(workspace_root: &Path, record: &ExecutionRecord) -> Result<(), AppError> {
    let paths = ExecutionStatePaths::new(workspace_root, &record.execution_id);
    let content = serde_json::to_vec_pretty(record).map_err(|err| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("failed to serialize execution.json: {}", err),
        )
    })?;
    atomic_write(&paths.execution_file, &content)
}

pub fn load_execution(
    workspace_root: &Path,
    execution_id: &Uuid,
) -> Result<ExecutionRecord, AppError> {
    let paths = ExecutionStatePaths::new(workspace_root, execution_id);
    let bytes = fs::read(&paths.execution_file).map_err(|err| {
        AppError::new(
            ErrorCategory::IoError,
            format!("failed to read {}: {}", paths.execution_file.display(), err),
        )
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        AppError::new(
            ErrorCategory::SerializationError,
            format!("failed to deserialize execution.json: {}", err),
        )
    })
}

/// Lightweight listing row for `executions list`.
pub struct ExecutionSummary {
    pub execution_id: Uuid,
    pub stack_name: String,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
}

pub fn list_executions(workspace_root: &Path) -> Result<Vec<ExecutionSummary>, AppError> {
    let mut entries = Vec::new();
    let base = ExecutionStatePaths::base(workspace_root);
    if !base.exists() {
        return Ok(entries);
    }
    for entry in fs::read_dir(&base)
        .map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to list execution state: {}", err),
            )
        })?
        .flatten()
    {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(uuid) = Uuid::parse_str(&entry.file_name().to_string_lossy()) {
            if let Ok(record) = load_execution(workspace_root, &uuid) {
                entries.push(ExecutionSummary {
                    execution_id: record.execution_id,
                    stack_name: record.stack_name,
                    status: record.status,
                    started_at: record.started_at,
                });
            }
        }
    }
    entries.sort_by_key(|summary| summary.started_at);
    Ok(entries)
}
