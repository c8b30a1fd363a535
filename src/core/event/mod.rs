//! Storage event model consumed by trigger rules.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Detail type emitted by object storage when an object lands in a bucket.
pub const OBJECT_CREATED: &str = "Object Created";

/// Inbound event envelope. The wire shape uses `detail-type` and nests the
/// bucket and object under `detail`; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEvent {
    pub source: String,
    #[serde(rename = "detail-type")]
    pub detail_type: String,
    pub detail: EventDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDetail {
    pub bucket: BucketRef,
    #[serde(default)]
    pub object: Option<ObjectRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub etag: Option<String>,
}

impl StorageEvent {
    /// Parse an event from its JSON payload. The payload is kept verbatim by
    /// the caller; parsing only extracts the attributes trigger rules match on.
    pub fn parse(payload: &Value) -> Result<Self, AppError> {
        serde_json::from_value(payload.clone()).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("malformed storage event: {}", err),
            )
            .with_code("LFW-EVT-001")
        })
    }

    /// Read and parse an event payload from a JSON file.
    pub fn load_from_file(path: &Path) -> Result<(Self, Value), AppError> {
        let text = fs::read_to_string(path).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read event file {}: {}", path.display(), err),
            )
        })?;
        let payload: Value = serde_json::from_str(&text).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("failed to parse event file {}: {}", path.display(), err),
            )
            .with_code("LFW-EVT-001")
        })?;
        let event = Self::parse(&payload)?;
        Ok((event, payload))
    }

    pub fn bucket_name(&self) -> &str {
        &self.detail.bucket.name
    }
}
