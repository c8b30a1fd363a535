#![allow(clippy::result_large_err)] // Assembly returns AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::orchestrator::definition::WorkflowDefinition;
use crate::core::stack::grants::{self, GrantSet};
use crate::core::stack::manifest::StackManifest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Identifiers exposed for operator consumption and downstream automation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentOutputs {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub workflow_role: String,
    pub batch_role: String,
    pub catalog_database: String,
}

/// A fully assembled stack: validated manifest, workflow definition, derived
/// grants, and deployment outputs. Assembly happens once; the result is
/// immutable for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct Stack {
    pub manifest: StackManifest,
    pub manifest_hash: String,
    pub definition: WorkflowDefinition,
    pub grants: GrantSet,
    pub outputs: DeploymentOutputs,
}

/// Assemble a stack from an already validated manifest.
pub fn assemble(manifest: StackManifest, manifest_hash: String) -> Result<Stack, AppError> {
    let definition = WorkflowDefinition::from_manifest(&manifest)?;
    let grants = grants::derive_grants(&definition, &manifest);
    grants::verify_coverage(&grants, &definition, &manifest)?;
    let outputs = DeploymentOutputs {
        source_bucket: manifest.source_bucket().to_string(),
        destination_bucket: manifest.destination_bucket().to_string(),
        workflow_role: format!("role/{}-workflow-engine", manifest.name),
        batch_role: format!("role/{}-batch-engine", manifest.name),
        catalog_database: manifest.catalog.database.clone(),
    };
    info!(
        stack = %manifest.name,
        grants = grants.grants().len(),
        "stack assembled"
    );
    Ok(Stack {
        manifest,
        manifest_hash,
        definition,
        grants,
        outputs,
    })
}

/// Load a manifest from disk and assemble it.
pub fn assemble_from_file(path: &Path) -> Result<Stack, AppError> {
    let (manifest, manifest_hash) = StackManifest::load_from_file(path)?;
    assemble(manifest, manifest_hash)
}
