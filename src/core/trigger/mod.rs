#![allow(clippy::result_large_err)] // Trigger helpers return AppError for consistent diagnostics.

//! Trigger rules: predicate-to-target bindings that start a workflow
//! execution on matching storage events.

use crate::core::error::AppError;
use crate::core::event::{StorageEvent, OBJECT_CREATED};
use crate::core::stack::Stack;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};

/// Predicate over event attributes bound to a workflow target. A rule
/// matches when source, detail type, and bucket name all agree; anything
/// else is silently ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub source: String,
    pub detail_type: String,
    pub bucket_name: String,
    pub target: String,
}

impl TriggerRule {
    /// The rule a stack declares: object created in the source bucket starts
    /// the stack's workflow.
    pub fn object_created(source: &str, bucket_name: &str, target: &str) -> Self {
        TriggerRule {
            source: source.to_string(),
            detail_type: OBJECT_CREATED.to_string(),
            bucket_name: bucket_name.to_string(),
            target: target.to_string(),
        }
    }

    pub fn matches(&self, event: &StorageEvent) -> bool {
        event.source == self.source
            && event.detail_type == self.detail_type
            && event.bucket_name() == self.bucket_name
    }

    fn shape(&self) -> (&str, &str, &str, &str) {
        (
            &self.source,
            &self.detail_type,
            &self.bucket_name,
            &self.target,
        )
    }
}

/// Rule set for a deployment. One rule per distinct (event-shape, target)
/// pair; a duplicate would start duplicate executions per event, so
/// registration rejects it outright.
#[derive(Debug, Clone, Default)]
pub struct TriggerRouter {
    rules: Vec<TriggerRule>,
}

impl TriggerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_stack(stack: &Stack) -> Result<Self, AppError> {
        let mut router = TriggerRouter::new();
        router.register(TriggerRule::object_created(
            &stack.manifest.trigger.source,
            stack.manifest.source_bucket(),
            &stack.definition.name,
        ))?;
        Ok(router)
    }

    pub fn register(&mut self, rule: TriggerRule) -> Result<(), AppError> {
        if self.rules.iter().any(|existing| existing.shape() == rule.shape()) {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!(
                    "duplicate trigger rule for target {}: one rule per (event-shape, target)",
                    rule.target
                ),
            )
            .with_code("LFW-TRG-001"));
        }
        self.rules.push(rule);
        Ok(())
    }

    /// First rule matching the event, or None (no action, no error).
    pub fn route(&self, event: &StorageEvent) -> Option<&TriggerRule> {
        self.rules.iter().find(|rule| rule.matches(event))
    }

    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }
}
