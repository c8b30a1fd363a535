#![allow(clippy::result_large_err)] // Grant APIs return AppError for consistent diagnostics.

use crate::core::error::AppError;
use crate::core::orchestrator::definition::{Step, WorkflowDefinition};
use crate::core::stack::manifest::{CompletionMode, StackManifest};
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identity a grant attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principal {
    EventBus,
    WorkflowEngine,
    BatchEngine,
}

impl Principal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Principal::EventBus => "event-bus",
            Principal::WorkflowEngine => "workflow-engine",
            Principal::BatchEngine => "batch-engine",
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespaced action verbs a step may invoke against a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "workflow:StartExecution")]
    WorkflowStartExecution,
    #[serde(rename = "catalog:StartCrawl")]
    CatalogStartCrawl,
    #[serde(rename = "catalog:GetCrawl")]
    CatalogGetCrawl,
    #[serde(rename = "batch:StartJobRun")]
    BatchStartJobRun,
    #[serde(rename = "batch:GetJobRun")]
    BatchGetJobRun,
    #[serde(rename = "topic:Publish")]
    TopicPublish,
    #[serde(rename = "storage:GetObject")]
    StorageGetObject,
    #[serde(rename = "storage:PutObject")]
    StoragePutObject,
    #[serde(rename = "storage:ListBucket")]
    StorageListBucket,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::WorkflowStartExecution => "workflow:StartExecution",
            Action::CatalogStartCrawl => "catalog:StartCrawl",
            Action::CatalogGetCrawl => "catalog:GetCrawl",
            Action::BatchStartJobRun => "batch:StartJobRun",
            Action::BatchGetJobRun => "batch:GetJobRun",
            Action::TopicPublish => "topic:Publish",
            Action::StorageGetObject => "storage:GetObject",
            Action::StoragePutObject => "storage:PutObject",
            Action::StorageListBucket => "storage:ListBucket",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource naming helpers shared by derivation and the runtime checks.
pub fn crawler_resource(name: &str) -> String {
    format!("crawler/{}", name)
}

pub fn job_resource(name: &str) -> String {
    format!("job/{}", name)
}

pub fn topic_resource(name: &str) -> String {
    format!("topic/{}", name)
}

pub fn workflow_resource(name: &str) -> String {
    format!("workflow/{}", name)
}

pub fn bucket_resource(name: &str) -> String {
    format!("bucket/{}", name)
}

pub fn bucket_objects_resource(name: &str) -> String {
    format!("bucket/{}/*", name)
}

/// A permission binding: principal, allowed actions, allowed resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub principal: Principal,
    pub actions: Vec<Action>,
    pub resources: Vec<String>,
}

/// The full grant assembly for a stack, queryable at step dispatch time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantSet {
    grants: Vec<Grant>,
}

impl GrantSet {
    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// True when some grant covers the (principal, action, resource) triple.
    /// A grant resource ending in `/*` covers every resource under its prefix.
    pub fn allows(&self, principal: Principal, action: Action, resource: &str) -> bool {
        self.grants.iter().any(|grant| {
            grant.principal == principal
                && grant.actions.contains(&action)
                && grant
                    .resources
                    .iter()
                    .any(|pattern| resource_matches(pattern, resource))
        })
    }

    /// Drop every grant attached to a principal, for drills that observe the
    /// authorization failure mode.
    pub fn without_principal(&self, principal: Principal) -> GrantSet {
        GrantSet {
            grants: self
                .grants
                .iter()
                .filter(|grant| grant.principal != principal)
                .cloned()
                .collect(),
        }
    }

    /// Grants grouped per principal in stable insertion order.
    pub fn by_principal(&self) -> IndexMap<Principal, Vec<&Grant>> {
        let mut grouped: IndexMap<Principal, Vec<&Grant>> = IndexMap::new();
        for grant in &self.grants {
            grouped.entry(grant.principal).or_default().push(grant);
        }
        grouped
    }
}

fn resource_matches(pattern: &str, resource: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("/*") {
        resource
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
            || resource == prefix
    } else {
        pattern == resource
    }
}

/// One (principal, action, resource) triple a declared step will invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredInvocation {
    pub principal: Principal,
    pub action: Action,
    pub resource: String,
}

/// Enumerate every action the declared steps (and the trigger rule) will
/// invoke, per principal. Derivation and the coverage check both consume
/// this list, so the least-privilege invariant holds mechanically.
pub fn required_invocations(
    definition: &WorkflowDefinition,
    manifest: &StackManifest,
) -> Vec<RequiredInvocation> {
    let mut required = vec![RequiredInvocation {
        principal: Principal::EventBus,
        action: Action::WorkflowStartExecution,
        resource: workflow_resource(&definition.name),
    }];
    for step in definition.steps() {
        match step {
            Step::InvokeCrawler {
                crawler,
                completion,
                ..
            } => {
                required.push(RequiredInvocation {
                    principal: Principal::WorkflowEngine,
                    action: Action::CatalogStartCrawl,
                    resource: crawler_resource(crawler),
                });
                if *completion == CompletionMode::AwaitCompletion {
                    required.push(RequiredInvocation {
                        principal: Principal::WorkflowEngine,
                        action: Action::CatalogGetCrawl,
                        resource: crawler_resource(crawler),
                    });
                }
                required.push(RequiredInvocation {
                    principal: Principal::BatchEngine,
                    action: Action::StorageListBucket,
                    resource: bucket_resource(manifest.source_bucket()),
                });
                required.push(RequiredInvocation {
                    principal: Principal::BatchEngine,
                    action: Action::StorageGetObject,
                    resource: bucket_objects_resource(manifest.source_bucket()),
                });
            }
            Step::RunBatchJob { job, .. } => {
                required.push(RequiredInvocation {
                    principal: Principal::WorkflowEngine,
                    action: Action::BatchStartJobRun,
                    resource: job_resource(job),
                });
                required.push(RequiredInvocation {
                    principal: Principal::WorkflowEngine,
                    action: Action::BatchGetJobRun,
                    resource: job_resource(job),
                });
                required.push(RequiredInvocation {
                    principal: Principal::BatchEngine,
                    action: Action::StorageGetObject,
                    resource: bucket_objects_resource(manifest.source_bucket()),
                });
                required.push(RequiredInvocation {
                    principal: Principal::BatchEngine,
                    action: Action::StoragePutObject,
                    resource: bucket_objects_resource(manifest.destination_bucket()),
                });
            }
            Step::PublishMessage { topic, .. } => {
                required.push(RequiredInvocation {
                    principal: Principal::WorkflowEngine,
                    action: Action::TopicPublish,
                    resource: topic_resource(topic),
                });
            }
        }
    }
    required
}

/// Compute the minimal grant set for the steps assigned to each principal.
pub fn derive_grants(definition: &WorkflowDefinition, manifest: &StackManifest) -> GrantSet {
    let mut per_principal: IndexMap<Principal, IndexMap<String, Vec<Action>>> = IndexMap::new();
    for invocation in required_invocations(definition, manifest) {
        let actions = per_principal
            .entry(invocation.principal)
            .or_default()
            .entry(invocation.resource)
            .or_default();
        if !actions.contains(&invocation.action) {
            actions.push(invocation.action);
        }
    }

    let mut grants = Vec::new();
    for (principal, resources) in per_principal {
        for (resource, actions) in resources {
            grants.push(Grant {
                principal,
                actions,
                resources: vec![resource],
            });
        }
    }
    GrantSet { grants }
}

/// Design-time invariant: every action a step invokes must appear in its
/// principal's grant. Absence would fail each execution at that step with an
/// authorization error, so it is rejected at assembly instead.
pub fn verify_coverage(
    grants: &GrantSet,
    definition: &WorkflowDefinition,
    manifest: &StackManifest,
) -> Result<(), AppError> {
    for invocation in required_invocations(definition, manifest) {
        if !grants.allows(invocation.principal, invocation.action, &invocation.resource) {
            let mut err = AppError::new(
                ErrorCategory::AuthorizationError,
                format!(
                    "principal {} is not granted {} on {}",
                    invocation.principal, invocation.action, invocation.resource
                ),
            )
            .with_code("LFW-AUTH-001");
            err.add_context("principal", invocation.principal.as_str());
            err.add_context("action", invocation.action.as_str());
            return Err(err);
        }
    }
    Ok(())
}
