#![allow(clippy::result_large_err)] // Definition APIs return AppError to preserve structured validation context without boxing.

use crate::core::error::AppError;
use crate::core::stack::manifest::{CompletionMode, StackManifest};
use crate::core::types::ErrorCategory;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::collections::HashSet;

/// One step of the workflow graph. Each variant carries the parameters for
/// its target service and a result key the execution record binds the step
/// output to; no step branches on another step's result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    InvokeCrawler {
        id: String,
        crawler: String,
        completion: CompletionMode,
        result_key: String,
    },
    RunBatchJob {
        id: String,
        job: String,
        arguments: Vec<(String, String)>,
        max_retries: u32,
        timeout_seconds: u64,
        result_key: String,
    },
    PublishMessage {
        id: String,
        topic: String,
        message: String,
        result_key: String,
    },
}

impl Step {
    pub fn id(&self) -> &str {
        match self {
            Step::InvokeCrawler { id, .. } => id,
            Step::RunBatchJob { id, .. } => id,
            Step::PublishMessage { id, .. } => id,
        }
    }

    pub fn result_key(&self) -> &str {
        match self {
            Step::InvokeCrawler { result_key, .. } => result_key,
            Step::RunBatchJob { result_key, .. } => result_key,
            Step::PublishMessage { result_key, .. } => result_key,
        }
    }
}

/// One arm of the parallel node, executed concurrently with its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub step: Step,
}

/// Immutable step graph: a parallel node whose branches all feed the single
/// terminal notify step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,
    pub branches: Vec<Branch>,
    pub notify: Step,
}

impl WorkflowDefinition {
    /// Build the definition declared by a stack manifest: crawl and
    /// transform in parallel, then a completion notification.
    pub fn from_manifest(manifest: &StackManifest) -> Result<Self, AppError> {
        let definition = WorkflowDefinition {
            name: manifest.name.clone(),
            branches: vec![
                Branch {
                    name: "crawl".to_string(),
                    step: Step::InvokeCrawler {
                        id: "start_crawler".to_string(),
                        crawler: manifest.crawler.name.clone(),
                        completion: manifest.crawler.completion,
                        result_key: "crawler".to_string(),
                    },
                },
                Branch {
                    name: "transform".to_string(),
                    step: Step::RunBatchJob {
                        id: "run_transform_job".to_string(),
                        job: manifest.transform_job.name.clone(),
                        arguments: manifest.job_arguments(),
                        max_retries: manifest.transform_job.max_retries,
                        timeout_seconds: manifest.transform_job.timeout_seconds,
                        result_key: "etl_job".to_string(),
                    },
                },
            ],
            notify: Step::PublishMessage {
                id: "publish_completion".to_string(),
                topic: manifest.topic.name.clone(),
                message: manifest.workflow.success_message.clone(),
                result_key: "notify".to_string(),
            },
        };
        definition.validate()?;
        Ok(definition)
    }

    /// All steps in the graph, parallel branches first, terminal last.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.branches
            .iter()
            .map(|branch| &branch.step)
            .chain(std::iter::once(&self.notify))
    }

    /// Prove the step graph is acyclic with exactly one terminal node.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.branches.is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "workflow must declare at least one parallel branch",
            ));
        }

        let mut ids = HashSet::new();
        for step in self.steps() {
            if step.id().trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    "step id must not be empty",
                ));
            }
            if !ids.insert(step.id().to_string()) {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    format!("duplicate step id: {}", step.id()),
                ));
            }
        }

        let mut graph = DiGraph::<&str, ()>::new();
        let mut nodes = HashMap::new();
        let start = graph.add_node("start");
        for step in self.steps() {
            nodes.insert(step.id().to_string(), graph.add_node(step.id()));
        }
        let notify = nodes[self.notify.id()];
        for branch in &self.branches {
            let node = nodes[branch.step.id()];
            graph.add_edge(start, node, ());
            graph.add_edge(node, notify, ());
        }

        if is_cyclic_directed(&graph) {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "workflow graph contains a cycle",
            )
            .with_code("LFW-DEF-001"));
        }
        let terminals = graph
            .node_indices()
            .filter(|idx| graph.neighbors(*idx).next().is_none())
            .count();
        if terminals != 1 {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("workflow graph must have exactly one terminal node, found {}", terminals),
            )
            .with_code("LFW-DEF-002"));
        }
        Ok(())
    }
}
