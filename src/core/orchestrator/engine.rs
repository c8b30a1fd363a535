#![allow(clippy::result_large_err)] // Engine returns AppError to preserve full diagnostic context; boxing would discard run-time state.

use crate::core::error::AppError;
use crate::core::event::StorageEvent;
use crate::core::orchestrator::definition::{Branch, Step};
use crate::core::orchestrator::record::{
    summarize_error, AppErrorSummary, ExecutionRecord, ExecutionStatus, StepRecord, StepStatus,
};
use crate::core::orchestrator::store;
use crate::core::services::{CrawlState, JobRunState, ServiceSet};
use crate::core::stack::grants::{
    crawler_resource, job_resource, topic_resource, workflow_resource,
};
use crate::core::stack::manifest::CompletionMode;
use crate::core::stack::{Action, GrantSet, Principal, Stack};
use crate::core::types::ErrorCategory;
use chrono::Utc;
use futures::future::join_all;
use rand::Rng;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Executes workflow runs for one assembled stack. Immutable once built;
/// each triggered event runs as an independent execution with no
/// coordination against its siblings.
pub struct ExecutionEngine {
    stack: Arc<Stack>,
    services: ServiceSet,
    grants: GrantSet,
    workspace_root: PathBuf,
}

impl ExecutionEngine {
    pub fn new(stack: Arc<Stack>, services: ServiceSet, workspace_root: PathBuf) -> Self {
        let grants = stack.grants.clone();
        Self {
            stack,
            services,
            grants,
            workspace_root,
        }
    }

    /// Replace the grant set the engine checks step invocations against.
    pub fn with_grant_set(mut self, grants: GrantSet) -> Self {
        self.grants = grants;
        self
    }

    /// Match an inbound event against the stack's trigger rule. On match,
    /// start exactly one execution with the payload as initial input and
    /// drive it to a terminal state. No match is no action and no error.
    pub async fn handle_event(
        &self,
        payload: &Value,
    ) -> Result<Option<ExecutionRecord>, AppError> {
        let event = StorageEvent::parse(payload)?;
        let router = crate::core::trigger::TriggerRouter::for_stack(&self.stack)?;
        let Some(rule) = router.route(&event) else {
            debug!(
                source = %event.source,
                detail_type = %event.detail_type,
                bucket = %event.bucket_name(),
                "event did not match trigger rule"
            );
            return Ok(None);
        };
        // The start call itself is authorized against the event bus
        // principal; a missing grant errors here, at the eventing layer,
        // before any execution record exists.
        self.authorize(
            Principal::EventBus,
            Action::WorkflowStartExecution,
            &workflow_resource(&rule.target),
        )?;
        let record = self.run_execution(payload.clone()).await?;
        Ok(Some(record))
    }

    /// Run one execution of the step graph to a terminal state, persisting
    /// the record at every transition.
    pub async fn run_execution(&self, trigger_payload: Value) -> Result<ExecutionRecord, AppError> {
        let mut record = ExecutionRecord::new(
            self.stack.definition.name.clone(),
            self.stack.manifest_hash.clone(),
            trigger_payload,
        );
        store::save_execution(&self.workspace_root, &record)?;
        info!(execution_id = %record.execution_id, stack = %record.stack_name, "execution started");

        let budget = Duration::from_secs(self.stack.manifest.workflow.execution_timeout_seconds);
        let graph_outcome = timeout(budget, self.run_graph(&mut record)).await;
        match graph_outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                record.status = ExecutionStatus::Failed;
                record.failure = Some(summarize_error(&err));
            }
            Err(_) => {
                // Branch futures are dropped here; already-started external
                // jobs are not cancelled, their completion is simply never
                // observed.
                let err = AppError::new(
                    ErrorCategory::TimeoutError,
                    "execution exceeded workflow.execution_timeout_seconds",
                )
                .with_code("LFW-TIME-001");
                record.status = ExecutionStatus::TimedOut;
                record.failure = Some(summarize_error(&err));
            }
        }
        record.completed_at = Some(Utc::now());
        store::save_execution(&self.workspace_root, &record)?;
        info!(
            execution_id = %record.execution_id,
            status = record.status.as_str(),
            "execution finished"
        );
        Ok(record)
    }

    /// Start → Parallel{branches} → Notify → End. Notify runs only when
    /// every branch succeeds; a failed branch fails the parallel node and
    /// the execution without partial notification.
    async fn run_graph(&self, record: &mut ExecutionRecord) -> Result<(), AppError> {
        let branch_runs = join_all(
            self.stack
                .definition
                .branches
                .iter()
                .map(|branch| self.run_branch(branch)),
        )
        .await;
        let all_succeeded = branch_runs
            .iter()
            .all(|step| step.status == StepStatus::Success);
        let first_failure = branch_runs
            .iter()
            .find(|step| step.status == StepStatus::Failed)
            .and_then(|step| step.error.clone());
        record.steps.extend(branch_runs);
        store::save_execution(&self.workspace_root, record)?;

        if !all_succeeded {
            record.status = ExecutionStatus::Failed;
            record.failure = first_failure;
            return Ok(());
        }

        let notify = self.run_notify(&self.stack.definition.notify).await;
        let notify_failure = notify.error.clone();
        let notified = notify.status == StepStatus::Success;
        record.steps.push(notify);
        if notified {
            record.status = ExecutionStatus::Completed;
        } else {
            record.status = ExecutionStatus::Failed;
            record.failure = notify_failure;
        }
        Ok(())
    }

    async fn run_branch(&self, branch: &Branch) -> StepRecord {
        let started_at = Utc::now();
        let (attempts, result) = match &branch.step {
            Step::InvokeCrawler {
                crawler,
                completion,
                ..
            } => (1, self.invoke_crawler(crawler, *completion).await),
            Step::RunBatchJob {
                job,
                arguments,
                max_retries,
                timeout_seconds,
                ..
            } => {
                self.run_batch_job(job, arguments, *max_retries, *timeout_seconds)
                    .await
            }
            Step::PublishMessage { .. } => (
                1,
                Err(AppError::new(
                    ErrorCategory::InternalError,
                    "publish step cannot run inside a parallel branch",
                )),
            ),
        };
        build_step_record(
            &branch.step,
            Some(branch.name.clone()),
            attempts,
            started_at,
            result,
        )
    }

    async fn run_notify(&self, step: &Step) -> StepRecord {
        let started_at = Utc::now();
        let result = match step {
            Step::PublishMessage { topic, message, .. } => self.publish(topic, message).await,
            other => Err(AppError::new(
                ErrorCategory::InternalError,
                format!("terminal step {} is not a publish step", other.id()),
            )),
        };
        build_step_record(step, None, 1, started_at, result)
    }

    /// Start the crawler, and under `AwaitCompletion` block the branch until
    /// it reports a terminal state. Under `StartOnly` the branch succeeds
    /// once the start call is accepted; crawl failures are unobserved.
    async fn invoke_crawler(
        &self,
        crawler: &str,
        completion: CompletionMode,
    ) -> Result<Value, AppError> {
        let resource = crawler_resource(crawler);
        self.authorize(Principal::WorkflowEngine, Action::CatalogStartCrawl, &resource)?;
        self.services.crawler.start_crawl(crawler).await?;
        debug!(crawler, "crawl start accepted");
        if completion == CompletionMode::StartOnly {
            return Ok(json!({"crawler": crawler, "state": "started"}));
        }

        self.authorize(Principal::WorkflowEngine, Action::CatalogGetCrawl, &resource)?;
        let poll = Duration::from_millis(self.stack.manifest.workflow.poll_interval_ms);
        loop {
            match self.services.crawler.get_crawl(crawler).await? {
                CrawlState::Running => sleep(poll).await,
                CrawlState::Succeeded => {
                    return Ok(json!({"crawler": crawler, "state": "succeeded"}));
                }
                CrawlState::Failed { reason } => {
                    return Err(AppError::new(
                        ErrorCategory::ServiceError,
                        format!("crawler {} failed: {}", crawler, reason),
                    )
                    .with_code("LFW-CRW-001"));
                }
            }
        }
    }

    /// Run-and-wait with a retry budget. Job failures consume a retry; a
    /// per-attempt timeout or an authorization error ends the branch at
    /// once (timeouts are not retried).
    async fn run_batch_job(
        &self,
        job: &str,
        arguments: &[(String, String)],
        max_retries: u32,
        timeout_seconds: u64,
    ) -> (u32, Result<Value, AppError>) {
        let max_attempts = max_retries + 1;
        let mut backoff_ms = self.stack.manifest.workflow.retry_backoff_ms;
        let jitter_ms = self.stack.manifest.workflow.retry_jitter_ms;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let attempt = self.run_job_attempt(job, arguments, timeout_seconds).await;
            match attempt {
                Ok(run_id) => {
                    return (
                        attempts,
                        Ok(json!({
                            "job": job,
                            "run_id": run_id,
                            "state": "succeeded",
                            "attempts": attempts,
                        })),
                    );
                }
                Err(err)
                    if matches!(
                        err.category,
                        ErrorCategory::TimeoutError | ErrorCategory::AuthorizationError
                    ) =>
                {
                    return (attempts, Err(err));
                }
                Err(err) => {
                    if attempts >= max_attempts {
                        return (attempts, Err(err));
                    }
                    warn!(job, attempt = attempts, error = %err, "job run failed, retrying");
                    let sleep_ms = backoff_ms.saturating_add(if jitter_ms > 0 {
                        rand::thread_rng().gen_range(0..=jitter_ms)
                    } else {
                        0
                    });
                    if sleep_ms > 0 {
                        sleep(Duration::from_millis(sleep_ms)).await;
                    }
                    backoff_ms = backoff_ms.saturating_mul(2);
                }
            }
        }
    }

    async fn run_job_attempt(
        &self,
        job: &str,
        arguments: &[(String, String)],
        timeout_seconds: u64,
    ) -> Result<String, AppError> {
        let resource = job_resource(job);
        self.authorize(Principal::WorkflowEngine, Action::BatchStartJobRun, &resource)?;
        self.authorize(Principal::WorkflowEngine, Action::BatchGetJobRun, &resource)?;
        let run_id = self.services.batch.start_job_run(job, arguments).await?;
        debug!(job, run_id = %run_id, "job run started");

        let poll = Duration::from_millis(self.stack.manifest.workflow.poll_interval_ms);
        let wait = async {
            loop {
                match self.services.batch.get_job_run(job, &run_id).await? {
                    JobRunState::Running => sleep(poll).await,
                    JobRunState::Succeeded => return Ok(run_id.clone()),
                    JobRunState::Failed { reason } => {
                        return Err(AppError::new(
                            ErrorCategory::ServiceError,
                            format!("job {} run {} failed: {}", job, run_id, reason),
                        )
                        .with_code("LFW-JOB-001"));
                    }
                }
            }
        };
        match timeout(Duration::from_secs(timeout_seconds), wait).await {
            Ok(result) => result,
            Err(_) => Err(AppError::new(
                ErrorCategory::TimeoutError,
                format!("job {} exceeded its {}s run budget", job, timeout_seconds),
            )
            .with_code("LFW-TIME-002")),
        }
    }

    async fn publish(&self, topic: &str, message: &str) -> Result<Value, AppError> {
        self.authorize(
            Principal::WorkflowEngine,
            Action::TopicPublish,
            &topic_resource(topic),
        )?;
        let message_id = self.services.topic.publish(topic, message).await?;
        Ok(json!({"topic": topic, "message_id": message_id}))
    }

    /// Simulates the invoked service's own authorization check: a principal
    /// invoking an action outside its grant fails immediately.
    fn authorize(
        &self,
        principal: Principal,
        action: Action,
        resource: &str,
    ) -> Result<(), AppError> {
        if self.grants.allows(principal, action, resource) {
            return Ok(());
        }
        let mut err = AppError::new(
            ErrorCategory::AuthorizationError,
            format!(
                "principal {} is not granted {} on {}",
                principal, action, resource
            ),
        )
        .with_code("LFW-AUTH-001");
        err.add_context("principal", principal.as_str());
        err.add_context("action", action.as_str());
        Err(err)
    }
}

fn build_step_record(
    step: &Step,
    branch: Option<String>,
    attempts: u32,
    started_at: chrono::DateTime<Utc>,
    result: Result<Value, AppError>,
) -> StepRecord {
    let completed_at = Utc::now();
    let (status, output, error): (StepStatus, Value, Option<AppErrorSummary>) = match result {
        Ok(output) => (StepStatus::Success, output, None),
        Err(err) => (
            StepStatus::Failed,
            Value::String(err.message.clone()),
            Some(summarize_error(&err)),
        ),
    };
    StepRecord {
        step_id: step.id().to_string(),
        branch,
        result_key: step.result_key().to_string(),
        attempts,
        started_at,
        completed_at,
        status,
        output,
        error,
    }
}
