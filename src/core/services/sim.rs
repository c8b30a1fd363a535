//! Simulated service backends with scripted outcomes and latency. Durations
//! run on the tokio clock, so tests driving timers with a paused runtime
//! resolve them instantly.

use crate::core::error::AppError;
use crate::core::services::{BatchJobService, CrawlState, CrawlerService, JobRunState, TopicService};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

const DEFAULT_LATENCY: Duration = Duration::from_millis(100);

/// A scripted terminal outcome reached after `duration` of simulated work.
#[derive(Debug, Clone)]
pub struct ScriptedOutcome {
    pub succeed: bool,
    pub reason: String,
    pub duration: Duration,
}

impl ScriptedOutcome {
    pub fn success_after(duration: Duration) -> Self {
        Self {
            succeed: true,
            reason: String::new(),
            duration,
        }
    }

    pub fn failure_after<T: Into<String>>(reason: T, duration: Duration) -> Self {
        Self {
            succeed: false,
            reason: reason.into(),
            duration,
        }
    }
}

impl Default for ScriptedOutcome {
    fn default() -> Self {
        Self::success_after(DEFAULT_LATENCY)
    }
}

struct ActiveCrawl {
    deadline: Instant,
    outcome: ScriptedOutcome,
}

/// Crawler backend: one active crawl per crawler name, outcomes popped from
/// the scripted queue (default: success after a short latency).
#[derive(Default)]
pub struct SimulatedCrawler {
    scripted: Mutex<VecDeque<ScriptedOutcome>>,
    active: Mutex<HashMap<String, ActiveCrawl>>,
    start_count: AtomicU64,
}

impl SimulatedCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, outcome: ScriptedOutcome) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn start_count(&self) -> u64 {
        self.start_count.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CrawlerService for SimulatedCrawler {
    async fn start_crawl(&self, crawler: &str) -> Result<(), AppError> {
        let outcome = self.next_outcome();
        self.start_count.fetch_add(1, Ordering::SeqCst);
        debug!(crawler, latency_ms = outcome.duration.as_millis() as u64, "crawl started");
        self.active.lock().unwrap().insert(
            crawler.to_string(),
            ActiveCrawl {
                deadline: Instant::now() + outcome.duration,
                outcome,
            },
        );
        Ok(())
    }

    async fn get_crawl(&self, crawler: &str) -> Result<CrawlState, AppError> {
        let active = self.active.lock().unwrap();
        let crawl = active.get(crawler).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ServiceError,
                format!("no crawl in progress for crawler {}", crawler),
            )
            .with_code("LFW-SVC-001")
        })?;
        if Instant::now() < crawl.deadline {
            return Ok(CrawlState::Running);
        }
        if crawl.outcome.succeed {
            Ok(CrawlState::Succeeded)
        } else {
            Ok(CrawlState::Failed {
                reason: crawl.outcome.reason.clone(),
            })
        }
    }
}

struct ActiveRun {
    job: String,
    destination_bucket: Option<String>,
    deadline: Instant,
    outcome: ScriptedOutcome,
    write_recorded: bool,
}

/// Batch engine backend. A run writes to its destination bucket only when it
/// reaches the succeeded state, which lets tests assert the destination
/// stays untouched on failed runs.
#[derive(Default)]
pub struct SimulatedBatchJob {
    scripted: Mutex<VecDeque<ScriptedOutcome>>,
    runs: Mutex<HashMap<String, ActiveRun>>,
    writes: Mutex<Vec<String>>,
    last_args: Mutex<Option<Vec<(String, String)>>>,
    start_count: AtomicU64,
}

impl SimulatedBatchJob {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, outcome: ScriptedOutcome) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn start_count(&self) -> u64 {
        self.start_count.load(Ordering::SeqCst)
    }

    /// Objects written to destination buckets by succeeded runs.
    pub fn destination_writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Arguments the most recently started run was invoked with.
    pub fn last_arguments(&self) -> Option<Vec<(String, String)>> {
        self.last_args.lock().unwrap().clone()
    }
}

#[async_trait]
impl BatchJobService for SimulatedBatchJob {
    async fn start_job_run(
        &self,
        job: &str,
        arguments: &[(String, String)],
    ) -> Result<String, AppError> {
        let outcome = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let seq = self.start_count.fetch_add(1, Ordering::SeqCst) + 1;
        let run_id = format!("jr-{:04}", seq);
        let destination_bucket = arguments
            .iter()
            .find(|(key, _)| key == "--destination_bucket")
            .map(|(_, value)| value.clone());
        debug!(job, run_id = %run_id, latency_ms = outcome.duration.as_millis() as u64, "job run started");
        *self.last_args.lock().unwrap() = Some(arguments.to_vec());
        self.runs.lock().unwrap().insert(
            run_id.clone(),
            ActiveRun {
                job: job.to_string(),
                destination_bucket,
                deadline: Instant::now() + outcome.duration,
                outcome,
                write_recorded: false,
            },
        );
        Ok(run_id)
    }

    async fn get_job_run(&self, job: &str, run_id: &str) -> Result<JobRunState, AppError> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs.get_mut(run_id).ok_or_else(|| {
            AppError::new(
                ErrorCategory::ServiceError,
                format!("unknown job run {} for job {}", run_id, job),
            )
            .with_code("LFW-SVC-002")
        })?;
        if run.job != job {
            return Err(AppError::new(
                ErrorCategory::ServiceError,
                format!("job run {} does not belong to job {}", run_id, job),
            )
            .with_code("LFW-SVC-002"));
        }
        if Instant::now() < run.deadline {
            return Ok(JobRunState::Running);
        }
        if run.outcome.succeed {
            if !run.write_recorded {
                run.write_recorded = true;
                if let Some(bucket) = &run.destination_bucket {
                    self.writes
                        .lock()
                        .unwrap()
                        .push(format!("{}/{}.parquet", bucket, run_id));
                }
            }
            Ok(JobRunState::Succeeded)
        } else {
            Ok(JobRunState::Failed {
                reason: run.outcome.reason.clone(),
            })
        }
    }
}

/// A message accepted by the in-memory topic, with its fan-out record.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub message_id: String,
    pub topic: String,
    pub body: String,
    pub delivered_to: Vec<String>,
}

/// Topic backend that records accepted messages and fans them out to the
/// configured email endpoints immediately.
#[derive(Default)]
pub struct InMemoryTopic {
    subscriptions: Vec<String>,
    published: Mutex<Vec<PublishedMessage>>,
    reject_next: Mutex<Option<String>>,
    seq: AtomicU64,
}

impl InMemoryTopic {
    pub fn new(subscriptions: Vec<String>) -> Self {
        Self {
            subscriptions,
            ..Self::default()
        }
    }

    /// Make the next publish call fail with the given reason.
    pub fn reject_next_publish<T: Into<String>>(&self, reason: T) {
        *self.reject_next.lock().unwrap() = Some(reason.into());
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl TopicService for InMemoryTopic {
    async fn publish(&self, topic: &str, message: &str) -> Result<String, AppError> {
        if let Some(reason) = self.reject_next.lock().unwrap().take() {
            return Err(AppError::new(
                ErrorCategory::ServiceError,
                format!("publish to topic {} rejected: {}", topic, reason),
            )
            .with_code("LFW-SVC-003"));
        }
        let message_id = format!("msg-{:04}", self.seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.published.lock().unwrap().push(PublishedMessage {
            message_id: message_id.clone(),
            topic: topic.to_string(),
            body: message.to_string(),
            delivered_to: self.subscriptions.clone(),
        });
        Ok(message_id)
    }
}
