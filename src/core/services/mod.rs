//! Seams to the externally operated services. The crawler, the batch engine,
//! and the topic are invoked, never implemented, by this crate; shipped
//! implementations are simulations used by the CLI and tests.

pub mod sim;

use crate::core::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Terminal and in-flight states reported by the metadata crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CrawlState {
    Running,
    Succeeded,
    Failed { reason: String },
}

/// Terminal and in-flight states reported by the batch engine for a job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobRunState {
    Running,
    Succeeded,
    Failed { reason: String },
}

/// Metadata-discovery service. `start_crawl` returns once the start call is
/// accepted, not once crawling finishes.
#[async_trait]
pub trait CrawlerService: Send + Sync + 'static {
    async fn start_crawl(&self, crawler: &str) -> Result<(), AppError>;
    async fn get_crawl(&self, crawler: &str) -> Result<CrawlState, AppError>;
}

/// Batch transform engine. Runs are identified by the id handed back from
/// `start_job_run` and polled to a terminal state.
#[async_trait]
pub trait BatchJobService: Send + Sync + 'static {
    async fn start_job_run(
        &self,
        job: &str,
        arguments: &[(String, String)],
    ) -> Result<String, AppError>;
    async fn get_job_run(&self, job: &str, run_id: &str) -> Result<JobRunState, AppError>;
}

/// Notification topic. `publish` returns once the message is accepted by the
/// messaging service; delivery to subscribers is asynchronous and
/// at-least-once.
#[async_trait]
pub trait TopicService: Send + Sync + 'static {
    async fn publish(&self, topic: &str, message: &str) -> Result<String, AppError>;
}

/// The service handles an execution engine dispatches steps against.
#[derive(Clone)]
pub struct ServiceSet {
    pub crawler: Arc<dyn CrawlerService>,
    pub batch: Arc<dyn BatchJobService>,
    pub topic: Arc<dyn TopicService>,
}
