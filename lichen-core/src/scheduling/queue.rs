use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use lichen_model::{AgentName, JobContextID, JobID, UploadID};

use super::job::{JobRecord, JobRef, JobStatus, NewJob};

/// Abstracts the job-queue collaborator consumed by the scheduler.
///
/// The scheduler is the only component with write authority over the job
/// graph, and `create_job` is its only write. Status transitions are driven
/// by the external queue executor and observed here passively.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Find a queued-or-running job for the triple, scoped strictly to the
    /// supplied context so historical runs never cause false-positive
    /// deduplication. Side-effect-free.
    async fn find_active_job(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<JobRef>>;

    /// Persist a new job with its dependency edges, status `Queued`.
    async fn create_job(&self, spec: NewJob) -> Result<JobRef>;

    /// Observe a job's current record, if it exists.
    async fn job(&self, id: JobID) -> Result<Option<JobRecord>>;
}

/// Optional observability hook for queue implementations that can surface
/// aggregate state.
#[async_trait]
pub trait QueueInstrumentation: Send + Sync {
    async fn queue_snapshot(&self) -> Result<QueueSnapshot>;
}

/// Point-in-time job counts grouped by status.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub sampled_at: DateTime<Utc>,
    pub by_status: HashMap<JobStatus, usize>,
}

impl QueueSnapshot {
    pub fn new(sampled_at: DateTime<Utc>) -> Self {
        Self {
            sampled_at,
            by_status: HashMap::new(),
        }
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.by_status.values().sum()
    }
}
