//! In-memory collaborator implementations.
//!
//! Used by embedders that run the whole pipeline in one process and by the
//! test suite. Both types are cheap to clone and share their state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, ScanError};
use lichen_model::{AgentName, JobContextID, JobID, UploadID};

use super::job::{JobRecord, JobRef, JobStatus, NewJob};
use super::queue::{JobQueue, QueueInstrumentation, QueueSnapshot};
use super::results::{ResultStore, ResultSummary};

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobID, JobRecord>,
}

/// Job queue held entirely in process memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status transition the way the external queue executor would.
    pub async fn set_status(&self, id: JobID, status: JobStatus) -> Result<()> {
        let mut state = self.state.lock().await;
        let job = state
            .jobs
            .get_mut(&id)
            .ok_or_else(|| ScanError::NotFound(format!("job {id}")))?;
        debug!(job_id = %id, from = %job.status, to = %status, "job status transition");
        job.status = status;
        job.updated_at = Utc::now();
        Ok(())
    }

    pub async fn job_count(&self) -> usize {
        self.state.lock().await.jobs.len()
    }

    /// All jobs within one context, ordered by creation time.
    pub async fn jobs_in_context(&self, context: JobContextID) -> Vec<JobRecord> {
        let state = self.state.lock().await;
        let mut jobs: Vec<JobRecord> = state
            .jobs
            .values()
            .filter(|job| job.context == context)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        jobs
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn find_active_job(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<JobRef>> {
        let state = self.state.lock().await;
        Ok(state
            .jobs
            .values()
            .find(|job| {
                job.context == context
                    && job.upload == upload
                    && &job.agent == agent
                    && job.status.is_active()
            })
            .map(JobRecord::reference))
    }

    async fn create_job(&self, spec: NewJob) -> Result<JobRef> {
        let record = JobRecord::new(spec);
        let reference = record.reference();
        let mut state = self.state.lock().await;
        state.jobs.insert(record.id, record);
        Ok(reference)
    }

    async fn job(&self, id: JobID) -> Result<Option<JobRecord>> {
        let state = self.state.lock().await;
        Ok(state.jobs.get(&id).cloned())
    }
}

#[async_trait]
impl QueueInstrumentation for InMemoryJobQueue {
    async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let state = self.state.lock().await;
        let mut snapshot = QueueSnapshot::new(Utc::now());
        for job in state.jobs.values() {
            *snapshot.by_status.entry(job.status).or_insert(0) += 1;
        }
        Ok(snapshot)
    }
}

/// Result store held entirely in process memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryResultStore {
    inner: Arc<Mutex<HashMap<(UploadID, AgentName), ResultSummary>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted result set, as the analysis pipeline would after
    /// a successful agent run.
    pub async fn record_accepted(
        &self,
        upload: UploadID,
        agent: impl Into<AgentName>,
        finding_count: u64,
    ) {
        let agent = agent.into();
        let summary = ResultSummary {
            upload,
            agent: agent.clone(),
            accepted: true,
            finding_count,
            completed_at: Utc::now(),
        };
        let mut inner = self.inner.lock().await;
        inner.insert((upload, agent), summary);
    }

    /// Record a failed attempt; attempted-but-rejected results never satisfy
    /// a scheduling request.
    pub async fn record_rejected(&self, upload: UploadID, agent: impl Into<AgentName>) {
        let agent = agent.into();
        let summary = ResultSummary {
            upload,
            agent: agent.clone(),
            accepted: false,
            finding_count: 0,
            completed_at: Utc::now(),
        };
        let mut inner = self.inner.lock().await;
        inner.insert((upload, agent), summary);
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn has_accepted_results(&self, upload: UploadID, agent: &AgentName) -> Result<bool> {
        let inner = self.inner.lock().await;
        Ok(inner
            .get(&(upload, agent.clone()))
            .is_some_and(|summary| summary.accepted))
    }

    async fn result_summary(
        &self,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<ResultSummary>> {
        let inner = self.inner.lock().await;
        Ok(inner.get(&(upload, agent.clone())).cloned())
    }
}
