use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use lichen_model::{AgentName, UploadID};

/// Key identifying an existing accepted result set.
///
/// Returned inside `SchedulingOutcome::AlreadySatisfied`; callers exchange
/// it for a [`ResultSummary`] via [`ResultStore::result_summary`].
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResultClaim {
    pub upload: UploadID,
    pub agent: AgentName,
}

/// Summary row describing one agent's stored results for an upload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultSummary {
    pub upload: UploadID,
    pub agent: AgentName,
    /// Whether the run completed successfully, as opposed to merely being
    /// attempted. Only accepted results satisfy a scheduling request.
    pub accepted: bool,
    pub finding_count: u64,
    pub completed_at: DateTime<Utc>,
}

/// Read-only view over the storage collaborator's analysis results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Whether `upload` already has accepted results for `agent`.
    ///
    /// Absence of a record is a normal `Ok(false)`, never an error.
    /// Side-effect-free.
    async fn has_accepted_results(&self, upload: UploadID, agent: &AgentName) -> Result<bool>;

    /// Fetch the stored summary for a claim. Used by callers after an
    /// `AlreadySatisfied` outcome; the scheduler itself never calls this.
    async fn result_summary(
        &self,
        upload: UploadID,
        agent: &AgentName,
    ) -> Result<Option<ResultSummary>>;
}
