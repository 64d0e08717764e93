use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lichen_model::{AgentName, JobContextID, JobID, UploadID};

use super::results::ResultClaim;

/// Scheduler-visible job states.
///
/// `Queued` and `Running` are the "active" states relevant to
/// deduplication; the external queue executor owns the transitions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Active jobs block a second enqueue of the same (context, upload, agent).
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selects which representation of an upload a content-scanning agent reads.
///
/// The two modes are mutually exclusive: a request carries exactly one, and
/// it picks exactly one prerequisite chain for agents that have any.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ScanMode {
    /// Scan inside compressed containers; requires MIME-typed extraction.
    Compressed,
    /// Scan the already-unpacked file tree; requires the nested tree.
    #[default]
    Extracted,
}

impl ScanMode {
    /// Extra command-line argument forwarded to agents that branch on mode.
    pub fn agent_args(&self) -> Option<&'static str> {
        match self {
            ScanMode::Compressed => Some("-I"),
            ScanMode::Extracted => None,
        }
    }
}

/// Envelope persisted by the queue collaborator for each scheduled job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobID,
    pub context: JobContextID,
    pub upload: UploadID,
    pub agent: AgentName,
    /// Ordered dependency edges: every referenced job must reach
    /// `Completed` before this one may start.
    pub prerequisites: Vec<JobID>,
    /// Extra arguments handed to the agent process, if any.
    pub args: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(spec: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id: JobID::new(),
            context: spec.context,
            upload: spec.upload,
            agent: spec.agent,
            prerequisites: spec.prerequisites,
            args: spec.args,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reference(&self) -> JobRef {
        JobRef {
            id: self.id,
            agent: self.agent.clone(),
        }
    }
}

/// Creation request handed to the queue collaborator. Jobs always start out
/// `Queued`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewJob {
    pub context: JobContextID,
    pub upload: UploadID,
    pub agent: AgentName,
    pub prerequisites: Vec<JobID>,
    pub args: Option<String>,
}

/// Lightweight reference to a queued job, returned to callers.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct JobRef {
    pub id: JobID,
    pub agent: AgentName,
}

/// The scheduler's answer to one `ensure_scheduled` request.
///
/// Transient value; nothing here is persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SchedulingOutcome {
    /// Accepted results already exist; nothing was queued. The claim is the
    /// key a caller needs to fetch the stored summary.
    AlreadySatisfied(ResultClaim),
    /// An equivalent job is already queued or running in this context.
    AlreadyQueued(JobRef),
    /// A fresh job was queued, with its resolved dependency edges.
    Scheduled {
        job: JobRef,
        prerequisites: Vec<JobID>,
    },
}

impl SchedulingOutcome {
    /// The job carrying this agent's work, when one exists in the queue.
    pub fn job_id(&self) -> Option<JobID> {
        match self {
            SchedulingOutcome::AlreadySatisfied(_) => None,
            SchedulingOutcome::AlreadyQueued(job) => Some(job.id),
            SchedulingOutcome::Scheduled { job, .. } => Some(job.id),
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, SchedulingOutcome::Scheduled { .. })
    }
}
