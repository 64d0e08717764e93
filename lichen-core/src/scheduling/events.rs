use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use lichen_model::{AgentName, JobContextID, JobID, UploadID};

/// Metadata envelope attached to every scheduling event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventMeta {
    pub version: u16,
    /// Shared by every event emitted for one top-level scheduling request,
    /// including events for recursively scheduled prerequisites.
    pub correlation_id: Uuid,
    pub context: JobContextID,
    pub upload: UploadID,
}

impl EventMeta {
    pub fn new(correlation_id: Uuid, context: JobContextID, upload: UploadID) -> Self {
        Self {
            version: 1,
            correlation_id,
            context,
            upload,
        }
    }
}

/// Lifecycle notifications emitted by the scheduler after each decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum SchedulingEventPayload {
    /// A fresh job entered the queue.
    JobScheduled {
        job_id: JobID,
        agent: AgentName,
        prerequisites: Vec<JobID>,
    },
    /// The request was folded into an existing active job.
    Deduplicated {
        existing_job_id: JobID,
        agent: AgentName,
    },
    /// Accepted results already covered the request; nothing was queued.
    Satisfied { agent: AgentName },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulingEvent {
    pub meta: EventMeta,
    pub payload: SchedulingEventPayload,
}

#[async_trait]
pub trait SchedulingEventPublisher: Send + Sync {
    async fn publish(&self, event: SchedulingEvent) -> Result<()>;
}

/// Lightweight in-process event bus that fans scheduling notifications out
/// to observers inside the runtime. Keeps the wiring flexible until an
/// external broker is warranted.
pub struct InProcSchedulingBus {
    sender: tokio::sync::broadcast::Sender<SchedulingEvent>,
    channel_capacity: usize,
}

impl std::fmt::Debug for InProcSchedulingBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InProcSchedulingBus")
            .field("channel_capacity", &self.channel_capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcSchedulingBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self {
            sender,
            channel_capacity: capacity,
        }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SchedulingEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl SchedulingEventPublisher for InProcSchedulingBus {
    async fn publish(&self, event: SchedulingEvent) -> Result<()> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Publisher that discards every event; for embedders without observers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSchedulingBus;

#[async_trait]
impl SchedulingEventPublisher for NullSchedulingBus {
    async fn publish(&self, _event: SchedulingEvent) -> Result<()> {
        Ok(())
    }
}
