//! The scheduling decision procedure.
//!
//! `ensure_scheduled` reconciles persisted results, in-flight queue state,
//! and the per-agent dependency chain into one idempotent decision. The
//! scheduler is the only component with write authority over the job
//! graph; the result store, queue inspector, and dependency resolver are
//! read-only advisors.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ScanError};
use crate::registry::AgentRegistry;
use lichen_model::{AgentName, JobContextID, JobID, UploadID};

use super::config::SchedulerConfig;
use super::deps::DependencyResolver;
use super::events::{EventMeta, SchedulingEvent, SchedulingEventPayload, SchedulingEventPublisher};
use super::job::{NewJob, ScanMode, SchedulingOutcome};
use super::queue::JobQueue;
use super::results::{ResultClaim, ResultStore};

#[derive(Clone, Eq, PartialEq, Hash)]
struct TripleKey {
    context: JobContextID,
    upload: UploadID,
    agent: AgentName,
}

/// Keyed async locks serializing the check-queue-then-create critical
/// section per (context, upload, agent) triple.
#[derive(Clone, Default)]
struct TripleLocks {
    inner: Arc<Mutex<HashMap<TripleKey, Arc<Mutex<()>>>>>,
}

impl TripleLocks {
    async fn acquire(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: &AgentName,
    ) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            let key = TripleKey {
                context,
                upload,
                agent: agent.clone(),
            };
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    async fn forget_context(&self, context: JobContextID) {
        let mut map = self.inner.lock().await;
        map.retain(|key, _| key.context != context);
    }
}

/// Orchestrating component behind the platform's sole scheduling entry
/// point, [`AgentScheduler::ensure_scheduled`].
pub struct AgentScheduler<Q, R, E>
where
    Q: JobQueue + 'static,
    R: ResultStore + 'static,
    E: SchedulingEventPublisher + 'static,
{
    registry: Arc<AgentRegistry>,
    resolver: DependencyResolver,
    queue: Arc<Q>,
    results: Arc<R>,
    events: Arc<E>,
    config: SchedulerConfig,
    locks: TripleLocks,
}

impl<Q, R, E> fmt::Debug for AgentScheduler<Q, R, E>
where
    Q: JobQueue + 'static,
    R: ResultStore + 'static,
    E: SchedulingEventPublisher + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentScheduler")
            .field("queue", &type_name::<Q>())
            .field("results", &type_name::<R>())
            .field("events", &type_name::<E>())
            .field("agents", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<Q, R, E> AgentScheduler<Q, R, E>
where
    Q: JobQueue + 'static,
    R: ResultStore + 'static,
    E: SchedulingEventPublisher + 'static,
{
    pub fn new(
        registry: Arc<AgentRegistry>,
        queue: Arc<Q>,
        results: Arc<R>,
        events: Arc<E>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            resolver: DependencyResolver::new(Arc::clone(&registry)),
            registry,
            queue,
            results,
            events,
            config,
            locks: TripleLocks::default(),
        }
    }

    /// Ensure `agent` runs against `upload` within `context`.
    ///
    /// Decision procedure, each step short-circuiting the next:
    /// existing accepted results, then an active job in the context, then
    /// prerequisite resolution, recursive prerequisite scheduling, and
    /// finally creation of the new job with its dependency edges. Safe to
    /// call concurrently with identical arguments: at most one active job
    /// ever exists per (context, upload, agent) triple.
    pub async fn ensure_scheduled(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: AgentName,
        mode: ScanMode,
    ) -> Result<SchedulingOutcome> {
        let correlation = Uuid::now_v7();
        self.ensure_inner(context, upload, agent, mode, correlation, Vec::new())
            .await
    }

    /// Schedule several agents under one context, sharing prerequisites.
    ///
    /// Requests are applied in order; the first failure aborts the batch,
    /// leaving earlier decisions in place (each decision is individually
    /// complete, never partial).
    pub async fn schedule_many(
        &self,
        context: JobContextID,
        upload: UploadID,
        requests: impl IntoIterator<Item = (AgentName, ScanMode)>,
    ) -> Result<Vec<SchedulingOutcome>> {
        let mut outcomes = Vec::new();
        for (agent, mode) in requests {
            outcomes.push(self.ensure_scheduled(context, upload, agent, mode).await?);
        }
        Ok(outcomes)
    }

    /// Drop per-triple lock state for a context whose run has finished.
    pub async fn forget_context(&self, context: JobContextID) {
        self.locks.forget_context(context).await;
    }

    fn ensure_inner(
        &self,
        context: JobContextID,
        upload: UploadID,
        agent: AgentName,
        mode: ScanMode,
        correlation: Uuid,
        path: Vec<AgentName>,
    ) -> BoxFuture<'_, Result<SchedulingOutcome>> {
        Box::pin(async move {
            // Cycles cannot arise from a registry that respects the agent
            // ordering; a misconfigured one must fail loudly rather than
            // recurse into its own lock.
            if path.contains(&agent) {
                return Err(ScanError::Configuration(format!(
                    "prerequisite cycle through agent {agent}"
                )));
            }
            if path.len() >= self.config.max_chain_depth {
                return Err(ScanError::Configuration(format!(
                    "prerequisite chain for {agent} exceeds depth {}",
                    self.config.max_chain_depth
                )));
            }

            // Unknown agents surface before any collaborator traffic.
            let descriptor = self.registry.require(&agent)?;

            // Step 1: the dominant fast path for repeat requests. Checked
            // before any queue or dependency work.
            if self.results.has_accepted_results(upload, &agent).await? {
                debug!(upload = %upload, agent = %agent, "results already accepted; nothing to schedule");
                self.publish(
                    correlation,
                    context,
                    upload,
                    SchedulingEventPayload::Satisfied {
                        agent: agent.clone(),
                    },
                )
                .await;
                return Ok(SchedulingOutcome::AlreadySatisfied(ResultClaim {
                    upload,
                    agent,
                }));
            }

            // Steps 2 and 5 form the per-triple critical section: without
            // it, two concurrent callers could both pass the queue check
            // and each create a job.
            let _guard = self.locks.acquire(context, upload, &agent).await;

            if let Some(existing) = self
                .queue
                .find_active_job(context, upload, &agent)
                .await?
            {
                debug!(job_id = %existing.id, agent = %agent, "reusing active job");
                self.publish(
                    correlation,
                    context,
                    upload,
                    SchedulingEventPayload::Deduplicated {
                        existing_job_id: existing.id,
                        agent: agent.clone(),
                    },
                )
                .await;
                return Ok(SchedulingOutcome::AlreadyQueued(existing));
            }

            // Step 3: pure chain computation, no shared state.
            let chain = self.resolver.resolve(&agent, mode)?;

            // Step 4: prerequisites inherit context and upload. Routing
            // them through the same entry point keeps the recursion
            // idempotent: a prerequisite already satisfied or queued by a
            // sibling request is reused, not duplicated. An already
            // satisfied prerequisite contributes no dependency edge.
            let mut edges: Vec<JobID> = Vec::with_capacity(chain.len());
            let mut next_path = path;
            next_path.push(agent.clone());
            for prerequisite in chain {
                let outcome = self
                    .ensure_inner(
                        context,
                        upload,
                        prerequisite,
                        mode,
                        correlation,
                        next_path.clone(),
                    )
                    .await?;
                if let Some(job_id) = outcome.job_id() {
                    edges.push(job_id);
                }
            }

            // Step 5: the single write this core performs.
            let args = descriptor
                .prerequisites
                .mode_applies()
                .then(|| mode.agent_args())
                .flatten()
                .map(str::to_owned);
            let job = self
                .queue
                .create_job(NewJob {
                    context,
                    upload,
                    agent: agent.clone(),
                    prerequisites: edges.clone(),
                    args,
                })
                .await?;
            info!(
                job_id = %job.id,
                upload = %upload,
                agent = %agent,
                prerequisites = edges.len(),
                "scheduled agent job"
            );
            self.publish(
                correlation,
                context,
                upload,
                SchedulingEventPayload::JobScheduled {
                    job_id: job.id,
                    agent,
                    prerequisites: edges.clone(),
                },
            )
            .await;
            Ok(SchedulingOutcome::Scheduled {
                job,
                prerequisites: edges,
            })
        })
    }

    async fn publish(
        &self,
        correlation: Uuid,
        context: JobContextID,
        upload: UploadID,
        payload: SchedulingEventPayload,
    ) {
        let event = SchedulingEvent {
            meta: EventMeta::new(correlation, context, upload),
            payload,
        };
        // The queue is the source of truth; observers catch up from it if
        // a notification is lost.
        if let Err(err) = self.events.publish(event).await {
            warn!(error = %err, "failed to publish scheduling event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        AgentDescriptor, BUILD_NESTED_TREE, COPYRIGHT, EXTRACT_MIMETYPE, KEYWORD,
        PrerequisitePolicy, UNPACK,
    };
    use crate::scheduling::events::InProcSchedulingBus;
    use crate::scheduling::job::JobStatus;
    use crate::scheduling::memory::{InMemoryJobQueue, InMemoryResultStore};
    use crate::scheduling::results::ResultSummary;
    use async_trait::async_trait;
    use futures::future::join_all;

    type TestScheduler = AgentScheduler<InMemoryJobQueue, InMemoryResultStore, InProcSchedulingBus>;

    struct Fixture {
        scheduler: Arc<TestScheduler>,
        queue: InMemoryJobQueue,
        results: InMemoryResultStore,
        events: Arc<InProcSchedulingBus>,
    }

    fn fixture() -> Fixture {
        fixture_with_registry(AgentRegistry::builtin(), SchedulerConfig::default())
    }

    fn fixture_with_registry(registry: AgentRegistry, config: SchedulerConfig) -> Fixture {
        let queue = InMemoryJobQueue::new();
        let results = InMemoryResultStore::new();
        let events = Arc::new(InProcSchedulingBus::new(64));
        let scheduler = AgentScheduler::new(
            Arc::new(registry),
            Arc::new(queue.clone()),
            Arc::new(results.clone()),
            Arc::clone(&events),
            config,
        );
        Fixture {
            scheduler: Arc::new(scheduler),
            queue,
            results,
            events,
        }
    }

    #[tokio::test]
    async fn fresh_request_schedules_prerequisite_then_agent() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();

        let outcome = fx
            .scheduler
            .ensure_scheduled(context, upload, AgentName::from(KEYWORD), ScanMode::Extracted)
            .await
            .unwrap();

        let SchedulingOutcome::Scheduled { job, prerequisites } = outcome else {
            panic!("expected a fresh job");
        };
        assert_eq!(prerequisites.len(), 1);

        let prerequisite = fx.queue.job(prerequisites[0]).await.unwrap().expect("edge target exists");
        assert_eq!(prerequisite.agent, AgentName::from(BUILD_NESTED_TREE));
        assert!(prerequisite.prerequisites.is_empty());
        assert_eq!(prerequisite.status, JobStatus::Queued);

        let keyword = fx.queue.job(job.id).await.unwrap().expect("job exists");
        assert_eq!(keyword.prerequisites, prerequisites);
        assert_eq!(fx.queue.job_count().await, 2);
    }

    #[tokio::test]
    async fn repeated_request_reuses_the_queued_job() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();
        let agent = AgentName::from(KEYWORD);

        let first = fx
            .scheduler
            .ensure_scheduled(context, upload, agent.clone(), ScanMode::Extracted)
            .await
            .unwrap();
        let second = fx
            .scheduler
            .ensure_scheduled(context, upload, agent, ScanMode::Extracted)
            .await
            .unwrap();

        let SchedulingOutcome::AlreadyQueued(existing) = second else {
            panic!("expected deduplication");
        };
        assert_eq!(Some(existing.id), first.job_id());
        assert_eq!(fx.queue.job_count().await, 2);
    }

    #[tokio::test]
    async fn concurrent_identical_requests_create_exactly_one_job() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();

        let calls = (0..8).map(|_| {
            let scheduler = Arc::clone(&fx.scheduler);
            async move {
                scheduler
                    .ensure_scheduled(context, upload, AgentName::from(KEYWORD), ScanMode::Extracted)
                    .await
                    .expect("scheduling succeeds")
            }
        });
        let outcomes = join_all(calls).await;

        let scheduled: Vec<_> = outcomes.iter().filter(|o| o.is_scheduled()).collect();
        assert_eq!(scheduled.len(), 1, "exactly one caller wins the enqueue");
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| matches!(o, SchedulingOutcome::AlreadyQueued(_)))
                .count(),
            7
        );

        let winner = scheduled[0].job_id().unwrap();
        for outcome in &outcomes {
            assert_eq!(outcome.job_id(), Some(winner), "all callers see the same job");
        }
        // Winner plus its single shared prerequisite.
        assert_eq!(fx.queue.job_count().await, 2);
    }

    #[tokio::test]
    async fn accepted_results_win_over_queue_state() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();
        let agent = AgentName::from(KEYWORD);

        fx.results.record_accepted(upload, agent.clone(), 3).await;
        // Even a live job for the same triple must not shadow the fast path.
        fx.queue
            .create_job(NewJob {
                context,
                upload,
                agent: agent.clone(),
                prerequisites: vec![],
                args: None,
            })
            .await
            .unwrap();

        let outcome = fx
            .scheduler
            .ensure_scheduled(context, upload, agent.clone(), ScanMode::Extracted)
            .await
            .unwrap();

        let SchedulingOutcome::AlreadySatisfied(claim) = outcome else {
            panic!("expected satisfied outcome");
        };
        assert_eq!(claim.upload, upload);
        assert_eq!(claim.agent, agent);
        // No prerequisite resolution, no new jobs.
        assert_eq!(fx.queue.job_count().await, 1);
    }

    #[tokio::test]
    async fn mode_selects_exactly_one_prerequisite_family() {
        let fx = fixture();
        let upload = UploadID::new();

        let compressed = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                upload,
                AgentName::from(KEYWORD),
                ScanMode::Compressed,
            )
            .await
            .unwrap();
        let SchedulingOutcome::Scheduled { job, prerequisites } = compressed else {
            panic!("expected fresh job");
        };
        assert_eq!(prerequisites.len(), 1);
        let edge = fx.queue.job(prerequisites[0]).await.unwrap().unwrap();
        assert_eq!(edge.agent, AgentName::from(EXTRACT_MIMETYPE));
        let record = fx.queue.job(job.id).await.unwrap().unwrap();
        assert_eq!(record.args.as_deref(), Some("-I"));

        let extracted = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                upload,
                AgentName::from(KEYWORD),
                ScanMode::Extracted,
            )
            .await
            .unwrap();
        let SchedulingOutcome::Scheduled { job, prerequisites } = extracted else {
            panic!("expected fresh job");
        };
        assert_eq!(prerequisites.len(), 1);
        let edge = fx.queue.job(prerequisites[0]).await.unwrap().unwrap();
        assert_eq!(edge.agent, AgentName::from(BUILD_NESTED_TREE));
        let record = fx.queue.job(job.id).await.unwrap().unwrap();
        assert_eq!(record.args, None);
    }

    #[tokio::test]
    async fn unknown_agent_is_rejected_without_side_effects() {
        let fx = fixture();
        let err = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                UploadID::new(),
                AgentName::from("nonexistent-agent"),
                ScanMode::Extracted,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::UnknownAgent(_)));
        assert!(!err.is_retryable());
        assert_eq!(fx.queue.job_count().await, 0);
    }

    #[tokio::test]
    async fn sibling_agents_share_one_prerequisite_job() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();

        let outcomes = fx
            .scheduler
            .schedule_many(
                context,
                upload,
                [
                    (AgentName::from(KEYWORD), ScanMode::Extracted),
                    (AgentName::from(COPYRIGHT), ScanMode::Extracted),
                ],
            )
            .await
            .unwrap();

        let edges: Vec<Vec<JobID>> = outcomes
            .iter()
            .map(|outcome| match outcome {
                SchedulingOutcome::Scheduled { prerequisites, .. } => prerequisites.clone(),
                other => panic!("expected fresh jobs, got {other:?}"),
            })
            .collect();
        assert_eq!(edges[0], edges[1], "both scanners depend on the same tree job");
        // Two scanners plus one shared nested-tree job.
        assert_eq!(fx.queue.job_count().await, 3);
    }

    #[tokio::test]
    async fn satisfied_prerequisite_contributes_no_edge() {
        let fx = fixture();
        let upload = UploadID::new();
        fx.results
            .record_accepted(upload, AgentName::from(BUILD_NESTED_TREE), 0)
            .await;

        let outcome = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                upload,
                AgentName::from(KEYWORD),
                ScanMode::Extracted,
            )
            .await
            .unwrap();

        let SchedulingOutcome::Scheduled { prerequisites, .. } = outcome else {
            panic!("expected fresh job");
        };
        assert!(prerequisites.is_empty());
        assert_eq!(fx.queue.job_count().await, 1);
    }

    #[tokio::test]
    async fn separate_contexts_never_deduplicate_against_each_other() {
        let fx = fixture();
        let upload = UploadID::new();
        let agent = AgentName::from(BUILD_NESTED_TREE);

        let first = fx
            .scheduler
            .ensure_scheduled(JobContextID::new(), upload, agent.clone(), ScanMode::Extracted)
            .await
            .unwrap();
        let second = fx
            .scheduler
            .ensure_scheduled(JobContextID::new(), upload, agent, ScanMode::Extracted)
            .await
            .unwrap();

        assert!(first.is_scheduled());
        assert!(second.is_scheduled());
        assert_ne!(first.job_id(), second.job_id());
    }

    #[tokio::test]
    async fn transitive_chains_stay_acyclic() {
        let registry = AgentRegistry::from_descriptors([
            AgentDescriptor::new(UNPACK, "Archive Expansion", "unpack_runs", PrerequisitePolicy::None),
            AgentDescriptor::new(
                "index-tree",
                "Tree Indexing",
                "index_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from(UNPACK)]),
            ),
            AgentDescriptor::new(
                "deep-scan",
                "Deep Scan",
                "deep_findings",
                PrerequisitePolicy::Fixed(vec![AgentName::from("index-tree")]),
            ),
        ])
        .unwrap();
        let fx = fixture_with_registry(registry, SchedulerConfig::default());
        let context = JobContextID::new();

        let outcome = fx
            .scheduler
            .ensure_scheduled(
                context,
                UploadID::new(),
                AgentName::from("deep-scan"),
                ScanMode::Extracted,
            )
            .await
            .unwrap();
        assert!(outcome.is_scheduled());

        // Walk every job's transitive prerequisites; none may reach itself.
        for job in fx.queue.jobs_in_context(context).await {
            let mut frontier = job.prerequisites.clone();
            while let Some(edge) = frontier.pop() {
                assert_ne!(edge, job.id, "job {} is its own transitive prerequisite", job.id);
                let target = fx.queue.job(edge).await.unwrap().expect("edge target exists");
                frontier.extend(target.prerequisites);
            }
        }
        assert_eq!(fx.queue.job_count().await, 3);
    }

    #[tokio::test]
    async fn cyclic_registry_fails_instead_of_deadlocking() {
        let registry = AgentRegistry::from_descriptors([
            AgentDescriptor::new(
                "ouroboros-head",
                "Head",
                "head_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from("ouroboros-tail")]),
            ),
            AgentDescriptor::new(
                "ouroboros-tail",
                "Tail",
                "tail_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from("ouroboros-head")]),
            ),
        ])
        .unwrap();
        let fx = fixture_with_registry(registry, SchedulerConfig::default());

        let err = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                UploadID::new(),
                AgentName::from("ouroboros-head"),
                ScanMode::Extracted,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }

    #[tokio::test]
    async fn chains_beyond_the_depth_cap_are_rejected() {
        let registry = AgentRegistry::from_descriptors([
            AgentDescriptor::new("layer-0", "Layer 0", "layer0_runs", PrerequisitePolicy::None),
            AgentDescriptor::new(
                "layer-1",
                "Layer 1",
                "layer1_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from("layer-0")]),
            ),
            AgentDescriptor::new(
                "layer-2",
                "Layer 2",
                "layer2_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from("layer-1")]),
            ),
            AgentDescriptor::new(
                "layer-3",
                "Layer 3",
                "layer3_runs",
                PrerequisitePolicy::Fixed(vec![AgentName::from("layer-2")]),
            ),
        ])
        .unwrap();
        let config = SchedulerConfig {
            max_chain_depth: 2,
            ..SchedulerConfig::default()
        };
        let fx = fixture_with_registry(registry, config);

        let err = fx
            .scheduler
            .ensure_scheduled(
                JobContextID::new(),
                UploadID::new(),
                AgentName::from("layer-3"),
                ScanMode::Extracted,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Configuration(_)));
    }

    #[tokio::test]
    async fn collaborator_unavailability_propagates_as_retryable() {
        struct UnreachableResultStore;

        #[async_trait]
        impl ResultStore for UnreachableResultStore {
            async fn has_accepted_results(
                &self,
                _upload: UploadID,
                _agent: &AgentName,
            ) -> Result<bool> {
                Err(ScanError::Unavailable("result store offline".into()))
            }

            async fn result_summary(
                &self,
                _upload: UploadID,
                _agent: &AgentName,
            ) -> Result<Option<ResultSummary>> {
                Err(ScanError::Unavailable("result store offline".into()))
            }
        }

        let queue = InMemoryJobQueue::new();
        let scheduler = AgentScheduler::new(
            Arc::new(AgentRegistry::builtin()),
            Arc::new(queue.clone()),
            Arc::new(UnreachableResultStore),
            Arc::new(InProcSchedulingBus::new(8)),
            SchedulerConfig::default(),
        );

        let err = scheduler
            .ensure_scheduled(
                JobContextID::new(),
                UploadID::new(),
                AgentName::from(KEYWORD),
                ScanMode::Extracted,
            )
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        // No partial application: the decision failed before any write.
        assert_eq!(queue.job_count().await, 0);
    }

    #[tokio::test]
    async fn decisions_are_announced_on_the_event_bus() {
        let fx = fixture();
        let mut rx = fx.events.subscribe();
        let context = JobContextID::new();
        let upload = UploadID::new();
        let agent = AgentName::from(KEYWORD);

        fx.scheduler
            .ensure_scheduled(context, upload, agent.clone(), ScanMode::Extracted)
            .await
            .unwrap();
        fx.scheduler
            .ensure_scheduled(context, upload, agent, ScanMode::Extracted)
            .await
            .unwrap();

        let mut scheduled = Vec::new();
        let mut deduplicated = 0;
        while let Ok(event) = rx.try_recv() {
            match event.payload {
                SchedulingEventPayload::JobScheduled { .. } => {
                    scheduled.push(event.meta.correlation_id);
                }
                SchedulingEventPayload::Deduplicated { .. } => deduplicated += 1,
                SchedulingEventPayload::Satisfied { .. } => {}
            }
        }
        // Prerequisite and requested agent on the first call, one dedup on
        // the second.
        assert_eq!(scheduled.len(), 2);
        assert_eq!(deduplicated, 1);
        // The prerequisite's event shares the top-level call's correlation.
        assert_eq!(scheduled[0], scheduled[1]);
    }

    #[tokio::test]
    async fn forget_context_releases_lock_state() {
        let fx = fixture();
        let context = JobContextID::new();
        let upload = UploadID::new();

        fx.scheduler
            .ensure_scheduled(context, upload, AgentName::from(KEYWORD), ScanMode::Extracted)
            .await
            .unwrap();
        fx.scheduler.forget_context(context).await;

        // The triple can still be scheduled afterwards (locks re-created on
        // demand); a second context remains unaffected.
        let outcome = fx
            .scheduler
            .ensure_scheduled(context, upload, AgentName::from(KEYWORD), ScanMode::Extracted)
            .await
            .unwrap();
        assert!(matches!(outcome, SchedulingOutcome::AlreadyQueued(_)));
    }
}
