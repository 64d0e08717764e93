//! # Lichen Core
//!
//! Core library for the Lichen compliance scanning platform: the agent job
//! scheduling and deduplication subsystem behind the analysis pipeline
//! (unpack, decompression, keyword/license/copyright scanning).
//!
//! The single public entry point is
//! [`AgentScheduler::ensure_scheduled`](scheduling::AgentScheduler::ensure_scheduled),
//! which reconciles persisted results, in-flight queue state, and the
//! per-agent dependency chain into one idempotent scheduling decision. The
//! web transport, storage schema, search engine, and the agents' scanning
//! algorithms live elsewhere and are consumed through the collaborator
//! traits defined in [`scheduling`].
//!
//! ## Feature Flags
//!
//! - `database`: Postgres-backed queue and result-store adapters (SQLx).

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod error;
pub mod persistence;
pub mod registry;
pub mod scheduling;

pub use error::{Result, ScanError};
pub use registry::{AgentDescriptor, AgentRegistry, PrerequisitePolicy};
pub use scheduling::{
    AgentScheduler, DependencyResolver, InMemoryJobQueue, InMemoryResultStore,
    InProcSchedulingBus, JobQueue, JobRecord, JobRef, JobStatus, NewJob, ResultStore, ScanMode,
    SchedulerConfig, SchedulingOutcome,
};

pub use lichen_model as model;
