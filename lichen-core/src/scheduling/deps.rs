//! Prerequisite chain resolution.
//!
//! The one piece of per-agent-family policy lives here, kept apart from the
//! scheduling side effects: a pure function from (agent, mode) to the
//! ordered list of agents that must complete first. The resolver computes
//! structure only; it never schedules anything.

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::registry::{AgentRegistry, PrerequisitePolicy};
use lichen_model::AgentName;

use super::job::ScanMode;

#[derive(Clone, Debug)]
pub struct DependencyResolver {
    registry: Arc<AgentRegistry>,
}

impl DependencyResolver {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Compute the ordered prerequisite chain for `agent` under `mode`.
    ///
    /// The chain order is the required execution order. Agents without
    /// prerequisites yield an empty chain. For mode-selected agents the
    /// mode picks exactly one of the two chains, never both, never neither.
    pub fn resolve(&self, agent: &AgentName, mode: ScanMode) -> Result<Vec<AgentName>> {
        let descriptor = self.registry.require(agent)?;

        let chain = match &descriptor.prerequisites {
            PrerequisitePolicy::None => Vec::new(),
            PrerequisitePolicy::ModeSelected {
                compressed,
                extracted,
            } => match mode {
                ScanMode::Compressed => compressed.clone(),
                ScanMode::Extracted => extracted.clone(),
            },
            PrerequisitePolicy::Fixed(chain) => chain.clone(),
        };

        Ok(self.sanitize(agent, chain))
    }

    /// Drop repeated entries and self-references from a configured chain,
    /// preserving the first occurrence's position.
    fn sanitize(&self, agent: &AgentName, chain: Vec<AgentName>) -> Vec<AgentName> {
        let mut seen: Vec<&AgentName> = Vec::with_capacity(chain.len());
        let mut sanitized = Vec::with_capacity(chain.len());
        for prerequisite in &chain {
            if prerequisite == agent {
                warn!(agent = %agent, "dropping self-referential prerequisite");
                continue;
            }
            if seen.contains(&prerequisite) {
                warn!(agent = %agent, prerequisite = %prerequisite, "dropping duplicate prerequisite");
                continue;
            }
            seen.push(prerequisite);
            sanitized.push(prerequisite.clone());
        }
        sanitized
    }
}
