use serde::{Deserialize, Serialize};

/// Knobs that tune scheduler behaviour.
///
/// All fields carry defaults so embedders can adopt individual settings
/// without supplying a full configuration payload. The registry itself is
/// passed separately at construction; nothing here is process-global.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on transitive prerequisite depth. Chains are acyclic by
    /// construction when the registry respects the agent ordering; this cap
    /// turns a misconfigured registry into a configuration error instead of
    /// unbounded recursion.
    pub max_chain_depth: usize,
    /// Capacity of the in-process scheduling event channel.
    pub event_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: 8,
            event_channel_capacity: 64,
        }
    }
}
