//! Static agent registry.
//!
//! Every analysis agent the platform can run is described here once, at
//! process start. The registry is immutable afterwards; the scheduler and
//! dependency resolver only ever read it. There is no runtime plugin
//! hierarchy: the closed set of agent families is data, dispatched by name.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use lichen_model::AgentName;

/// Agent that expands uploaded archives into individual files.
pub const UNPACK: &str = "unpack";
/// Agent that identifies and extracts contents by MIME-detected unpacking.
pub const EXTRACT_MIMETYPE: &str = "extract-mimetype";
/// Agent that materializes the nested-set representation of the extracted tree.
pub const BUILD_NESTED_TREE: &str = "build-nested-tree";
/// Keyword scanner over file contents.
pub const KEYWORD: &str = "keyword";
/// License scanner over file contents.
pub const LICENSE: &str = "license";
/// Copyright statement scanner over file contents.
pub const COPYRIGHT: &str = "copyright";

/// How an agent's prerequisite chain is derived.
///
/// The table is deliberately data-driven so new agent families slot in
/// without touching the scheduler: `Fixed` carries chains of any length, and
/// further variants can be added next to `ModeSelected` if an agent ever
/// needs to branch on more than the scan mode.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum PrerequisitePolicy {
    /// No prerequisites; the agent can run directly against the upload.
    None,
    /// The scan mode selects exactly one of two chains.
    ModeSelected {
        /// Chain used when scanning inside compressed containers.
        compressed: Vec<AgentName>,
        /// Chain used when scanning the already-unpacked file tree.
        extracted: Vec<AgentName>,
    },
    /// Unconditional ordered chain.
    Fixed(Vec<AgentName>),
}

impl PrerequisitePolicy {
    /// Whether the scan mode influences this agent's prerequisites.
    pub fn mode_applies(&self) -> bool {
        matches!(self, PrerequisitePolicy::ModeSelected { .. })
    }
}

/// Static metadata for one analysis agent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique registry key.
    pub name: AgentName,
    /// Human-readable title shown in operator surfaces.
    pub title: String,
    /// Identifier of the analysis-result table this agent populates. The
    /// table itself is owned by the storage collaborator; the core only
    /// passes the identifier along.
    pub result_table: String,
    pub prerequisites: PrerequisitePolicy,
}

impl AgentDescriptor {
    pub fn new(
        name: impl Into<AgentName>,
        title: impl Into<String>,
        result_table: impl Into<String>,
        prerequisites: PrerequisitePolicy,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            result_table: result_table.into(),
            prerequisites,
        }
    }
}

/// Immutable name-to-descriptor mapping, loaded once at startup.
#[derive(Clone, Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentName, AgentDescriptor>,
}

impl AgentRegistry {
    /// Build a registry from descriptors, rejecting duplicate names.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self>
    where
        I: IntoIterator<Item = AgentDescriptor>,
    {
        let mut agents = HashMap::new();
        for descriptor in descriptors {
            let name = descriptor.name.clone();
            if agents.insert(name.clone(), descriptor).is_some() {
                return Err(ScanError::Configuration(format!(
                    "agent {name} registered twice"
                )));
            }
        }
        Ok(Self { agents })
    }

    /// The built-in agent set shipped with the platform.
    pub fn builtin() -> Self {
        let scan_family = || PrerequisitePolicy::ModeSelected {
            compressed: vec![AgentName::from(EXTRACT_MIMETYPE)],
            extracted: vec![AgentName::from(BUILD_NESTED_TREE)],
        };

        let descriptors = [
            AgentDescriptor::new(UNPACK, "Archive Expansion", "unpack_runs", PrerequisitePolicy::None),
            AgentDescriptor::new(
                EXTRACT_MIMETYPE,
                "MIME-typed Extraction",
                "mimetype_runs",
                PrerequisitePolicy::None,
            ),
            AgentDescriptor::new(
                BUILD_NESTED_TREE,
                "Nested Tree Construction",
                "nested_tree_runs",
                PrerequisitePolicy::None,
            ),
            AgentDescriptor::new(KEYWORD, "Keyword Analysis", "keyword_findings", scan_family()),
            AgentDescriptor::new(LICENSE, "License Analysis", "license_findings", scan_family()),
            AgentDescriptor::new(
                COPYRIGHT,
                "Copyright Analysis",
                "copyright_findings",
                scan_family(),
            ),
        ];

        Self::from_descriptors(descriptors).expect("builtin registry has unique names")
    }

    pub fn get(&self, name: &str) -> Option<&AgentDescriptor> {
        self.agents.get(name)
    }

    /// Look up a descriptor, surfacing the unknown-agent configuration error.
    pub fn require(&self, name: &AgentName) -> Result<&AgentDescriptor> {
        self.agents
            .get(name.as_str())
            .ok_or_else(|| ScanError::UnknownAgent(name.clone()))
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &AgentName> {
        self.agents.keys()
    }
}
