//! Agent catalog entities.

use serde::{Deserialize, Serialize};

/// Online/offline status of an [`Agent`] as reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// The agent is reachable and accepting work.
    Online,
    /// The agent is known but currently unreachable.
    Offline,
}

/// A capability an [`Agent`] advertises, used to build the capability index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    /// The capability name, e.g. `"summarize"`.
    pub name: String,
    /// A human-readable description of the capability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A slash-style command an [`Agent`] exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// The trigger token, e.g. `"/summarize"`.
    pub trigger: String,
    /// The expected argument shape, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    /// A human-readable description of the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A server-side worker known to the client through the `agents` message.
///
/// [`Agent`] values returned from [`crate::Result`]-returning registry lookups are
/// always defensive copies; mutating a returned value never affects registry state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier of the agent.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current reachability.
    pub status: AgentStatus,
    /// Capabilities advertised by the agent.
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    /// Commands advertised by the agent.
    #[serde(default)]
    pub commands: Vec<Command>,
    /// Room the agent is scoped to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Coordinator-assigned agent type/category.
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "agentType")]
    pub agent_type: Option<String>,
}
