//! The normalized response shape produced from `task_response`/`message` frames.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A response produced by an agent, correlated back to the request that triggered it.
///
/// `raw` carries the server's unmodified payload while `humanized` carries a
/// human-readable rendering; which fields are populated is governed by the client's
/// configured [`crate::ResponseFormat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The coordinator-assigned task id this response completes.
    pub task_id: String,
    /// The id of the agent that produced the response.
    pub agent_id: String,
    /// The display name of the agent, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    /// The structured content of the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    /// MIME-style content type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Whether the agent considered the task a success.
    pub success: bool,
    /// The error message, when `success` is `false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-reported timestamp (ms since epoch), if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// The verbatim server payload this response was built from.
    pub raw: Value,
    /// A human-readable rendering of `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humanized: Option<String>,
}
