//! Webhook egress payload and status types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The three-state circuit breaker state, per `spec.md` §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Deliveries are attempted normally.
    #[default]
    Closed,
    /// Deliveries are rejected without attempting the network call.
    Open,
    /// A single probe delivery is permitted to decide whether to close again.
    HalfOpen,
}

/// The payload mirrored to the configured webhook endpoint for a single event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// The SDK event name, e.g. `"agent_selected"`.
    pub event: String,
    /// The event's structured data.
    pub data: Value,
    /// Optional caller-supplied metadata merged into the payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Milliseconds since epoch the event was produced.
    pub timestamp: i64,
}

/// A snapshot of the webhook dispatcher's health, returned by `getWebhookStatus()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookStatus {
    /// Whether a webhook target is currently configured and enabled.
    pub enabled: bool,
    /// The currently configured target URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Current circuit breaker state.
    pub circuit_state: CircuitState,
    /// Number of deliveries currently queued.
    pub queue_depth: usize,
    /// Total deliveries dropped due to queue overflow.
    pub dropped: u64,
    /// Total deliveries that exhausted their retry budget.
    pub failed: u64,
    /// Total deliveries that succeeded.
    pub succeeded: u64,
}
