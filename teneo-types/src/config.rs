//! Pure-data configuration records.
//!
//! These are the sub-configs embedded in `teneo_sdk::TeneoConfig`. They live here
//! (rather than in `teneo-sdk`) because they carry no crypto/runtime dependency and
//! are useful to downstream crates that want to construct or inspect them without
//! pulling in the full SDK.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The role a client announces itself as during authentication.
///
/// `spec.md` §9 leaves the precise semantics of `Coordinator` undefined server-side;
/// the SDK forwards it as an opaque tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    /// An end-user client.
    User,
    /// An agent-role client.
    Agent,
    /// A coordinator-role client.
    Coordinator,
}

impl Default for ClientType {
    fn default() -> Self {
        ClientType::User
    }
}

impl ClientType {
    /// The wire string for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientType::User => "user",
            ClientType::Agent => "agent",
            ClientType::Coordinator => "coordinator",
        }
    }
}

/// The pluggable delay shape for [`ReconnectConfig`] and webhook retry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategyKind {
    /// `base * multiplier^(attempt - 1)`, capped at `max_delay`.
    Exponential,
    /// `base * attempt`, capped at `max_delay`.
    Linear,
    /// Always `base`.
    Constant,
}

/// Reconnection policy for the transport session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// Whether automatic reconnection is enabled at all.
    pub enabled: bool,
    /// Which delay shape to use.
    pub strategy: BackoffStrategyKind,
    /// The base delay (attempt 1).
    pub base_delay: Duration,
    /// The maximum delay any attempt may wait, before jitter.
    pub max_delay: Duration,
    /// The maximum number of attempts before giving up permanently.
    pub max_attempts: u32,
    /// The maximum additional random jitter added to each delay.
    pub jitter: Duration,
    /// The multiplier used by the `Exponential` strategy.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfig {
            enabled: true,
            strategy: BackoffStrategyKind::Exponential,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(120),
            max_attempts: 15,
            jitter: Duration::from_millis(1000),
            backoff_multiplier: 2.5,
        }
    }
}

/// Which representation(s) of an agent response the facade should populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Only the server's verbatim payload.
    Raw,
    /// Only the human-readable rendering.
    Humanized,
    /// Both representations.
    Both,
}

impl Default for ResponseFormat {
    fn default() -> Self {
        ResponseFormat::Both
    }
}

/// Controls which fields of [`crate::AgentResponse`] get populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormatConfig {
    /// The selected format.
    pub format: ResponseFormat,
    /// Whether to attach server-reported metadata alongside content.
    pub include_metadata: bool,
}

/// Dedup/rate-limit cache sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether message deduplication is enabled.
    pub dedup_enabled: bool,
    /// How long a seen message id is remembered.
    pub dedup_ttl: Duration,
    /// The maximum number of remembered message ids.
    pub dedup_max_size: usize,
    /// Whether the outbound rate limiter is enabled.
    pub rate_limit_enabled: bool,
    /// Sustained token refill rate, in tokens/second.
    pub rate_limit_per_second: f64,
    /// Bucket capacity (burst size).
    pub rate_limit_burst: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            dedup_enabled: true,
            dedup_ttl: Duration::from_secs(60),
            dedup_max_size: 10_000,
            rate_limit_enabled: true,
            rate_limit_per_second: 10.0,
            rate_limit_burst: 20,
        }
    }
}

/// Inbound signature-verification policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Whether signature verification is performed at all.
    pub enabled: bool,
    /// Addresses whose signatures are accepted.
    pub trusted_addresses: Vec<String>,
    /// Message types that must carry a valid signature.
    pub require_for: Vec<String>,
    /// When `true`, a failed/missing signature drops the message; otherwise it is
    /// only reported via an event.
    pub strict_mode: bool,
}

/// Webhook egress configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The HTTP endpoint deliveries are POSTed to.
    pub url: String,
    /// Extra headers attached to every delivery.
    pub headers: std::collections::HashMap<String, String>,
    /// Lifts the loopback-address restriction of the SSRF validator, for local
    /// development only.
    pub allow_insecure_webhooks: bool,
    /// Retry policy applied to a single delivery.
    pub retry: ReconnectConfig,
    /// Maximum number of deliveries the [`crate`]-external `BoundedQueue` holds before
    /// dropping the oldest pending entry.
    pub queue_capacity: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        WebhookConfig {
            url: String::new(),
            headers: std::collections::HashMap::new(),
            allow_insecure_webhooks: false,
            retry: ReconnectConfig {
                enabled: true,
                strategy: BackoffStrategyKind::Exponential,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(30),
                max_attempts: 5,
                jitter: Duration::from_millis(250),
                backoff_multiplier: 2.0,
            },
            queue_capacity: 1_000,
        }
    }
}
