//! [`TeneoConfig`]: the single configuration record [`crate::TeneoClient`] is
//! constructed from (`spec.md` §6 "Configuration (enumerated)").

use std::time::Duration;

use teneo_types::{CacheConfig, ClientType, ReconnectConfig, ResponseFormatConfig, SignatureConfig, WebhookConfig};

use crate::secret::SecureSecret;

/// How the signing key is supplied to [`crate::TeneoClient::new`].
pub enum SecretSource {
    /// A raw 32-byte secp256k1 scalar, encrypted at rest immediately.
    Raw([u8; 32]),
    /// An already-prepared [`SecureSecret`], e.g. shared across clients.
    Prepared(SecureSecret),
}

impl SecretSource {
    pub(crate) fn into_secure_secret(self) -> SecureSecret {
        match self {
            SecretSource::Raw(bytes) => SecureSecret::new(bytes),
            SecretSource::Prepared(secret) => secret,
        }
    }
}

/// Full client configuration. Construction consumes exactly one of these
/// (`spec.md` §4.8: "Construction consumes a single configuration record").
pub struct TeneoConfig {
    /// The coordinator's WebSocket URL.
    pub url: String,
    /// Deadline for the initial socket open.
    pub connection_timeout: Duration,
    /// Deadline for a single `sendMessage` awaiting a response.
    pub message_timeout: Duration,
    /// The signing key.
    pub secret: SecretSource,
    /// If set, `connect()` fails authentication unless the derived address matches.
    pub expected_address: Option<String>,
    /// The role announced in the `auth` frame.
    pub client_type: ClientType,
    /// Reconnection policy for the transport.
    pub reconnect: ReconnectConfig,
    /// Which fields of [`teneo_types::AgentResponse`] get populated.
    pub response_format: ResponseFormatConfig,
    /// Dedup/rate-limit sizing.
    pub cache: CacheConfig,
    /// Inbound signature-verification policy.
    pub signature: SignatureConfig,
    /// Initial webhook target, if any; may also be set later via `configureWebhook`.
    pub webhook: Option<WebhookConfig>,
    /// A level tag only; the sink is an external collaborator (`spec.md` §1, §6).
    pub log_level: String,
}

impl TeneoConfig {
    /// Builds a configuration with every default except the required transport URL
    /// and signing key.
    pub fn new(url: impl Into<String>, secret: SecretSource) -> Self {
        TeneoConfig {
            url: url.into(),
            connection_timeout: Duration::from_secs(30),
            message_timeout: Duration::from_secs(30),
            secret,
            expected_address: None,
            client_type: ClientType::default(),
            reconnect: ReconnectConfig::default(),
            response_format: ResponseFormatConfig::default(),
            cache: CacheConfig::default(),
            signature: SignatureConfig::default(),
            webhook: None,
            log_level: "info".to_string(),
        }
    }
}
