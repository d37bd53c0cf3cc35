//! Error taxonomy for the Teneo client SDK.

/// Errors surfaced by the SDK, either returned from a fallible call or emitted on the
/// `error` event.
///
/// Every variant is classified as recoverable or not via [`SdkError::recoverable`];
/// recoverable errors do not end the session, while non-recoverable ones terminate the
/// current connection attempt (see `spec.md` §7 for the propagation policy this
/// mirrors).
#[derive(Debug, thiserror::Error)]
pub enum SdkError {
    /// The transport is not connected, or was lost mid-operation.
    #[error("connection error: {0}")]
    Connection(String),

    /// Authentication with the coordinator failed or was rejected.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// A deadline elapsed while awaiting a connection, authentication, or reply.
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An inbound or outbound message failed schema validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// The coordinator surfaced an application-level error frame.
    #[error("server error: {0}")]
    Message(String),

    /// A webhook delivery failed permanently (retries exhausted, or SSRF rejection).
    #[error("webhook error: {0}")]
    Webhook(String),

    /// The outbound rate limiter refused to admit a send.
    #[error("rate limit exceeded")]
    RateLimit,

    /// Any other SDK-internal error, carrying a stable `code` for programmatic
    /// matching and the underlying cause where one exists.
    #[error("{code}: {message}")]
    Sdk {
        /// Stable machine-readable error code.
        code: &'static str,
        /// Human-readable description.
        message: String,
        /// The underlying cause, if any.
        #[source]
        cause: Option<Box<SdkError>>,
    },
}

impl SdkError {
    /// Whether the session can continue after this error (vs. requiring a fresh
    /// connect/reconnect cycle).
    pub fn recoverable(&self) -> bool {
        match self {
            SdkError::Connection(_) | SdkError::Authentication(_) => false,
            SdkError::Timeout(_)
            | SdkError::Validation(_)
            | SdkError::Message(_)
            | SdkError::Webhook(_)
            | SdkError::RateLimit => true,
            SdkError::Sdk { .. } => false,
        }
    }

    /// Builds the generic `Sdk` variant with a code and message.
    pub fn sdk(code: &'static str, message: impl Into<String>) -> Self {
        SdkError::Sdk {
            code,
            message: message.into(),
            cause: None,
        }
    }
}
