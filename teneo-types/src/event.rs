//! The typed event surface emitted by the facade.

use serde_json::Value;

use crate::{Agent, AgentResponse, AuthState, CircuitState, ConnectionState, Room, SdkError};

/// Every event the SDK can emit, as described in `spec.md` §6.
///
/// Listeners registered via `TeneoClient::on` receive these by value, in the
/// handler-completion order described in `spec.md` §5.
#[derive(Debug, Clone)]
pub enum Event {
    /// The socket finished opening.
    ConnectionOpen,
    /// The socket closed, cleanly or otherwise.
    ConnectionClose {
        /// The close code, if the peer sent one.
        code: Option<u16>,
        /// The close reason, if the peer sent one.
        reason: Option<String>,
    },
    /// A transport-level error occurred.
    ConnectionError(String),
    /// A reconnection attempt is about to be made.
    ConnectionReconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// The delay before this attempt.
        delay: std::time::Duration,
    },
    /// Reconnection succeeded and the session re-authenticated.
    ConnectionReconnected,
    /// The connection state changed; carries the new snapshot.
    ConnectionState(ConnectionState),

    /// The server requires authentication before continuing.
    AuthRequired,
    /// An authentication challenge was received.
    AuthChallenge {
        /// The raw challenge nonce.
        challenge: String,
    },
    /// Authentication succeeded.
    AuthSuccess(AuthState),
    /// Authentication failed.
    AuthError(String),
    /// The auth state changed; carries the new snapshot.
    AuthState(AuthState),

    /// The agent catalog was replaced or updated.
    AgentList(Vec<Agent>),
    /// The coordinator selected an agent for a request.
    AgentSelected {
        /// The selected agent's id.
        agent_id: Option<String>,
        /// The selected agent's display name.
        agent_name: Option<String>,
        /// Coordinator-provided reasoning.
        reasoning: Option<String>,
        /// The original user request text.
        user_request: Option<String>,
        /// The command the request mapped to, if any.
        command: Option<String>,
        /// Reasoning behind the command mapping.
        command_reasoning: Option<String>,
        /// Capabilities considered during selection.
        capabilities: Vec<String>,
    },
    /// An agent produced a response.
    AgentResponse(AgentResponse),

    /// A message was sent by this client.
    MessageSent(String),
    /// A message was received from the server.
    MessageReceived(Value),
    /// An inbound frame failed schema validation.
    MessageError(String),
    /// A message was recognized as a duplicate and short-circuited.
    MessageDuplicate(String),

    /// A `subscribe` request was acknowledged.
    RoomSubscribed(String),
    /// An `unsubscribe` request was acknowledged.
    RoomUnsubscribed(String),
    /// A `list_rooms` response arrived.
    RoomList(Vec<Room>),

    /// A webhook delivery was dispatched to the HTTP client.
    WebhookSent {
        /// The mirrored event name.
        event: String,
    },
    /// A webhook delivery succeeded.
    WebhookSuccess {
        /// The mirrored event name.
        event: String,
    },
    /// A webhook delivery failed permanently.
    WebhookError {
        /// The mirrored event name.
        event: String,
        /// The failure reason.
        reason: String,
    },
    /// A webhook delivery is being retried.
    WebhookRetry {
        /// The mirrored event name.
        event: String,
        /// The attempt number about to be made.
        attempt: u32,
    },
    /// The circuit breaker protecting the webhook endpoint changed state.
    WebhookCircuitState(CircuitState),

    /// An inbound message's signature verified successfully.
    SignatureVerified {
        /// The address the signature verified against.
        address: String,
    },
    /// An inbound message's signature failed verification.
    SignatureFailed {
        /// The address the signature claimed to be from.
        address: Option<String>,
    },
    /// An inbound message required a signature but carried none.
    SignatureMissing {
        /// The message type that required a signature.
        message_type: String,
    },

    /// The client finished connecting and authenticating; safe to send traffic.
    Ready,
    /// `disconnect()` completed.
    Disconnect,
    /// `destroy()` completed; the client is now unusable.
    Destroy,

    /// A generic, possibly fatal, error.
    Error(String),
    /// A non-fatal diagnostic.
    Warning(String),
}

impl Event {
    /// The stable wire-style name used for webhook mirroring and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConnectionOpen => "connection:open",
            Event::ConnectionClose { .. } => "connection:close",
            Event::ConnectionError(_) => "connection:error",
            Event::ConnectionReconnecting { .. } => "connection:reconnecting",
            Event::ConnectionReconnected => "connection:reconnected",
            Event::ConnectionState(_) => "connection:state",
            Event::AuthRequired => "auth:required",
            Event::AuthChallenge { .. } => "auth:challenge",
            Event::AuthSuccess(_) => "auth:success",
            Event::AuthError(_) => "auth:error",
            Event::AuthState(_) => "auth:state",
            Event::AgentList(_) => "agent:list",
            Event::AgentSelected { .. } => "agent:selected",
            Event::AgentResponse(_) => "agent:response",
            Event::MessageSent(_) => "message:sent",
            Event::MessageReceived(_) => "message:received",
            Event::MessageError(_) => "message:error",
            Event::MessageDuplicate(_) => "message:duplicate",
            Event::RoomSubscribed(_) => "room:subscribed",
            Event::RoomUnsubscribed(_) => "room:unsubscribed",
            Event::RoomList(_) => "room:list",
            Event::WebhookSent { .. } => "webhook:sent",
            Event::WebhookSuccess { .. } => "webhook:success",
            Event::WebhookError { .. } => "webhook:error",
            Event::WebhookRetry { .. } => "webhook:retry",
            Event::WebhookCircuitState(_) => "webhook:circuit_state",
            Event::SignatureVerified { .. } => "signature:verified",
            Event::SignatureFailed { .. } => "signature:failed",
            Event::SignatureMissing { .. } => "signature:missing",
            Event::Ready => "ready",
            Event::Disconnect => "disconnect",
            Event::Destroy => "destroy",
            Event::Error(_) => "error",
            Event::Warning(_) => "warning",
        }
    }

    /// Whether this variant also mirrors to the webhook dispatcher.
    ///
    /// Per `spec.md` §4.6, only a curated subset of events is fanned out over HTTP.
    pub fn is_webhook_eligible(&self) -> bool {
        matches!(
            self,
            Event::AgentSelected { .. }
                | Event::AgentResponse(_)
                | Event::RoomSubscribed(_)
                | Event::RoomUnsubscribed(_)
                | Event::RoomList(_)
        )
    }
}

/// Convenience conversion used by handlers reporting a contained failure.
impl From<SdkError> for Event {
    fn from(err: SdkError) -> Self {
        Event::Error(err.to_string())
    }
}
