//! [`HandlerRegistry`]: per-type schema validation and dispatch (`spec.md` §4.2).
//!
//! Handlers never mutate session state directly or hold references to one another;
//! they act only through the narrow [`Context`] capability passed to
//! [`Handler::handle`], mirroring the teacher's `api` handlers taking a service struct
//! rather than reaching into global state.

mod agents;
mod auth;
mod messaging;
mod rooms;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use teneo_types::{
    Agent, AgentResponse, AuthState, ClientType, ConnectionState, Message, MessageType, Room,
    SdkError,
};

/// The capability surface handlers are given instead of direct access to session
/// internals. Implemented by [`crate::transport::TransportSession`].
///
/// All mutation methods apply the change and emit the corresponding event themselves
/// where `spec.md` ties the two together; handlers only decide *which* mutation the
/// inbound frame calls for.
#[async_trait]
pub trait Context: Send + Sync {
    /// Emits a typed event to registered listeners and, if eligible, the webhook
    /// dispatcher.
    fn emit(&self, event: teneo_types::Event);

    /// Enqueues a webhook delivery mirroring `event`, independent of whether `event`
    /// is also emitted to local listeners.
    fn enqueue_webhook(&self, event: &teneo_types::Event, data: Value, metadata: Option<Value>);

    /// Sends `message` back over the socket, bypassing the rate limiter (used only for
    /// protocol-mandated replies such as the `auth` frame).
    async fn send(&self, message: Message) -> Result<(), SdkError>;

    /// The address this session authenticates as.
    fn self_address(&self) -> String;

    /// The client role announced during authentication.
    fn client_type(&self) -> ClientType;

    /// The address `connect()` was configured to require, if any
    /// (`TeneoConfig::expected_address`).
    fn expected_address(&self) -> Option<String>;

    /// A read-only snapshot of the current authentication state.
    fn auth_state(&self) -> AuthState;

    /// A read-only snapshot of the current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Signs `message` with the held key, per `spec.md` §4.3.
    async fn sign(&self, message: &str) -> Result<String, SdkError>;

    /// Records the outstanding challenge nonce on the auth state. Awaits the lock
    /// rather than dropping the update on contention.
    async fn set_challenge(&self, challenge: String);

    /// Marks the session authenticated with the given state snapshot. Awaits the
    /// lock: a dropped update here would let a caller observe `auth:success`/`ready`
    /// without `AuthState.authenticated` actually having flipped.
    async fn set_authenticated(&self, state: AuthState);

    /// Marks the session's authentication as failed. Awaits the lock.
    async fn set_auth_error(&self, reason: String);

    /// Records that the server demanded authentication.
    fn set_auth_required(&self);

    /// Replaces the agent catalog wholesale. Awaits the lock.
    async fn replace_agents(&self, agents: Vec<Agent>);

    /// Seeds authoritative room metadata and the private room id, at auth time.
    /// Awaits the lock.
    async fn seed_rooms(&self, rooms: Vec<Room>, private_room_id: Option<String>);

    /// Merges room metadata without touching the subscribed set. Awaits the lock.
    async fn merge_rooms(&self, rooms: Vec<Room>);

    /// Replaces the subscribed-room set wholesale. Awaits the lock.
    async fn set_subscribed(&self, subscriptions: Vec<String>);

    /// Binds a coordinator-assigned `task_id` to the request that triggered it.
    /// Awaits the lock.
    async fn bind_task(&self, task_id: String, client_request_id: String);

    /// Attempts to resolve a pending request via a prior [`Context::bind_task`] call.
    /// Awaits the lock.
    async fn resolve_by_task(&self, task_id: &str, response: AgentResponse) -> bool;

    /// Attempts to resolve a pending request by direct `client_request_id` echo.
    /// Awaits the lock.
    async fn resolve_by_request_id(&self, client_request_id: &str, response: AgentResponse) -> bool;

    /// Attempts the same-room fallback match described in `spec.md` §4.1. Awaits the
    /// lock.
    async fn resolve_by_room_fallback(&self, room: &str, response: AgentResponse) -> bool;
}

/// A single inbound-type handler: declares the tag it owns and a validate-then-dispatch
/// routine.
#[async_trait]
pub trait Handler: Send + Sync {
    /// The message type tag this handler owns.
    fn message_type(&self) -> MessageType;

    /// Parses and dispatches `message`. Errors are contained by the caller: they
    /// produce a `message:error` event rather than propagating.
    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError>;
}

/// Maps wire type tags to their handler. Unknown tags are a no-op, per `spec.md` §4.2.
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Builds the registry with the full closed set of handlers from `spec.md` §4.2.
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();
        let all: Vec<Box<dyn Handler>> = vec![
            Box::new(auth::ChallengeHandler),
            Box::new(auth::AuthHandler),
            Box::new(auth::AuthSuccessHandler),
            Box::new(auth::AuthErrorHandler),
            Box::new(auth::AuthRequiredHandler),
            Box::new(agents::AgentsHandler),
            Box::new(agents::AgentSelectedHandler),
            Box::new(agents::TaskResponseHandler),
            Box::new(messaging::MessageHandler),
            Box::new(messaging::ErrorHandler),
            Box::new(messaging::PingHandler),
            Box::new(messaging::PongHandler),
            Box::new(rooms::SubscribeHandler),
            Box::new(rooms::UnsubscribeHandler),
            Box::new(rooms::ListRoomsHandler),
        ];
        for handler in all {
            handlers.insert(handler.message_type().as_wire_tag_static(), handler);
        }
        HandlerRegistry { handlers }
    }

    /// Dispatches `message` to its handler. A tag outside the closed set is logged at
    /// debug level and otherwise ignored. A handler error is contained: it becomes a
    /// `message:error` event rather than propagating to the caller.
    pub async fn dispatch(&self, message: &Message, ctx: &dyn Context) {
        let Some(handler) = self.handlers.get(message.r#type.as_str()) else {
            tracing::debug!(r#type = %message.r#type, "no handler for message type");
            return;
        };
        if let Err(err) = handler.handle(message, ctx).await {
            ctx.emit(teneo_types::Event::MessageError(err.to_string()));
        }
    }
}

/// Small helper trait letting `MessageType` variants name their own static tag, used as
/// the `HandlerRegistry` map key without allocating.
trait WireTagStatic {
    fn as_wire_tag_static(&self) -> &'static str;
}

impl WireTagStatic for MessageType {
    fn as_wire_tag_static(&self) -> &'static str {
        match self {
            MessageType::Challenge => "challenge",
            MessageType::Auth => "auth",
            MessageType::AuthSuccess => "auth_success",
            MessageType::AuthError => "auth_error",
            MessageType::AuthRequired => "auth_required",
            MessageType::Agents => "agents",
            MessageType::AgentSelected => "agent_selected",
            MessageType::TaskResponse => "task_response",
            MessageType::Message => "message",
            MessageType::Subscribe => "subscribe",
            MessageType::Unsubscribe => "unsubscribe",
            MessageType::ListRooms => "list_rooms",
            MessageType::Error => "error",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Other(_) => "",
        }
    }
}
