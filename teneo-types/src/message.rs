//! Message envelope and per-type inbound payload schemas.
//!
//! `spec.md` §4.2 describes a closed set of inbound `type` tags, each validated
//! against its own schema before dispatch. Rather than one giant tagged enum (which
//! would force every handler to match on variants it doesn't own), each inbound type
//! gets its own small `*Data` struct deserialized on demand from the raw frame value;
//! [`MessageType`] is only the tag itself. Unknown tags are represented, never
//! rejected, matching the "unknown types degrade to a catch-all variant rather than
//! throwing" guidance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Room;

/// The closed set of inbound/outbound frame tags recognized by the protocol.
///
/// `Other` carries any tag not in the closed set; handling it is always a no-op (see
/// `spec.md` §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Server-issued authentication challenge.
    Challenge,
    /// Identity frame, either solicited (reply to `auth`) or unsolicited (cached auth).
    Auth,
    /// Legacy explicit success tag, semantically equivalent to a populated `Auth`.
    AuthSuccess,
    /// Authentication was rejected.
    AuthError,
    /// The server requires authentication before continuing.
    AuthRequired,
    /// A full replacement of the known agent list.
    Agents,
    /// The coordinator selected an agent to handle a request.
    AgentSelected,
    /// An agent produced a response to a task.
    TaskResponse,
    /// A generic chat-style message, possibly agent-originated.
    Message,
    /// Acknowledgement of a `subscribe` request.
    Subscribe,
    /// Acknowledgement of an `unsubscribe` request.
    Unsubscribe,
    /// Response to a `list_rooms` request.
    ListRooms,
    /// A server-surfaced application error.
    Error,
    /// Heartbeat ping.
    Ping,
    /// Heartbeat pong.
    Pong,
    /// Any tag outside the closed set above.
    Other(String),
}

impl MessageType {
    /// Parses the wire tag string into a [`MessageType`].
    pub fn parse(tag: &str) -> Self {
        match tag {
            "challenge" => MessageType::Challenge,
            "auth" => MessageType::Auth,
            "auth_success" => MessageType::AuthSuccess,
            "auth_error" => MessageType::AuthError,
            "auth_required" => MessageType::AuthRequired,
            "agents" => MessageType::Agents,
            "agent_selected" => MessageType::AgentSelected,
            "task_response" => MessageType::TaskResponse,
            "message" => MessageType::Message,
            "subscribe" => MessageType::Subscribe,
            "unsubscribe" => MessageType::Unsubscribe,
            "list_rooms" => MessageType::ListRooms,
            "error" => MessageType::Error,
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            other => MessageType::Other(other.to_string()),
        }
    }

    /// Renders the wire tag string for this type.
    pub fn as_wire_tag(&self) -> &str {
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
            MessageType::Other(tag) => tag,
        }
    }
}

/// The general-purpose outbound/inbound message envelope.
///
/// Mirrors the `Message` entity in `spec.md` §3: every field but `type` is optional
/// because different frame kinds populate different subsets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    /// The frame's tag, from the closed set in [`MessageType`].
    #[serde(rename = "type")]
    pub r#type: String,
    /// Server- or client-assigned id, used for deduplication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Sender address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient address, for directed frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Room scope of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    /// Free-form textual content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// MIME-style tag describing `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Type-specific structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Hex-encoded ECDSA signature over the message's canonical form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Server- or client-assigned timestamp (ms since epoch).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Message {
    /// Builds a bare envelope with only the `type` tag set.
    pub fn new(r#type: impl Into<String>) -> Self {
        Message {
            r#type: r#type.into(),
            ..Default::default()
        }
    }

    /// Reads `data.client_request_id` if present.
    pub fn client_request_id(&self) -> Option<&str> {
        self.data.as_ref()?.get("client_request_id")?.as_str()
    }

    /// Reads `data.task_id` if present.
    pub fn task_id(&self) -> Option<&str> {
        self.data.as_ref()?.get("task_id")?.as_str()
    }
}

/// Schema for a `challenge` frame's implicit payload (the nonce is carried directly
/// in `content`, matching the literal end-to-end scenario in `spec.md` §8).
#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeData {
    /// The nonce bytes the client must sign, as delivered by the server.
    pub challenge: String,
}

impl ChallengeData {
    /// Extracts challenge data from a raw frame, falling back to the top-level
    /// `content` field when `data.challenge` is absent.
    pub fn from_message(msg: &Message) -> Option<Self> {
        if let Some(data) = &msg.data {
            if let Some(challenge) = data.get("challenge").and_then(Value::as_str) {
                return Some(ChallengeData {
                    challenge: challenge.to_string(),
                });
            }
        }
        msg.content.clone().map(|challenge| ChallengeData { challenge })
    }
}

/// Schema for the identity fields carried on `auth`/`auth_success` frames.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthInboundData {
    /// Client id assigned by the coordinator.
    #[serde(default)]
    pub id: Option<String>,
    /// The wallet address the coordinator believes it authenticated.
    #[serde(default)]
    pub address: Option<String>,
    /// Set when this `auth` frame reflects a server-side cached session.
    #[serde(default)]
    pub cached_auth: Option<bool>,
    /// Present when this frame is directed at a specific client id.
    #[serde(default)]
    pub to: Option<String>,
    /// Whitelist status.
    #[serde(default)]
    pub is_whitelisted: Option<bool>,
    /// Admin-whitelist status.
    #[serde(default)]
    pub is_admin_whitelisted: Option<bool>,
    /// NFT-gated verification status.
    #[serde(default)]
    pub nft_verified: Option<bool>,
    /// Authoritative room metadata for this client.
    #[serde(default)]
    pub rooms: Vec<Room>,
    /// The client's private room, if one was assigned.
    #[serde(default)]
    pub private_room_id: Option<String>,
}

impl AuthInboundData {
    /// Parses the `data` object of an `auth`/`auth_success` frame.
    pub fn from_message(msg: &Message) -> Self {
        msg.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Whether this frame carries enough identity evidence to count as a successful
    /// authentication, per `spec.md` §4.1: an `id`, an `address`, a `cached_auth`
    /// flag, or a `to` naming this client.
    pub fn is_authenticating(&self, self_address: &str) -> bool {
        self.id.is_some()
            || self.address.is_some()
            || self.cached_auth.unwrap_or(false)
            || self.to.as_deref() == Some(self_address)
    }
}

/// Schema for the `data` object of an `agent_selected` frame.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentSelectedData {
    /// The selected agent's id.
    #[serde(default, rename = "agentId")]
    pub agent_id: Option<String>,
    /// The selected agent's display name.
    #[serde(default, rename = "agentName")]
    pub agent_name: Option<String>,
    /// Coordinator-provided reasoning for the selection.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// The original user request text.
    #[serde(default, rename = "userRequest")]
    pub user_request: Option<String>,
    /// The command the coordinator mapped the request to, if any.
    #[serde(default)]
    pub command: Option<String>,
    /// Reasoning behind the command mapping.
    #[serde(default, rename = "commandReasoning")]
    pub command_reasoning: Option<String>,
    /// Capabilities considered during selection.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// The client-issued correlation id this selection answers.
    #[serde(default)]
    pub client_request_id: Option<String>,
    /// The coordinator-assigned task id that the eventual `task_response` will carry.
    #[serde(default)]
    pub task_id: Option<String>,
}

impl AgentSelectedData {
    /// Parses the `data` object of an `agent_selected` frame.
    pub fn from_message(msg: &Message) -> Self {
        msg.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// Schema for the `data.subscriptions` field on `subscribe`/`unsubscribe`
/// acknowledgements.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeAckData {
    /// Whether the request succeeded.
    #[serde(default)]
    pub success: Option<bool>,
    /// The authoritative set of subscribed room ids after this change.
    #[serde(default)]
    pub subscriptions: Vec<String>,
}

impl SubscribeAckData {
    /// Parses the `data` object of a `subscribe`/`unsubscribe` acknowledgement.
    pub fn from_message(msg: &Message) -> Self {
        msg.data
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}
