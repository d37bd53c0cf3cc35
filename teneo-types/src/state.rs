//! Connection and authentication state snapshots.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::Room;

/// A point-in-time snapshot of the transport's connection state.
///
/// `spec.md` §3 requires `AuthState.authenticated ⇒ ConnectionState.connected`; callers
/// only ever observe copies of this struct, never a live handle, so the invariant is
/// enforced solely by [`crate`]-internal mutation order in `teneo-sdk`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Whether a socket is currently open.
    pub connected: bool,
    /// Whether the open socket has completed authentication.
    pub authenticated: bool,
    /// Whether a reconnection loop is currently running.
    pub reconnecting: bool,
    /// Number of reconnection attempts made for the current outage.
    pub reconnect_attempts: u32,
    /// Wall-clock time the socket was last successfully opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<SystemTime>,
    /// The last transport-level error observed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// A point-in-time snapshot of the authentication state.
///
/// Reset to its default whenever the socket is lost; repopulated on each successful
/// authentication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    /// Whether the session is currently authenticated.
    pub authenticated: bool,
    /// Coordinator-assigned client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// The wallet address this session authenticated as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    /// Whitelist status, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_whitelisted: Option<bool>,
    /// Admin-whitelist status, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    /// NFT-gated verification status, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_verified: Option<bool>,
    /// Ids of the rooms this client belongs to, per the authoritative auth payload.
    #[serde(default)]
    pub rooms: Vec<String>,
    /// Full metadata for the rooms above.
    #[serde(default)]
    pub room_objects: Vec<Room>,
    /// The client's private room, if one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_room_id: Option<String>,
    /// The outstanding authentication challenge, while one is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
}

/// The aggregate health snapshot returned by `TeneoClient::health`.
///
/// Not named explicitly in `spec.md`'s Facade table beyond `getHealth()`; its shape is
/// fully determined by state the spec already tracks elsewhere (see `SPEC_FULL.md`
/// §10).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Health {
    /// Current connection state.
    pub connection: ConnectionState,
    /// Current authentication state.
    pub authenticated: bool,
    /// Count of requests awaiting a reply.
    pub pending_request_count: usize,
    /// Current depth of the webhook delivery queue.
    pub webhook_queue_depth: usize,
    /// Current webhook circuit breaker state.
    pub circuit_state: crate::CircuitState,
}
