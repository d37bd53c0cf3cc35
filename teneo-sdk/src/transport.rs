//! [`TransportSession`]: socket lifecycle, auth state machine, reconnection loop, and
//! the serialized outbound send path (`spec.md` §4.1).

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use teneo_types::{
    Agent, AgentResponse, AuthState, ClientType, ConnectionState, Event, Message, Room, SdkError,
};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite};
use uuid::Uuid;

use backon::BackoffBuilder;

use crate::backoff::SpecBackoff;
use crate::config::TeneoConfig;
use crate::dedup::DedupCache;
use crate::events::EventBus;
use crate::handlers::{Context, HandlerRegistry};
use crate::pending::PendingRequests;
use crate::ratelimit::RateLimiter;
use crate::registry::{AgentRegistry, RoomRegistry};
use crate::signer::SignatureOracle;
use crate::webhook::WebhookDispatcher;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, tungstenite::Message>;

/// `spec.md` §6 hard wire constants.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const AUTH_POLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INBOUND_MESSAGE_BYTES: usize = 2 * 1024 * 1024;

/// Options accepted by [`TransportSession::send_message`], mirroring the facade's
/// `sendMessage`/`sendDirectCommand` parameters (`spec.md` §6).
#[derive(Default)]
pub struct SendOptions {
    /// The room to scope the send to.
    pub room: Option<String>,
    /// Explicit agent target; disables the reply-correlation room fallback.
    pub target_agent: Option<String>,
    /// Whether to register a [`crate::pending::PendingRequests`] slot and await a
    /// reply.
    pub wait_for_response: bool,
    /// Per-call timeout, overriding `TeneoConfig::message_timeout`.
    pub timeout: Option<Duration>,
}

/// The slice of [`TeneoConfig`] a session needs for its whole lifetime.
///
/// Holds no copy of the signing key: [`TeneoConfig::secret`] is consumed once, at
/// construction, into the [`SignatureOracle`] and is never read again.
struct SessionConfig {
    url: String,
    connection_timeout: Duration,
    message_timeout: Duration,
    expected_address: Option<String>,
    client_type: ClientType,
    reconnect: teneo_types::ReconnectConfig,
    signature: teneo_types::SignatureConfig,
    dedup_enabled: bool,
    rate_limit_enabled: bool,
}

/// Owns the socket, the auth state machine, the heartbeat, the reconnection loop, and
/// every other per-session component the facade composes over.
pub struct TransportSession {
    config: SessionConfig,
    oracle: SignatureOracle,
    events: Arc<EventBus>,
    webhook: Arc<WebhookDispatcher>,
    handlers: HandlerRegistry,

    connection: RwLock<ConnectionState>,
    auth: RwLock<AuthState>,
    auth_failure: Mutex<Option<String>>,
    dedup: Mutex<DedupCache>,
    rate_limiter: Mutex<RateLimiter>,
    pending: Mutex<PendingRequests>,
    agents: Mutex<AgentRegistry>,
    rooms: Mutex<RoomRegistry>,

    writer: Mutex<Option<WsWriter>>,
    last_frame_at: Mutex<Instant>,
    stopped: AtomicBool,
    reconnect_attempts: AtomicU32,
}

impl TransportSession {
    /// Builds a session in the `DISCONNECTED` state. Does not dial.
    pub fn new(config: TeneoConfig, events: Arc<EventBus>, webhook: Arc<WebhookDispatcher>) -> Result<Arc<Self>, SdkError> {
        let cache = config.cache.clone();
        let session_config = SessionConfig {
            url: config.url.clone(),
            connection_timeout: config.connection_timeout,
            message_timeout: config.message_timeout,
            expected_address: config.expected_address.clone(),
            client_type: config.client_type,
            reconnect: config.reconnect.clone(),
            signature: config.signature.clone(),
            dedup_enabled: cache.dedup_enabled,
            rate_limit_enabled: cache.rate_limit_enabled,
        };
        let oracle = SignatureOracle::new(config.secret.into_secure_secret())?;

        Ok(Arc::new(TransportSession {
            dedup: Mutex::new(DedupCache::new(cache.dedup_ttl, cache.dedup_max_size)),
            rate_limiter: Mutex::new(RateLimiter::new(cache.rate_limit_per_second, cache.rate_limit_burst)),
            pending: Mutex::new(PendingRequests::new()),
            agents: Mutex::new(AgentRegistry::new()),
            rooms: Mutex::new(RoomRegistry::new()),
            handlers: HandlerRegistry::new(),
            connection: RwLock::new(ConnectionState::default()),
            auth: RwLock::new(AuthState::default()),
            auth_failure: Mutex::new(None),
            writer: Mutex::new(None),
            last_frame_at: Mutex::new(Instant::now()),
            stopped: AtomicBool::new(false),
            reconnect_attempts: AtomicU32::new(0),
            oracle,
            events,
            webhook,
            config: session_config,
        }))
    }

    /// Opens the transport and drives it to `AUTHENTICATED`, per the state machine in
    /// `spec.md` §4.1. Returns once `ready`, or fails with `ConnectionError`,
    /// `AuthenticationError`, or `TimeoutError`.
    pub async fn connect(self: &Arc<Self>) -> Result<(), SdkError> {
        self.stopped.store(false, Ordering::SeqCst);
        self.dial_and_wait_for_ready().await?;
        let session = self.clone();
        tokio::spawn(async move { session.heartbeat_loop().await });
        Ok(())
    }

    async fn dial_and_wait_for_ready(self: &Arc<Self>) -> Result<(), SdkError> {
        *self.auth_failure.lock().await = None;

        let (ws, _response) = tokio::time::timeout(
            self.config.connection_timeout,
            tokio_tungstenite::connect_async(&self.config.url),
        )
        .await
        .map_err(|_| SdkError::Timeout(self.config.connection_timeout))?
        .map_err(|e| SdkError::Connection(e.to_string()))?;

        let (writer, mut reader) = ws.split();
        *self.writer.lock().await = Some(writer);
        *self.last_frame_at.lock().await = Instant::now();
        {
            let mut state = self.connection.write().await;
            state.connected = true;
            state.last_connected_at = Some(SystemTime::now());
            state.last_error = None;
        }
        self.events.emit(&Event::ConnectionOpen);

        let session = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                match frame {
                    Ok(tungstenite::Message::Text(text)) => {
                        *session.last_frame_at.lock().await = Instant::now();
                        if text.len() > MAX_INBOUND_MESSAGE_BYTES {
                            session.events.emit(&Event::MessageError("inbound frame exceeds 2 MiB".into()));
                            continue;
                        }
                        session.process_inbound(&text).await;
                    }
                    Ok(tungstenite::Message::Ping(_)) | Ok(tungstenite::Message::Pong(_)) => {
                        *session.last_frame_at.lock().await = Instant::now();
                    }
                    Ok(tungstenite::Message::Close(frame)) => {
                        session.events.emit(&Event::ConnectionClose {
                            code: frame.as_ref().map(|f| f.code.into()),
                            reason: frame.map(|f| f.reason.to_string()),
                        });
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        session.events.emit(&Event::ConnectionError(e.to_string()));
                        break;
                    }
                }
            }
            session.on_socket_lost().await;
        });

        let deadline = Instant::now() + self.config.connection_timeout + self.config.message_timeout;
        loop {
            if self.auth.read().await.authenticated {
                return Ok(());
            }
            if let Some(reason) = self.auth_failure.lock().await.clone() {
                return Err(SdkError::Authentication(reason));
            }
            if Instant::now() >= deadline {
                return Err(SdkError::Timeout(self.config.message_timeout));
            }
            tokio::time::sleep(AUTH_POLL_INTERVAL).await;
        }
    }

    async fn process_inbound(self: &Arc<Self>, text: &str) {
        self.events.emit(&Event::MessageReceived(
            serde_json::from_str(text).unwrap_or(serde_json::Value::Null),
        ));

        let message: Message = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                self.events.emit(&Event::MessageError(format!("malformed frame: {e}")));
                return;
            }
        };

        if self.config.dedup_enabled {
            if let Some(id) = message.id.as_deref().filter(|id| !id.is_empty()) {
                let mut dedup = self.dedup.lock().await;
                if dedup.contains(id) {
                    drop(dedup);
                    self.events.emit(&Event::MessageDuplicate(id.to_string()));
                    return;
                }
                dedup.insert(id.to_string());
            }
        }

        if !self.verify_signature(&message).await {
            if self.config.signature.strict_mode {
                return;
            }
        }

        self.handlers.dispatch(&message, self.as_ref()).await;
    }

    /// Verifies `message.signature` when its type requires one, per `spec.md` §4.2.
    /// Returns `true` when verification is not required, succeeds, or is permissive.
    async fn verify_signature(&self, message: &Message) -> bool {
        if !self.config.signature.enabled || !self.config.signature.require_for.contains(&message.r#type) {
            return true;
        }
        let Some(signature) = &message.signature else {
            self.events.emit(&Event::SignatureMissing {
                message_type: message.r#type.clone(),
            });
            return false;
        };
        let Some(address) = &message.from else {
            self.events.emit(&Event::SignatureFailed { address: None });
            return false;
        };
        if !self.config.signature.trusted_addresses.iter().any(|a| a.eq_ignore_ascii_case(address)) {
            self.events.emit(&Event::SignatureFailed {
                address: Some(address.clone()),
            });
            return false;
        }
        let canonical = canonical_form(message);
        if crate::signer::SignatureOracle::verify(&canonical, signature, address) {
            self.events.emit(&Event::SignatureVerified {
                address: address.clone(),
            });
            true
        } else {
            self.events.emit(&Event::SignatureFailed {
                address: Some(address.clone()),
            });
            false
        }
    }

    async fn on_socket_lost(self: &Arc<Self>) {
        *self.writer.lock().await = None;
        {
            let mut state = self.connection.write().await;
            state.connected = false;
            state.authenticated = false;
        }
        *self.auth.write().await = AuthState::default();
        self.pending.lock().await.fail_all("connection lost");

        if self.stopped.load(Ordering::SeqCst) || !self.config.reconnect.enabled {
            return;
        }
        self.reconnect_loop().await;
    }

    async fn reconnect_loop(self: &Arc<Self>) {
        {
            let mut state = self.connection.write().await;
            state.reconnecting = true;
        }
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > self.config.reconnect.max_attempts {
                self.events.emit(&Event::Error("reconnection attempts exhausted".into()));
                let mut state = self.connection.write().await;
                state.reconnecting = false;
                return;
            }
            let delay = SpecBackoff(self.config.reconnect.clone())
                .build()
                .nth((attempt.max(1) - 1) as usize)
                .unwrap_or(self.config.reconnect.max_delay);
            self.events.emit(&Event::ConnectionReconnecting { attempt, delay });
            tokio::time::sleep(delay).await;

            self.connection.write().await.reconnect_attempts = attempt;
            match self.dial_and_wait_for_ready().await {
                Ok(()) => {
                    self.reconnect_attempts.store(0, Ordering::SeqCst);
                    let mut state = self.connection.write().await;
                    state.reconnecting = false;
                    drop(state);
                    self.events.emit(&Event::ConnectionReconnected);
                    let session = self.clone();
                    tokio::spawn(async move { session.heartbeat_loop().await });
                    return;
                }
                Err(_) => continue,
            }
        }
    }

    async fn heartbeat_loop(self: Arc<Self>) {
        loop {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            if self.stopped.load(Ordering::SeqCst) || !self.connection.read().await.connected {
                return;
            }
            let elapsed = self.last_frame_at.lock().await.elapsed();
            if elapsed >= HEARTBEAT_INTERVAL * 2 {
                self.events.emit(&Event::ConnectionError("heartbeat timeout".into()));
                if let Some(mut writer) = self.writer.lock().await.take() {
                    let _ = writer.close().await;
                }
                return;
            }
            let _ = self.write_frame(&Message::new("ping")).await;
        }
    }

    async fn write_frame(&self, message: &Message) -> Result<(), SdkError> {
        let text = serde_json::to_string(message).map_err(|e| SdkError::Validation(e.to_string()))?;
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(SdkError::Connection("not connected".into()));
        };
        writer
            .send(tungstenite::Message::Text(text.into()))
            .await
            .map_err(|e| SdkError::Connection(e.to_string()))
    }

    /// Sends `content` (or an explicit agent command when `opts.target_agent` is set),
    /// subject to the rate limiter, optionally awaiting a correlated reply.
    pub async fn send_message(
        &self,
        content: String,
        content_type: Option<String>,
        opts: SendOptions,
    ) -> Result<Option<AgentResponse>, SdkError> {
        if !self.connection.read().await.connected {
            return Err(SdkError::Connection("not connected".into()));
        }
        if self.config.rate_limit_enabled && !self.rate_limiter.lock().await.try_acquire() {
            return Err(SdkError::RateLimit);
        }

        let client_request_id = Uuid::new_v4().to_string();
        let mut message = if let Some(agent) = &opts.target_agent {
            let mut m = Message::new("task");
            m.data = Some(serde_json::json!({
                "agent": agent,
                "command": content,
                "client_request_id": client_request_id,
            }));
            m
        } else {
            let mut m = Message::new("message");
            m.content = Some(content);
            m.content_type = content_type;
            m.data = Some(serde_json::json!({
                "client_request_id": client_request_id,
                "target": opts.target_agent,
            }));
            m
        };
        message.room = opts.room.clone();

        let receiver = if opts.wait_for_response {
            let timeout = opts.timeout.unwrap_or(self.config.message_timeout);
            Some(self.pending.lock().await.register(
                client_request_id.clone(),
                timeout,
                opts.room.clone(),
                opts.target_agent.is_some(),
            ))
        } else {
            None
        };

        self.write_frame(&message).await?;
        self.events.emit(&Event::MessageSent(client_request_id.clone()));

        let Some(receiver) = receiver else {
            return Ok(None);
        };

        match receiver.await {
            Ok(Ok(response)) => Ok(Some(response)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SdkError::Connection("session dropped while awaiting reply".into())),
        }
    }

    /// Closes the socket with a normal-closure code and prevents further reconnection.
    pub async fn disconnect(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.close().await;
        }
        {
            let mut state = self.connection.write().await;
            state.connected = false;
            state.authenticated = false;
            state.reconnecting = false;
        }
        *self.auth.write().await = AuthState::default();
        self.pending.lock().await.fail_all("disconnected");
        self.events.emit(&Event::Disconnect);
    }

    /// Idempotent terminal shutdown: closes the socket, zeroizes the secret (dropped
    /// with this session), and emits `destroy`.
    pub async fn destroy(&self) {
        self.disconnect().await;
        self.events.emit(&Event::Destroy);
    }

    /// A snapshot of the current connection state.
    pub async fn snapshot_connection_state(&self) -> ConnectionState {
        self.connection.read().await.clone()
    }

    /// A snapshot of the current authentication state.
    pub async fn snapshot_auth_state(&self) -> AuthState {
        self.auth.read().await.clone()
    }

    /// Number of requests currently awaiting a reply.
    pub async fn pending_request_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Expires any overdue pending requests. Intended to be polled periodically by the
    /// facade (e.g. alongside the heartbeat), since `PendingRequests` has no timer of
    /// its own.
    pub async fn expire_overdue_requests(&self) -> usize {
        self.pending.lock().await.expire_overdue()
    }

    /// Every known agent, as a defensive snapshot.
    pub async fn all_agents(&self) -> Vec<Agent> {
        self.agents.lock().await.all()
    }

    /// A single agent by id.
    pub async fn get_agent(&self, id: &str) -> Option<Agent> {
        self.agents.lock().await.get(id)
    }

    /// Agents advertising `capability`.
    pub async fn find_agents_by_capability(&self, capability: &str) -> Vec<Agent> {
        self.agents.lock().await.find_by_capability(capability)
    }

    /// Agents whose name matches `fragment`.
    pub async fn find_agents_by_name(&self, fragment: &str) -> Vec<Agent> {
        self.agents.lock().await.find_by_name(fragment)
    }

    /// Agents with the given status.
    pub async fn find_agents_by_status(&self, status: teneo_types::AgentStatus) -> Vec<Agent> {
        self.agents.lock().await.find_by_status(status)
    }

    /// Every known room's authoritative metadata.
    pub async fn all_rooms(&self) -> Vec<Room> {
        self.rooms.lock().await.all()
    }

    /// A single room's metadata, if known.
    pub async fn get_room(&self, id: &str) -> Option<Room> {
        self.rooms.lock().await.get(id)
    }

    /// Currently subscribed room ids, authoritative only from server acknowledgements.
    pub async fn subscribed_rooms(&self) -> Vec<String> {
        self.rooms.lock().await.subscribed()
    }

    /// The client's assigned private room, if any.
    pub async fn private_room_id(&self) -> Option<String> {
        self.rooms.lock().await.private_room_id().map(str::to_string)
    }

    /// Sends a `subscribe` request for `room_id`. Does not itself wait for the
    /// acknowledgement; the subscribed set only updates once the server's reply is
    /// dispatched through [`crate::handlers::rooms::SubscribeHandler`].
    pub async fn send_subscribe(&self, room_id: &str) -> Result<(), SdkError> {
        let mut message = Message::new("subscribe");
        message.data = Some(serde_json::json!({ "room_id": room_id }));
        self.write_frame(&message).await
    }

    /// Sends an `unsubscribe` request for `room_id`.
    pub async fn send_unsubscribe(&self, room_id: &str) -> Result<(), SdkError> {
        let mut message = Message::new("unsubscribe");
        message.data = Some(serde_json::json!({ "room_id": room_id }));
        self.write_frame(&message).await
    }

    /// Sends a `list_rooms` request.
    pub async fn send_list_rooms(&self) -> Result<(), SdkError> {
        let mut message = Message::new("list_rooms");
        message.data = Some(serde_json::json!({}));
        self.write_frame(&message).await
    }
}

/// The signature input for an inbound frame: its JSON form with `signature` cleared,
/// so the signer never signs over its own signature field.
fn canonical_form(message: &Message) -> String {
    let mut value = serde_json::to_value(message).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = value.as_object_mut() {
        obj.remove("signature");
    }
    serde_json::to_string(&value).unwrap_or_default()
}

#[async_trait]
impl Context for TransportSession {
    fn emit(&self, event: Event) {
        self.events.emit(&event);
    }

    fn enqueue_webhook(&self, event: &Event, data: serde_json::Value, metadata: Option<serde_json::Value>) {
        if !event.is_webhook_eligible() {
            return;
        }
        let webhook = self.webhook.clone();
        let event = event.clone();
        tokio::spawn(async move {
            let now_ms = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_millis() as i64)
                .unwrap_or_default();
            webhook.enqueue(&event, data, metadata, now_ms).await;
        });
    }

    async fn send(&self, message: Message) -> Result<(), SdkError> {
        self.write_frame(&message).await
    }

    fn self_address(&self) -> String {
        self.oracle.address().to_string()
    }

    fn client_type(&self) -> ClientType {
        self.config.client_type
    }

    fn expected_address(&self) -> Option<String> {
        self.config.expected_address.clone()
    }

    fn auth_state(&self) -> AuthState {
        self.auth.try_read().map(|s| s.clone()).unwrap_or_default()
    }

    fn connection_state(&self) -> ConnectionState {
        self.connection.try_read().map(|s| s.clone()).unwrap_or_default()
    }

    async fn sign(&self, message: &str) -> Result<String, SdkError> {
        self.oracle.sign(message).await
    }

    async fn set_challenge(&self, challenge: String) {
        self.auth.write().await.challenge = Some(challenge);
    }

    async fn set_authenticated(&self, state: AuthState) {
        *self.auth.write().await = state;
        self.connection.write().await.authenticated = true;
    }

    async fn set_auth_error(&self, reason: String) {
        *self.auth_failure.lock().await = Some(reason.clone());
        self.auth.write().await.authenticated = false;
        let mut conn = self.connection.write().await;
        conn.authenticated = false;
        conn.last_error = Some(reason);
    }

    fn set_auth_required(&self) {}

    async fn replace_agents(&self, agents: Vec<Agent>) {
        self.agents.lock().await.replace(agents);
    }

    async fn seed_rooms(&self, rooms: Vec<Room>, private_room_id: Option<String>) {
        self.rooms.lock().await.seed(rooms, private_room_id);
    }

    async fn merge_rooms(&self, rooms: Vec<Room>) {
        self.rooms.lock().await.merge_rooms(rooms);
    }

    async fn set_subscribed(&self, subscriptions: Vec<String>) {
        self.rooms.lock().await.set_subscribed(subscriptions);
    }

    async fn bind_task(&self, task_id: String, client_request_id: String) {
        self.pending.lock().await.bind_task(task_id, client_request_id);
    }

    async fn resolve_by_task(&self, task_id: &str, response: AgentResponse) -> bool {
        self.pending.lock().await.resolve_by_task(task_id, response)
    }

    async fn resolve_by_request_id(&self, client_request_id: &str, response: AgentResponse) -> bool {
        self.pending.lock().await.resolve_by_request_id(client_request_id, response)
    }

    async fn resolve_by_room_fallback(&self, room: &str, response: AgentResponse) -> bool {
        self.pending.lock().await.resolve_by_room_fallback(room, response)
    }
}
