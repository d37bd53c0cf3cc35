//! [`TeneoClient`]: the single public surface composing every component
//! (`spec.md` §4.8, §6).
//!
//! The facade owns the [`TransportSession`], the [`WebhookDispatcher`], and the
//! shared [`EventBus`]; it forwards the union of typed events described in `spec.md`
//! §6 and exposes the operation table from the same section. Handlers and the
//! transport never hold a reference back to the facade — all composition happens
//! here, one level up, matching the ownership rule in `spec.md` §3 ("Ownership").

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use teneo_types::{
    Agent, AgentResponse, AgentStatus, AuthState, ConnectionState, Event, Health, Room,
    ResponseFormat, ResponseFormatConfig, SdkError, WebhookConfig, WebhookStatus,
};
use tokio::sync::{Mutex, oneshot};

use crate::config::TeneoConfig;
use crate::events::{EventBus, ListenerId};
use crate::ssrf::validate_webhook_url;
use crate::transport::{SendOptions, TransportSession};
use crate::webhook::WebhookDispatcher;

/// How often the background task sweeps [`TransportSession::expire_overdue_requests`].
///
/// `PendingRequests` carries no timer of its own (`spec.md` §4.1); something has to
/// poll it so a `sendMessage(..., waitForResponse)` call actually rejects with
/// `TimeoutError` once its deadline passes rather than waiting forever for a reply
/// that never arrives.
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_millis(250);

/// The client-facing options for [`TeneoClient::send_message`].
#[derive(Default)]
pub struct SendMessageOptions {
    /// The room to scope the send to.
    pub room: Option<String>,
    /// Route directly to a specific agent instead of through the coordinator.
    pub target_agent: Option<String>,
    /// Whether to await a correlated reply.
    pub wait_for_response: bool,
    /// Per-call timeout, overriding `TeneoConfig::message_timeout`.
    pub timeout: Option<Duration>,
}

/// The client-facing parameters for [`TeneoClient::send_direct_command`].
pub struct DirectCommand {
    /// The target agent's id.
    pub agent: String,
    /// The command text.
    pub command: String,
    /// The room to issue the command in.
    pub room: String,
}

/// Composes [`TransportSession`], [`WebhookDispatcher`], and the registries behind a
/// single handle. This is the only type SDK consumers construct directly.
pub struct TeneoClient {
    session: Arc<TransportSession>,
    events: Arc<EventBus>,
    webhook: Arc<WebhookDispatcher>,
    response_format: Mutex<ResponseFormatConfig>,
    message_timeout: Duration,
    allow_insecure_webhooks: bool,
    destroyed: Arc<AtomicBool>,
}

impl TeneoClient {
    /// Builds a client from a single configuration record, per `spec.md` §4.8.
    /// Construction does not dial; call [`TeneoClient::connect`] for that.
    ///
    /// If `config.webhook` is set, its URL is validated immediately; an SSRF-rejected
    /// initial target fails construction outright rather than silently leaving the
    /// dispatcher disabled, since that misconfiguration is almost always a caller
    /// error worth surfacing up front.
    #[tracing::instrument(level = "debug", skip_all, fields(url = %config.url))]
    pub async fn new(config: TeneoConfig) -> Result<Self, SdkError> {
        let events = Arc::new(EventBus::new());
        let allow_insecure_webhooks = config.webhook.as_ref().is_some_and(|w| w.allow_insecure_webhooks);
        let queue_capacity = config.webhook.as_ref().map(|w| w.queue_capacity).unwrap_or(1_000);
        let http_client = reqwest::Client::new();
        let webhook = Arc::new(WebhookDispatcher::new(events.clone(), queue_capacity, http_client));

        let message_timeout = config.message_timeout;
        let response_format = Mutex::new(config.response_format);
        let initial_webhook = config.webhook.clone();

        let session = TransportSession::new(config, events.clone(), webhook.clone())?;

        if let Some(webhook_config) = initial_webhook {
            webhook
                .configure(webhook_config)
                .await
                .map_err(|e| SdkError::Webhook(e.to_string()))?;
        }

        let destroyed = Arc::new(AtomicBool::new(false));
        spawn_pending_sweep(session.clone(), destroyed.clone());

        Ok(TeneoClient {
            session,
            events,
            webhook,
            response_format,
            message_timeout,
            allow_insecure_webhooks,
            destroyed,
        })
    }

    // ---- Lifecycle --------------------------------------------------------

    /// Opens the transport and drives it to `ready`, per `spec.md` §4.1.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn connect(&self) -> Result<(), SdkError> {
        self.session.connect().await
    }

    /// Closes the socket cleanly and prevents further reconnection attempts.
    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Idempotent terminal shutdown. Supersedes [`TeneoClient::disconnect`]; closes
    /// the socket, stops the pending-request sweep, and drains the webhook queue.
    /// The underlying `SecureSecret` is zeroized when the last reference to this
    /// client's session is dropped.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.destroy().await;
        self.webhook.clear_queue().await;
    }

    // ---- Messaging ----------------------------------------------------------

    /// Sends `content`, optionally awaiting a correlated reply (`spec.md` §6
    /// `sendMessage`).
    #[tracing::instrument(level = "debug", skip(self, content), fields(room = opts.room.as_deref()))]
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        opts: SendMessageOptions,
    ) -> Result<Option<AgentResponse>, SdkError> {
        let response = self
            .session
            .send_message(
                content.into(),
                None,
                SendOptions {
                    room: opts.room,
                    target_agent: opts.target_agent,
                    wait_for_response: opts.wait_for_response,
                    timeout: opts.timeout,
                },
            )
            .await?;
        let format = *self.response_format.lock().await;
        Ok(response.map(|r| apply_response_format(r, &format)))
    }

    /// Explicit agent target; same semantics as [`TeneoClient::send_message`] with
    /// `target_agent` set (`spec.md` §6 `sendDirectCommand`).
    pub async fn send_direct_command(
        &self,
        cmd: DirectCommand,
        wait_for_response: bool,
    ) -> Result<Option<AgentResponse>, SdkError> {
        self.send_message(
            cmd.command,
            SendMessageOptions {
                room: Some(cmd.room),
                target_agent: Some(cmd.agent),
                wait_for_response,
                timeout: None,
            },
        )
        .await
    }

    // ---- Rooms ----------------------------------------------------------------

    /// Subscribes to `room_id`, waiting for the server's authoritative
    /// acknowledgement before returning (`spec.md` §4.5: subscribed set is
    /// authoritative only from server acknowledgements, never speculative).
    pub async fn subscribe_to_room(&self, room_id: &str) -> Result<(), SdkError> {
        self.session.send_subscribe(room_id).await?;
        let target = room_id.to_string();
        await_matching(&self.events, self.message_timeout, move |event| match event {
            Event::RoomSubscribed(r) if r == &target => Some(Ok(())),
            Event::Error(reason) => Some(Err(SdkError::Message(reason.clone()))),
            _ => None,
        })
        .await?
    }

    /// Unsubscribes from `room_id`, mirroring [`TeneoClient::subscribe_to_room`].
    pub async fn unsubscribe_from_room(&self, room_id: &str) -> Result<(), SdkError> {
        self.session.send_unsubscribe(room_id).await?;
        let target = room_id.to_string();
        await_matching(&self.events, self.message_timeout, move |event| match event {
            Event::RoomUnsubscribed(r) if r == &target => Some(Ok(())),
            Event::Error(reason) => Some(Err(SdkError::Message(reason.clone()))),
            _ => None,
        })
        .await?
    }

    /// Requests the authoritative room list from the server and returns it.
    pub async fn list_rooms(&self) -> Result<Vec<Room>, SdkError> {
        self.session.send_list_rooms().await?;
        await_matching(&self.events, self.message_timeout, |event| match event {
            Event::RoomList(rooms) => Some(Ok(rooms.clone())),
            Event::Error(reason) => Some(Err(SdkError::Message(reason.clone()))),
            _ => None,
        })
        .await?
    }

    /// Currently subscribed room ids.
    pub async fn get_subscribed_rooms(&self) -> Vec<String> {
        self.session.subscribed_rooms().await
    }

    /// All rooms known from authoritative server metadata.
    pub async fn get_rooms(&self) -> Vec<Room> {
        self.session.all_rooms().await
    }

    /// A single room's metadata, if known.
    pub async fn get_room(&self, id: &str) -> Option<Room> {
        self.session.get_room(id).await
    }

    // ---- Agents -----------------------------------------------------------

    /// The full agent catalog.
    pub async fn get_agents(&self) -> Vec<Agent> {
        self.session.all_agents().await
    }

    /// A single agent by id.
    pub async fn get_agent(&self, id: &str) -> Option<Agent> {
        self.session.get_agent(id).await
    }

    /// Agents advertising `capability`.
    pub async fn find_agents_by_capability(&self, capability: &str) -> Vec<Agent> {
        self.session.find_agents_by_capability(capability).await
    }

    /// Agents whose name matches `fragment`.
    pub async fn find_agents_by_name(&self, fragment: &str) -> Vec<Agent> {
        self.session.find_agents_by_name(fragment).await
    }

    /// Agents with the given status.
    pub async fn find_agents_by_status(&self, status: AgentStatus) -> Vec<Agent> {
        self.session.find_agents_by_status(status).await
    }

    // ---- State --------------------------------------------------------------

    /// A snapshot of the current connection state.
    pub async fn get_connection_state(&self) -> ConnectionState {
        self.session.snapshot_connection_state().await
    }

    /// A snapshot of the current authentication state.
    pub async fn get_auth_state(&self) -> AuthState {
        self.session.snapshot_auth_state().await
    }

    /// Aggregate health, filled in per `SPEC_FULL.md` §10 since `spec.md` names the
    /// operation (`getHealth()`) without enumerating its payload.
    pub async fn get_health(&self) -> Health {
        let connection = self.session.snapshot_connection_state().await;
        let status = self.webhook.status().await;
        Health {
            authenticated: connection.authenticated,
            connection,
            pending_request_count: self.session.pending_request_count().await,
            webhook_queue_depth: status.queue_depth,
            circuit_state: status.circuit_state,
        }
    }

    // ---- Webhook --------------------------------------------------------------

    /// Atomically replaces the webhook target. Runs SSRF validation before
    /// accepting; rejection is permanent for this URL and the dispatcher stays
    /// disabled until reconfigured (`spec.md` §4.6).
    pub async fn configure_webhook(
        &self,
        url: impl Into<String>,
        headers: std::collections::HashMap<String, String>,
    ) -> Result<(), SdkError> {
        let url = url.into();
        validate_webhook_url(&url, self.allow_insecure_webhooks)
            .await
            .map_err(|e| SdkError::Webhook(e.to_string()))?;
        self.webhook
            .configure(WebhookConfig {
                url,
                headers,
                allow_insecure_webhooks: self.allow_insecure_webhooks,
                ..WebhookConfig::default()
            })
            .await
            .map_err(|e| SdkError::Webhook(e.to_string()))
    }

    /// A snapshot of the webhook dispatcher's health.
    pub async fn get_webhook_status(&self) -> WebhookStatus {
        self.webhook.status().await
    }

    /// Drains all pending webhook deliveries without attempting them, returning how
    /// many were discarded.
    pub async fn clear_webhook_queue(&self) -> usize {
        self.webhook.clear_queue().await
    }

    // ---- Misc -------------------------------------------------------------

    /// Controls which fields of [`AgentResponse`] subsequent `send_message`/
    /// `send_direct_command` calls populate.
    pub async fn set_response_format(&self, format: ResponseFormat, include_metadata: bool) {
        let mut cfg = self.response_format.lock().await;
        cfg.format = format;
        cfg.include_metadata = include_metadata;
    }

    /// Registers a listener invoked synchronously, in registration order, for every
    /// emitted event (`spec.md` §5, §6).
    pub fn on(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerId {
        self.events.on(listener)
    }

    /// Registers a listener invoked at most once.
    pub fn once(&self, listener: impl Fn(&Event) + Send + Sync + 'static) -> ListenerId {
        self.events.once(listener)
    }

    /// Removes a previously registered listener.
    pub fn off(&self, id: ListenerId) {
        self.events.off(id);
    }
}

/// Applies the configured [`ResponseFormatConfig`] to a raw [`AgentResponse`].
///
/// `Raw` drops the humanized rendering; `Humanized` drops the structured content and,
/// unless `include_metadata` is set, also clears `raw` (the Open Question in
/// `spec.md` §9 left this interplay unspecified; `include_metadata` is read here as
/// "keep the raw payload alongside the humanized one," the interpretation recorded in
/// `DESIGN.md`).
fn apply_response_format(mut response: AgentResponse, cfg: &ResponseFormatConfig) -> AgentResponse {
    match cfg.format {
        ResponseFormat::Raw => {
            response.humanized = None;
        }
        ResponseFormat::Humanized => {
            response.content = None;
            if !cfg.include_metadata {
                response.raw = serde_json::Value::Null;
            }
        }
        ResponseFormat::Both => {}
    }
    response
}

/// Awaits the first emitted event `matcher` turns into `Some`, or `TimeoutError`
/// after `timeout`. Used for the request/response wrapper operations (`spec.md` §5:
/// "`listRooms()` and similar request/response wrappers" are suspension points).
async fn await_matching<T, F>(events: &Arc<EventBus>, timeout: Duration, matcher: F) -> Result<T, SdkError>
where
    F: Fn(&Event) -> Option<T> + Send + Sync + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    let id = events.on(move |event| {
        if let Some(value) = matcher(event) {
            if let Some(sender) = tx.lock().expect("event bus lock poisoned").take() {
                let _ = sender.send(value);
            }
        }
    });
    let outcome = tokio::time::timeout(timeout, rx).await;
    events.off(id);
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) => Err(SdkError::Connection("session dropped while awaiting a reply".into())),
        Err(_) => Err(SdkError::Timeout(timeout)),
    }
}

/// Periodically expires overdue [`crate::pending::PendingRequests`] slots, since that
/// table carries no timer of its own.
fn spawn_pending_sweep(session: Arc<TransportSession>, destroyed: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PENDING_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if destroyed.load(Ordering::SeqCst) {
                return;
            }
            session.expire_overdue_requests().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_format_drops_humanized_only() {
        let response = sample_response();
        let formatted = apply_response_format(
            response.clone(),
            &ResponseFormatConfig {
                format: ResponseFormat::Raw,
                include_metadata: false,
            },
        );
        assert!(formatted.humanized.is_none());
        assert!(formatted.content.is_some());
    }

    #[test]
    fn humanized_format_drops_content_and_raw_unless_metadata_requested() {
        let response = sample_response();
        let without_metadata = apply_response_format(
            response.clone(),
            &ResponseFormatConfig {
                format: ResponseFormat::Humanized,
                include_metadata: false,
            },
        );
        assert!(without_metadata.content.is_none());
        assert_eq!(without_metadata.raw, serde_json::Value::Null);

        let with_metadata = apply_response_format(
            response,
            &ResponseFormatConfig {
                format: ResponseFormat::Humanized,
                include_metadata: true,
            },
        );
        assert!(with_metadata.content.is_none());
        assert_ne!(with_metadata.raw, serde_json::Value::Null);
    }

    #[test]
    fn both_format_changes_nothing() {
        let response = sample_response();
        let formatted = apply_response_format(
            response.clone(),
            &ResponseFormatConfig {
                format: ResponseFormat::Both,
                include_metadata: false,
            },
        );
        assert_eq!(formatted.content, response.content);
        assert_eq!(formatted.humanized, response.humanized);
        assert_eq!(formatted.raw, response.raw);
    }

    fn sample_response() -> AgentResponse {
        AgentResponse {
            task_id: "t-1".into(),
            agent_id: "a-1".into(),
            agent_name: Some("Summarizer".into()),
            content: Some(serde_json::json!("pong")),
            content_type: None,
            success: true,
            error: None,
            timestamp: Some(0),
            raw: serde_json::json!({"type": "task_response"}),
            humanized: Some("pong".into()),
        }
    }

    #[tokio::test]
    async fn await_matching_times_out_when_nothing_matches() {
        let events = Arc::new(EventBus::new());
        let result: Result<(), SdkError> =
            await_matching(&events, Duration::from_millis(20), |_event| None).await;
        assert!(matches!(result, Err(SdkError::Timeout(_))));
    }

    #[tokio::test]
    async fn await_matching_resolves_on_first_match() {
        let events = Arc::new(EventBus::new());
        let events_for_emit = events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            events_for_emit.emit(&Event::RoomSubscribed("r-1".into()));
        });
        let result = await_matching(&events, Duration::from_secs(1), |event| match event {
            Event::RoomSubscribed(r) => Some(r.clone()),
            _ => None,
        })
        .await
        .unwrap();
        assert_eq!(result, "r-1");
    }
}
