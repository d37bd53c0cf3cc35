//! [`WebhookDispatcher`]: bounded, retrying, circuit-broken HTTP fan-out.
//!
//! A single background worker consumes [`WebhookDelivery`] entries from a
//! [`BoundedQueue`], attempting each subject to a [`CircuitBreaker`] and a per-delivery
//! exponential backoff (`spec.md` §4.6). The target is a late-bound, atomically
//! replaceable cell (`teneo_types::WebhookConfig`); every attempt re-reads it so a
//! `configureWebhook` call takes effect for deliveries already queued, per the design
//! note in `spec.md` §9.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use teneo_types::{CircuitState, Event, WebhookConfig, WebhookPayload, WebhookStatus};
use tokio::sync::{Mutex, Notify, RwLock};

use backon::BackoffBuilder;

use crate::backoff::SpecBackoff;
use crate::circuit::CircuitBreaker;
use crate::events::EventBus;
use crate::queue::BoundedQueue;
use crate::ssrf::validate_webhook_url;

/// A queued webhook delivery plus its retry bookkeeping.
struct WebhookDelivery {
    payload: WebhookPayload,
    attempts: u32,
}

#[derive(Default)]
struct Stats {
    dropped: AtomicU64,
    failed: AtomicU64,
    succeeded: AtomicU64,
}

/// Consumes events destined for the configured webhook endpoint.
pub struct WebhookDispatcher {
    queue: Arc<Mutex<BoundedQueue<WebhookDelivery>>>,
    notify: Arc<Notify>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    config: Arc<RwLock<Option<WebhookConfig>>>,
    client: reqwest::Client,
    stats: Arc<Stats>,
    events: Arc<EventBus>,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl WebhookDispatcher {
    /// Creates a dispatcher with no configured target and spawns its worker task,
    /// sharing the caller-supplied `reqwest::Client` rather than building its own.
    pub fn new(events: Arc<EventBus>, queue_capacity: usize, client: reqwest::Client) -> Self {
        let queue = Arc::new(Mutex::new(BoundedQueue::new(queue_capacity)));
        let notify = Arc::new(Notify::new());
        let breaker = Arc::new(Mutex::new(CircuitBreaker::new(5, Duration::from_secs(60))));
        let config = Arc::new(RwLock::new(None));
        let stats = Arc::new(Stats::default());

        let worker = tokio::spawn(run_worker(
            queue.clone(),
            notify.clone(),
            breaker.clone(),
            config.clone(),
            client.clone(),
            stats.clone(),
            events.clone(),
        ));

        WebhookDispatcher {
            queue,
            notify,
            breaker,
            config,
            client,
            stats,
            events,
            worker: Some(worker),
        }
    }

    /// Atomically replaces the webhook target. Runs SSRF validation immediately;
    /// failing validation is a permanent error for this URL and leaves the dispatcher
    /// disabled (no target configured) until reconfigured with a valid one.
    pub async fn configure(&self, webhook: WebhookConfig) -> Result<(), crate::ssrf::SsrfError> {
        validate_webhook_url(&webhook.url, webhook.allow_insecure_webhooks).await?;
        *self.config.write().await = Some(webhook);
        Ok(())
    }

    /// Enqueues `event`'s payload for delivery. Fire-and-forget: never blocks the
    /// caller, and silently drops the oldest pending delivery on overflow.
    pub async fn enqueue(&self, event: &Event, data: serde_json::Value, metadata: Option<serde_json::Value>, now_ms: i64) {
        if self.config.read().await.is_none() {
            return;
        }
        let payload = WebhookPayload {
            event: event.name().to_string(),
            data,
            metadata,
            timestamp: now_ms,
        };
        let dropped = {
            let mut queue = self.queue.lock().await;
            queue.push(WebhookDelivery { payload, attempts: 0 })
        };
        if dropped {
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_one();
    }

    /// Drains all pending deliveries without attempting them.
    pub async fn clear_queue(&self) -> usize {
        let mut queue = self.queue.lock().await;
        let mut n = 0;
        while queue.pop().is_some() {
            n += 1;
        }
        n
    }

    /// A snapshot of dispatcher health for `getWebhookStatus()`.
    pub async fn status(&self) -> WebhookStatus {
        let config = self.config.read().await;
        let circuit_state = self.breaker.lock().await.state();
        WebhookStatus {
            enabled: config.is_some(),
            url: config.as_ref().map(|c| c.url.clone()),
            circuit_state,
            queue_depth: self.queue.lock().await.len(),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            succeeded: self.stats.succeeded.load(Ordering::Relaxed),
        }
    }

    /// Stops the background worker. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

impl Drop for WebhookDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_worker(
    queue: Arc<Mutex<BoundedQueue<WebhookDelivery>>>,
    notify: Arc<Notify>,
    breaker: Arc<Mutex<CircuitBreaker>>,
    config: Arc<RwLock<Option<WebhookConfig>>>,
    client: reqwest::Client,
    stats: Arc<Stats>,
    events: Arc<EventBus>,
) {
    loop {
        let delivery = loop {
            if let Some(d) = queue.lock().await.pop() {
                break d;
            }
            notify.notified().await;
        };
        process_delivery(delivery, &queue, &breaker, &config, &client, &stats, &events).await;
    }
}

async fn process_delivery(
    mut delivery: WebhookDelivery,
    queue: &Arc<Mutex<BoundedQueue<WebhookDelivery>>>,
    breaker: &Arc<Mutex<CircuitBreaker>>,
    config: &Arc<RwLock<Option<WebhookConfig>>>,
    client: &reqwest::Client,
    stats: &Arc<Stats>,
    events: &Arc<EventBus>,
) {
    let Some(webhook_config) = config.read().await.clone() else {
        return;
    };

    delivery.attempts += 1;
    events.emit(&Event::WebhookSent {
        event: delivery.payload.event.clone(),
    });

    let allowed = breaker.lock().await.allow_request();
    if !allowed {
        fail_or_retry(delivery, &webhook_config, queue, breaker, stats, events, false).await;
        return;
    }

    let mut request = client.post(&webhook_config.url).json(&delivery.payload);
    for (name, value) in &webhook_config.headers {
        request = request.header(name, value);
    }

    let outcome = request.send().await;
    let succeeded = matches!(&outcome, Ok(resp) if resp.status().is_success());

    if succeeded {
        breaker.lock().await.on_success();
        stats.succeeded.fetch_add(1, Ordering::Relaxed);
        events.emit(&Event::WebhookSuccess {
            event: delivery.payload.event.clone(),
        });
        let new_state = breaker.lock().await.state();
        events.emit(&Event::WebhookCircuitState(new_state));
    } else {
        breaker.lock().await.on_failure();
        fail_or_retry(delivery, &webhook_config, queue, breaker, stats, events, true).await;
    }
}

async fn fail_or_retry(
    delivery: WebhookDelivery,
    webhook_config: &WebhookConfig,
    queue: &Arc<Mutex<BoundedQueue<WebhookDelivery>>>,
    breaker: &Arc<Mutex<CircuitBreaker>>,
    stats: &Arc<Stats>,
    events: &Arc<EventBus>,
    was_attempted: bool,
) {
    let exhausted = delivery.attempts >= webhook_config.retry.max_attempts;
    if exhausted || !was_attempted {
        stats.failed.fetch_add(1, Ordering::Relaxed);
        events.emit(&Event::WebhookError {
            event: delivery.payload.event.clone(),
            reason: if was_attempted {
                "max retry attempts exhausted".to_string()
            } else {
                "circuit breaker open".to_string()
            },
        });
        let state = breaker.lock().await.state();
        events.emit(&Event::WebhookCircuitState(state));
        return;
    }

    let delay = SpecBackoff(webhook_config.retry.clone())
        .build()
        .nth((delivery.attempts.max(1) - 1) as usize)
        .unwrap_or(webhook_config.retry.max_delay);
    events.emit(&Event::WebhookRetry {
        event: delivery.payload.event.clone(),
        attempt: delivery.attempts + 1,
    });
    let queue = queue.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        queue.lock().await.push_back_for_retry(delivery);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, routing::post};
    use std::sync::atomic::AtomicUsize;
    use teneo_types::ReconnectConfig;

    async fn spawn_always_fails() -> String {
        async fn handler() -> axum::http::StatusCode {
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        }
        let app = Router::new().route("/hook", post(handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    async fn spawn_counting(counter: Arc<AtomicUsize>) -> String {
        async fn handler(
            axum::extract::State(counter): axum::extract::State<Arc<AtomicUsize>>,
            Json(_payload): Json<serde_json::Value>,
        ) -> axum::http::StatusCode {
            counter.fetch_add(1, Ordering::SeqCst);
            axum::http::StatusCode::OK
        }
        let app = Router::new().route("/hook", post(handler)).with_state(counter);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    fn fast_retry_config(url: String) -> WebhookConfig {
        WebhookConfig {
            url,
            headers: Default::default(),
            allow_insecure_webhooks: true,
            retry: ReconnectConfig {
                enabled: true,
                strategy: teneo_types::BackoffStrategyKind::Constant,
                base_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(5),
                max_attempts: 3,
                jitter: Duration::ZERO,
                backoff_multiplier: 1.0,
            },
            queue_capacity: 100,
        }
    }

    #[tokio::test]
    async fn delivers_a_successful_event() {
        let counter = Arc::new(AtomicUsize::new(0));
        let url = spawn_counting(counter.clone()).await;
        let events = Arc::new(EventBus::new());
        let dispatcher = WebhookDispatcher::new(events, 10, reqwest::Client::new());
        dispatcher.configure(fast_retry_config(url)).await.unwrap();
        dispatcher
            .enqueue(&Event::RoomSubscribed("r-1".into()), serde_json::json!({"room":"r-1"}), None, 0)
            .await;

        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let status = dispatcher.status().await;
        assert_eq!(status.succeeded, 1);
    }

    #[tokio::test]
    async fn exhausting_retries_emits_exactly_one_webhook_error() {
        let url = spawn_always_fails().await;
        let events = Arc::new(EventBus::new());
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        events.on(move |ev| {
            if matches!(ev, Event::WebhookError { .. }) {
                e.fetch_add(1, Ordering::SeqCst);
            }
        });
        let dispatcher = WebhookDispatcher::new(events, 10, reqwest::Client::new());
        dispatcher.configure(fast_retry_config(url)).await.unwrap();
        dispatcher
            .enqueue(&Event::RoomSubscribed("r-1".into()), serde_json::json!({}), None, 0)
            .await;

        for _ in 0..100 {
            if errors.load(Ordering::SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn queue_never_exceeds_capacity() {
        let events = Arc::new(EventBus::new());
        let mut queue = BoundedQueue::new(3);
        for i in 0..10 {
            queue.push(WebhookDelivery {
                payload: WebhookPayload {
                    event: format!("e-{i}"),
                    data: serde_json::Value::Null,
                    metadata: None,
                    timestamp: 0,
                },
                attempts: 0,
            });
        }
        assert_eq!(queue.len(), 3);
        drop(events);
    }
}
