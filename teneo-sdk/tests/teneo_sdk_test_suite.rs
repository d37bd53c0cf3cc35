//! End-to-end scenarios driving [`TeneoClient`] against a scripted mock
//! coordinator and mock webhook receivers. Grounded on the teacher's own
//! `oprf-service/tests/oprf_service_test_suite.rs` (`#[tokio::test]` returning
//! `eyre::Result<()>`, a `mod setup;` harness module spinning up a real server
//! per test).

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde_json::json;
use teneo_sdk::{
    CircuitState, ReconnectConfig, SendMessageOptions, TeneoClient, WebhookConfig,
};

mod support;

/// Scenario 1: cold start. `challenge` -> signed `auth` -> `auth_success` drives the
/// client through `connection:open`, `auth:challenge`, `auth:success`, `ready`, in
/// that order, and leaves `getAuthState().private_room_id` set from the server's
/// assignment.
#[tokio::test]
async fn cold_start_authenticates_in_order() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let client = Arc::new(TeneoClient::new(support::test_config(&mock.url())).await?);

    let recorded: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
    {
        let recorded = recorded.clone();
        client.on(move |event| recorded.lock().unwrap().push(event.name().to_string()));
    }

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    support::drive_auth(&mock, vec![json!({ "id": "room-1" })], "pr-1").await;
    connecting.await??;

    let auth_state = client.get_auth_state().await;
    assert_eq!(auth_state.private_room_id.as_deref(), Some("pr-1"));
    assert!(auth_state.authenticated);

    let order: Vec<String> = recorded
        .lock()
        .unwrap()
        .iter()
        .filter(|name| name.as_str() != "message:received")
        .cloned()
        .collect();
    assert_eq!(order, vec!["connection:open", "auth:challenge", "auth:success", "ready"]);
    Ok(())
}

/// Scenario 2: request/response correlation. `agent_selected` binds the coordinator's
/// `task_id` to the client's `client_request_id`; the later `task_response` resolves
/// the still-pending `sendMessage` through that binding.
#[tokio::test]
async fn agent_selected_then_task_response_resolves_pending_send() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let client = Arc::new(TeneoClient::new(support::test_config(&mock.url())).await?);
    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    support::drive_auth(&mock, vec![json!({ "id": "room-1" })], "pr-1").await;
    connecting.await??;

    let send = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .send_message(
                    "summarize this",
                    SendMessageOptions {
                        room: Some("room-1".into()),
                        wait_for_response: true,
                        ..Default::default()
                    },
                )
                .await
        })
    };

    let outbound = mock.recv().await;
    assert_eq!(outbound["type"], "message");
    let client_request_id = outbound["data"]["client_request_id"]
        .as_str()
        .expect("outbound message carries client_request_id")
        .to_string();

    mock.send(json!({
        "type": "agent_selected",
        "data": {
            "agentId": "agent-1",
            "agentName": "Summarizer",
            "task_id": "task-1",
            "client_request_id": client_request_id,
        }
    }));
    mock.send(json!({
        "type": "task_response",
        "from": "agent-1",
        "content": "done",
        "data": { "task_id": "task-1", "success": true }
    }));

    let response = send.await??.expect("a reply arrived");
    assert_eq!(response.task_id, "task-1");
    assert_eq!(response.agent_id, "agent-1");
    assert!(response.success);
    Ok(())
}

/// Scenario 3: a `sendMessage` awaiting a reply that never arrives times out once its
/// deadline passes, and a reply delivered after the deadline is a no-op.
#[tokio::test]
async fn send_message_times_out_and_ignores_late_reply() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let client = Arc::new(TeneoClient::new(support::test_config(&mock.url())).await?);
    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    support::drive_auth(&mock, vec![], "pr-1").await;
    connecting.await??;

    let result = client
        .send_message(
            "hello?",
            SendMessageOptions {
                wait_for_response: true,
                timeout: Some(Duration::from_millis(300)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(teneo_sdk::SdkError::Timeout(_))));

    let outbound = mock.recv().await;
    let client_request_id = outbound["data"]["client_request_id"].as_str().unwrap().to_string();

    // The sweep (every 250ms) has already cleared the slot by the time the timeout
    // error above returned. A late reply referencing it must not panic or resolve.
    mock.send(json!({
        "type": "task_response",
        "from": "agent-1",
        "data": { "task_id": "irrelevant", "client_request_id": client_request_id, "success": true }
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.get_health().await.pending_request_count, 0);
    Ok(())
}

/// Scenario 4: two `task_response` frames carrying the same `id` within the dedup
/// window produce exactly one `agent:response` and one `message:duplicate`.
#[tokio::test]
async fn duplicate_message_id_is_suppressed() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let client = Arc::new(TeneoClient::new(support::test_config(&mock.url())).await?);
    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    support::drive_auth(&mock, vec![], "pr-1").await;
    connecting.await??;

    let recorded: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
    {
        let recorded = recorded.clone();
        client.on(move |event| recorded.lock().unwrap().push(event.name().to_string()));
    }

    let frame = json!({
        "type": "task_response",
        "id": "dup-1",
        "from": "agent-1",
        "data": { "task_id": "task-9", "success": true }
    });
    mock.send(frame.clone());
    mock.send(frame);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let names = recorded.lock().unwrap().clone();
    assert_eq!(names.iter().filter(|n| n.as_str() == "agent:response").count(), 1);
    assert_eq!(names.iter().filter(|n| n.as_str() == "message:duplicate").count(), 1);
    Ok(())
}

/// Scenario 5: five consecutive failed deliveries open the circuit breaker; a sixth
/// event is rejected without attempting the network call, and the breaker stays
/// `OPEN` (the 60s recovery timeout has not elapsed).
#[tokio::test]
async fn webhook_breaker_opens_after_five_failures() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let (webhook_url, hits) = support::spawn_failing_webhook().await;

    let mut config = support::test_config(&mock.url());
    config.webhook = Some(WebhookConfig {
        url: webhook_url,
        headers: Default::default(),
        allow_insecure_webhooks: true,
        retry: ReconnectConfig {
            enabled: true,
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::from_millis(1),
            ..ReconnectConfig::default()
        },
        queue_capacity: 100,
    });
    let client = Arc::new(TeneoClient::new(config).await?);
    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.connect().await })
    };
    support::drive_auth(&mock, vec![], "pr-1").await;
    connecting.await??;

    let errors: Arc<StdMutex<Vec<String>>> = Arc::new(StdMutex::new(Vec::new()));
    {
        let errors = errors.clone();
        client.on(move |event| {
            if let teneo_sdk::Event::WebhookError { .. } = event {
                errors.lock().unwrap().push(event.name().to_string());
            }
        });
    }

    for i in 0..5 {
        mock.send(json!({
            "type": "task_response",
            "from": "agent-1",
            "data": { "task_id": format!("task-{i}"), "success": true }
        }));
    }
    // Wait for all five deliveries (each a single, non-retried attempt) to settle.
    for _ in 0..50 {
        if errors.lock().unwrap().len() >= 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(errors.lock().unwrap().len(), 5);
    assert_eq!(client.get_webhook_status().await.circuit_state, CircuitState::Open);
    let hits_after_five = hits.load(std::sync::atomic::Ordering::SeqCst);
    assert_eq!(hits_after_five, 5);

    mock.send(json!({
        "type": "task_response",
        "from": "agent-1",
        "data": { "task_id": "task-sixth", "success": true }
    }));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(errors.lock().unwrap().len(), 6);
    assert_eq!(client.get_webhook_status().await.circuit_state, CircuitState::Open);
    assert_eq!(
        hits.load(std::sync::atomic::Ordering::SeqCst),
        hits_after_five,
        "the sixth event must not reach the network while the breaker is open"
    );
    Ok(())
}

/// Scenario 6: a cloud-metadata webhook target is rejected at construction time; the
/// client never comes into existence and no request is ever attempted.
#[tokio::test]
async fn ssrf_rejects_cloud_metadata_target_at_construction() -> eyre::Result<()> {
    let mock = support::MockCoordinator::spawn().await;
    let mut config = support::test_config(&mock.url());
    config.webhook = Some(WebhookConfig {
        url: "http://169.254.169.254/latest/meta-data/".into(),
        ..WebhookConfig::default()
    });

    let result = TeneoClient::new(config).await;
    assert!(matches!(result, Err(teneo_sdk::SdkError::Webhook(_))));
    Ok(())
}
