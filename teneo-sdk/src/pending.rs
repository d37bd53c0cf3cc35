//! [`PendingRequests`]: correlation table for requests awaiting a reply.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use teneo_types::{AgentResponse, SdkError};
use tokio::sync::oneshot;

/// A request-in-flight waiting for a reply, a timeout, or session teardown.
struct Slot {
    sender: oneshot::Sender<Result<AgentResponse, SdkError>>,
    deadline: Instant,
    /// The room the request was sent on, used only by the same-room fallback match.
    room: Option<String>,
    /// Set when the request named an explicit agent target; disables the fallback
    /// match per `spec.md` §4.1 ("Fallback ... is NOT used when the original send
    /// specified an explicit agent target").
    explicit_agent: bool,
}

/// Correlates client-issued request ids to the completion each `sendMessage(...,
/// waitForResponse)` call is waiting on.
///
/// Every slot is removed exactly once: by a matching reply, by timeout, or by session
/// teardown (`spec.md` §3 invariant).
#[derive(Default)]
pub struct PendingRequests {
    by_request_id: HashMap<String, Slot>,
    /// `task_id -> client_request_id`, populated when an `agent_selected` frame
    /// echoes the `client_request_id` alongside a freshly assigned `task_id`.
    task_to_request: HashMap<String, String>,
}

impl PendingRequests {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new in-flight request, returning the receiving half of its
    /// completion channel.
    pub fn register(
        &mut self,
        client_request_id: impl Into<String>,
        timeout: Duration,
        room: Option<String>,
        explicit_agent: bool,
    ) -> oneshot::Receiver<Result<AgentResponse, SdkError>> {
        let (tx, rx) = oneshot::channel();
        self.by_request_id.insert(
            client_request_id.into(),
            Slot {
                sender: tx,
                deadline: Instant::now() + timeout,
                room,
                explicit_agent,
            },
        );
        rx
    }

    /// Binds `task_id` to `client_request_id` so a later `task_response` carrying only
    /// the `task_id` can still be correlated.
    pub fn bind_task(&mut self, task_id: impl Into<String>, client_request_id: impl Into<String>) {
        self.task_to_request.insert(task_id.into(), client_request_id.into());
    }

    /// Resolves a `task_response` carrying `task_id` via a prior [`bind_task`] call.
    pub fn resolve_by_task(&mut self, task_id: &str, response: AgentResponse) -> bool {
        let Some(request_id) = self.task_to_request.remove(task_id) else {
            return false;
        };
        self.complete(&request_id, Ok(response))
    }

    /// Resolves a reply that directly echoes `client_request_id`.
    pub fn resolve_by_request_id(&mut self, client_request_id: &str, response: AgentResponse) -> bool {
        self.complete(client_request_id, Ok(response))
    }

    /// Applies the same-room fallback match described in `spec.md` §4.1: the first
    /// pending, non-explicit-agent request on `room` whose deadline has not passed.
    /// Used at most once per request by construction (resolving removes the slot).
    pub fn resolve_by_room_fallback(&mut self, room: &str, response: AgentResponse) -> bool {
        let now = Instant::now();
        let candidate = self
            .by_request_id
            .iter()
            .find(|(_, slot)| {
                !slot.explicit_agent && slot.room.as_deref() == Some(room) && slot.deadline > now
            })
            .map(|(id, _)| id.clone());
        match candidate {
            Some(id) => self.complete(&id, Ok(response)),
            None => false,
        }
    }

    /// Removes and fails every slot whose deadline has passed, returning how many
    /// were timed out. A timed-out slot can never subsequently be matched.
    pub fn expire_overdue(&mut self) -> usize {
        let now = Instant::now();
        let overdue: Vec<String> = self
            .by_request_id
            .iter()
            .filter(|(_, slot)| slot.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        let count = overdue.len();
        for id in overdue {
            self.complete(&id, Err(SdkError::Timeout(Duration::ZERO)));
        }
        count
    }

    /// Fails every pending slot with a connection error, used on disconnect/teardown.
    pub fn fail_all(&mut self, reason: &str) {
        let ids: Vec<String> = self.by_request_id.keys().cloned().collect();
        for id in ids {
            self.complete(&id, Err(SdkError::Connection(reason.to_string())));
        }
    }

    /// Current number of in-flight requests.
    pub fn len(&self) -> usize {
        self.by_request_id.len()
    }

    /// Whether there are no in-flight requests.
    pub fn is_empty(&self) -> bool {
        self.by_request_id.is_empty()
    }

    fn complete(&mut self, client_request_id: &str, result: Result<AgentResponse, SdkError>) -> bool {
        self.task_to_request.retain(|_, rid| rid != client_request_id);
        match self.by_request_id.remove(client_request_id) {
            Some(slot) => {
                let _ = slot.sender.send(result);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_removes_the_slot_and_a_late_reply_is_a_no_op() {
        let mut pending = PendingRequests::new();
        let rx = pending.register("req-1", Duration::from_millis(1), None, false);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pending.expire_overdue(), 1);
        assert!(pending.is_empty());

        let late = AgentResponse {
            task_id: "t-1".into(),
            agent_id: "a-1".into(),
            agent_name: None,
            content: None,
            content_type: None,
            success: true,
            error: None,
            timestamp: None,
            raw: serde_json::Value::Null,
            humanized: None,
        };
        assert!(!pending.resolve_by_request_id("req-1", late));
        assert!(matches!(rx.try_recv(), Ok(Err(SdkError::Timeout(_)))));
    }

    #[test]
    fn task_binding_resolves_via_task_id() {
        let mut pending = PendingRequests::new();
        let rx = pending.register("req-42", Duration::from_secs(5), Some("room-1".into()), false);
        pending.bind_task("t-7", "req-42");
        let response = AgentResponse {
            task_id: "t-7".into(),
            agent_id: "a-1".into(),
            agent_name: None,
            content: None,
            content_type: None,
            success: true,
            error: None,
            timestamp: None,
            raw: serde_json::Value::Null,
            humanized: Some("pong".into()),
        };
        assert!(pending.resolve_by_task("t-7", response));
        assert!(pending.is_empty());
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn explicit_agent_target_disables_room_fallback() {
        let mut pending = PendingRequests::new();
        let _rx = pending.register("req-1", Duration::from_secs(5), Some("room-1".into()), true);
        let response = AgentResponse {
            task_id: "t-1".into(),
            agent_id: "a-1".into(),
            agent_name: None,
            content: None,
            content_type: None,
            success: true,
            error: None,
            timestamp: None,
            raw: serde_json::Value::Null,
            humanized: None,
        };
        assert!(!pending.resolve_by_room_fallback("room-1", response));
    }
}
