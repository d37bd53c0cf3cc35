//! Agent-catalog and task-reply handlers: `agents`, `agent_selected`, `task_response`.

use async_trait::async_trait;
use teneo_types::{Agent, AgentResponse, AgentSelectedData, Event, Message, MessageType, SdkError};

use super::{Context, Handler};

pub struct AgentsHandler;

#[async_trait]
impl Handler for AgentsHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Agents
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let raw = message
            .data
            .clone()
            .ok_or_else(|| SdkError::Validation("agents frame missing data".into()))?;
        let agents: Vec<Agent> = serde_json::from_value(raw)
            .map_err(|e| SdkError::Validation(format!("agents frame malformed: {e}")))?;
        ctx.replace_agents(agents.clone()).await;
        ctx.emit(Event::AgentList(agents));
        Ok(())
    }
}

pub struct AgentSelectedHandler;

#[async_trait]
impl Handler for AgentSelectedHandler {
    fn message_type(&self) -> MessageType {
        MessageType::AgentSelected
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let data = AgentSelectedData::from_message(message);

        if let (Some(task_id), Some(client_request_id)) = (&data.task_id, &data.client_request_id) {
            ctx.bind_task(task_id.clone(), client_request_id.clone()).await;
        }

        let event_data = serde_json::json!({
            "agentId": data.agent_id,
            "agentName": data.agent_name,
            "reasoning": data.reasoning,
            "userRequest": data.user_request,
            "command": data.command,
            "commandReasoning": data.command_reasoning,
            "capabilities": data.capabilities,
        });
        let event = Event::AgentSelected {
            agent_id: data.agent_id,
            agent_name: data.agent_name,
            reasoning: data.reasoning,
            user_request: data.user_request,
            command: data.command,
            command_reasoning: data.command_reasoning,
            capabilities: data.capabilities,
        };
        ctx.enqueue_webhook(&event, event_data, None);
        ctx.emit(event);
        Ok(())
    }
}

pub struct TaskResponseHandler;

#[async_trait]
impl Handler for TaskResponseHandler {
    fn message_type(&self) -> MessageType {
        MessageType::TaskResponse
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let task_id = message
            .task_id()
            .ok_or_else(|| SdkError::Validation("task_response frame missing task_id".into()))?
            .to_string();
        let success = message
            .data
            .as_ref()
            .and_then(|d| d.get("success"))
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        let error = message
            .data
            .as_ref()
            .and_then(|d| d.get("error"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let response = AgentResponse {
            task_id: task_id.clone(),
            agent_id: message.from.clone().unwrap_or_default(),
            agent_name: message
                .data
                .as_ref()
                .and_then(|d| d.get("agentName"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            content: message.content.clone().map(serde_json::Value::String),
            content_type: message.content_type.clone(),
            success,
            error,
            timestamp: message.timestamp,
            raw: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
            humanized: message.content.clone(),
        };

        let self_originated = response.agent_id == ctx.self_address();
        let matched = ctx.resolve_by_task(&task_id, response.clone()).await
            || match message.client_request_id() {
                Some(id) => ctx.resolve_by_request_id(id, response.clone()).await,
                None => false,
            }
            || match message.room.as_deref() {
                // `spec.md` §4.1: the same-room fallback only matches a reply whose
                // `from` is not the client's own address.
                Some(room) if !self_originated => ctx.resolve_by_room_fallback(room, response.clone()).await,
                _ => false,
            };
        let _ = matched;

        let event_data = serde_json::to_value(&response).unwrap_or(serde_json::Value::Null);
        let event = Event::AgentResponse(response);
        ctx.enqueue_webhook(&event, event_data, None);
        ctx.emit(event);
        Ok(())
    }
}
