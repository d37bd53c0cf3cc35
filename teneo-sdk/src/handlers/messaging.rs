//! Generic chat-style and heartbeat/error handlers: `message`, `error`, `ping`,
//! `pong`.

use async_trait::async_trait;
use teneo_types::{AgentResponse, Event, Message, MessageType, SdkError};

use super::{Context, Handler};

pub struct MessageHandler;

#[async_trait]
impl Handler for MessageHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Message
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        if message.from.as_deref() == Some(ctx.self_address().as_str()) {
            return Ok(());
        }

        let task_id = message
            .client_request_id()
            .or(message.id.as_deref())
            .unwrap_or_default()
            .to_string();
        let response = AgentResponse {
            task_id: task_id.clone(),
            agent_id: message.from.clone().unwrap_or_default(),
            agent_name: None,
            content: message.content.clone().map(serde_json::Value::String),
            content_type: message.content_type.clone(),
            success: true,
            error: None,
            timestamp: message.timestamp,
            raw: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
            humanized: message.content.clone(),
        };

        let matched = match message.client_request_id() {
            Some(id) => ctx.resolve_by_request_id(id, response.clone()).await,
            None => false,
        } || match message.room.as_deref() {
            Some(room) => ctx.resolve_by_room_fallback(room, response.clone()).await,
            None => false,
        };
        let _ = matched;

        ctx.emit(Event::AgentResponse(response));
        Ok(())
    }
}

pub struct ErrorHandler;

#[async_trait]
impl Handler for ErrorHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Error
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let reason = message
            .content
            .clone()
            .or_else(|| {
                message
                    .data
                    .as_ref()
                    .and_then(|d| d.get("message"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "server reported an error".to_string());
        ctx.emit(Event::Error(reason));
        Ok(())
    }
}

pub struct PingHandler;

#[async_trait]
impl Handler for PingHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Ping
    }

    async fn handle(&self, _message: &Message, _ctx: &dyn Context) -> Result<(), SdkError> {
        Ok(())
    }
}

pub struct PongHandler;

#[async_trait]
impl Handler for PongHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Pong
    }

    async fn handle(&self, _message: &Message, _ctx: &dyn Context) -> Result<(), SdkError> {
        Ok(())
    }
}
