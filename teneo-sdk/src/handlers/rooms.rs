//! Room-subscription handlers: `subscribe`, `unsubscribe`, `list_rooms`.

use async_trait::async_trait;
use teneo_types::{Event, Message, MessageType, Room, SdkError, SubscribeAckData};

use super::{Context, Handler};

pub struct SubscribeHandler;

#[async_trait]
impl Handler for SubscribeHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Subscribe
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let data = SubscribeAckData::from_message(message);
        if data.success.unwrap_or(true) {
            ctx.set_subscribed(data.subscriptions).await;
            let room = message.room.clone().unwrap_or_default();
            let event = Event::RoomSubscribed(room.clone());
            ctx.enqueue_webhook(&event, serde_json::json!({ "room": room }), None);
            ctx.emit(event);
        } else {
            ctx.emit(Event::Error("subscribe request rejected by server".into()));
        }
        Ok(())
    }
}

pub struct UnsubscribeHandler;

#[async_trait]
impl Handler for UnsubscribeHandler {
    fn message_type(&self) -> MessageType {
        MessageType::Unsubscribe
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let data = SubscribeAckData::from_message(message);
        if data.success.unwrap_or(true) {
            ctx.set_subscribed(data.subscriptions).await;
            let room = message.room.clone().unwrap_or_default();
            let event = Event::RoomUnsubscribed(room.clone());
            ctx.enqueue_webhook(&event, serde_json::json!({ "room": room }), None);
            ctx.emit(event);
        } else {
            ctx.emit(Event::Error("unsubscribe request rejected by server".into()));
        }
        Ok(())
    }
}

pub struct ListRoomsHandler;

#[async_trait]
impl Handler for ListRoomsHandler {
    fn message_type(&self) -> MessageType {
        MessageType::ListRooms
    }

    async fn handle(&self, message: &Message, ctx: &dyn Context) -> Result<(), SdkError> {
        let raw = message
            .data
            .as_ref()
            .and_then(|d| d.get("rooms"))
            .cloned()
            .unwrap_or(serde_json::Value::Array(vec![]));
        let rooms: Vec<Room> = serde_json::from_value(raw)
            .map_err(|e| SdkError::Validation(format!("list_rooms frame malformed: {e}")))?;
        ctx.merge_rooms(rooms.clone()).await;
        let event = Event::RoomList(rooms.clone());
        ctx.enqueue_webhook(&event, serde_json::json!({ "rooms": rooms }), None);
        ctx.emit(event);
        Ok(())
    }
}
