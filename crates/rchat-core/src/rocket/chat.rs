//! Message operations.

use serde_json::{Value, json};

use crate::CoreError;
use crate::rocket::client::Session;
use crate::rocket::models::{Message, OutgoingMessage, Room};
use crate::rocket::routes;

impl Session {
    /// Fetch one message by ID.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn get_message(&self, message_id: &str) -> Result<Message, CoreError> {
        self.call(routes::CHAT_GET_MESSAGE.request().param("msgId", message_id))
            .await
    }

    /// Post a message.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidArgument`] when neither a room ID nor a
    /// channel is set, and dispatch errors.
    pub async fn post_message(&self, message: &OutgoingMessage) -> Result<Message, CoreError> {
        if message.room_id.is_none() && message.channel.is_none() {
            return Err(CoreError::InvalidArgument(
                "a message needs a room ID or a channel".to_string(),
            ));
        }
        let body = serde_json::to_value(message)
            .map_err(|e| CoreError::Serialization(format!("serializing message: {e}")))?;
        self.call(routes::CHAT_POST_MESSAGE.request().body(body))
            .await
    }

    /// Post plain text to `room`.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn send(&self, room: &Room, text: &str) -> Result<Message, CoreError> {
        let mut message = self
            .post_message(&OutgoingMessage::to_room(room.id.as_str(), text))
            .await?;
        message.channel_type = Some(room.channel_type());
        Ok(message)
    }

    /// Replace a message's text.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn update_message(&self, message: &Message, text: &str) -> Result<Message, CoreError> {
        let body = json!({ "roomId": message.rid, "msgId": message.id, "text": text });
        self.call(routes::CHAT_UPDATE.request().body(body)).await
    }

    /// Delete a message. `as_user` deletes it as its author instead of as admin.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn delete_message(&self, message: &Message, as_user: bool) -> Result<Value, CoreError> {
        let body = json!({ "roomId": message.rid, "msgId": message.id, "asUser": as_user });
        self.dispatch(routes::CHAT_DELETE.request().body(body)).await
    }

    /// Pin a message. Returns the system message announcing the pin.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn pin_message(&self, message_id: &str) -> Result<Message, CoreError> {
        self.call(
            routes::CHAT_PIN_MESSAGE
                .request()
                .body(json!({ "messageId": message_id })),
        )
        .await
    }

    /// Unpin a message.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn unpin_message(&self, message_id: &str) -> Result<Value, CoreError> {
        self.message_flag(&routes::CHAT_UNPIN_MESSAGE, message_id).await
    }

    /// Star a message for the caller.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn star_message(&self, message_id: &str) -> Result<Value, CoreError> {
        self.message_flag(&routes::CHAT_STAR_MESSAGE, message_id).await
    }

    /// Remove the caller's star.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn unstar_message(&self, message_id: &str) -> Result<Value, CoreError> {
        self.message_flag(&routes::CHAT_UNSTAR_MESSAGE, message_id).await
    }

    /// Toggle the caller's `emoji` reaction on a message.
    ///
    /// # Errors
    ///
    /// Returns dispatch errors.
    pub async fn react(&self, message_id: &str, emoji: &str) -> Result<Value, CoreError> {
        let body = json!({ "messageId": message_id, "emoji": emoji });
        self.dispatch(routes::CHAT_REACT.request().body(body)).await
    }

    async fn message_flag(
        &self,
        route: &'static routes::Route,
        message_id: &str,
    ) -> Result<Value, CoreError> {
        self.dispatch(route.request().body(json!({ "messageId": message_id })))
            .await
    }
}
