//! Telegram Bot API payloads.
//!
//! Only the fields the bot reads are modelled; serde ignores the rest.

use serde::Deserialize;

use scorebot_core::{ChatId, IncomingMessage, MessageId, RequesterId};

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i32>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait after hitting a flood limit.
    pub retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub first_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl Update {
    /// The text message carried by this update, if it is one from a person.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        let message = self.message?;
        let from = message.from?;
        if from.is_bot {
            return None;
        }
        let text = message.text?;

        Some(IncomingMessage {
            requester: RequesterId::from(from.id),
            first_name: Some(from.first_name),
            chat: ChatId(message.chat.id),
            message: MessageId(message.message_id),
            text,
        })
    }
}
