//! Telegram Bot API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use scorebot_core::config::TelegramConfig;
use scorebot_core::{ChannelError, ChatId, MessageId, Messenger, OutgoingFile};

use super::types::{ApiResponse, Update};

/// Extra time on top of the long-poll timeout before a request is abandoned.
const REQUEST_SLACK_SECS: u64 = 15;

/// Error text returned when an edit would not change the message.
const NOT_MODIFIED: &str = "message is not modified";

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Client for the Telegram Bot API over HTTPS.
pub struct TelegramClient {
    client: Client,
    /// `<api_base>/bot<token>`; never logged.
    endpoint: String,
    poll_timeout_secs: u32,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(
                u64::from(config.poll_timeout_secs) + REQUEST_SLACK_SECS,
            ))
            .build()
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", config.api_base.trim_end_matches('/'), config.token),
            poll_timeout_secs: config.poll_timeout_secs,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.endpoint, method)
    }

    /// Long-polls for updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ChannelError> {
        let mut body = json!({
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", &body).await
    }

    /// Identity of the bot, used as a startup token check.
    pub async fn get_me(&self) -> Result<String, ChannelError> {
        #[derive(Deserialize)]
        struct Me {
            username: Option<String>,
            first_name: String,
        }

        let me: Me = self.call("getMe", &json!({})).await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, ChannelError> {
        debug!("Telegram {}", method);
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        decode(method, &bytes)
    }
}

/// Maps a reqwest failure to the channel taxonomy.
fn transport_error(e: reqwest::Error) -> ChannelError {
    if e.is_timeout() {
        ChannelError::Timeout
    } else if e.is_decode() {
        ChannelError::UnexpectedResponse(e.to_string())
    } else {
        ChannelError::ConnectionFailed(e.without_url().to_string())
    }
}

/// Unwraps the Bot API envelope.
///
/// The API reports failures in the body (`ok: false`) with a matching HTTP
/// status, so the body is decoded before the status is looked at.
fn decode<T: DeserializeOwned>(method: &str, body: &[u8]) -> Result<T, ChannelError> {
    let envelope: ApiResponse<T> = serde_json::from_slice(body).map_err(|e| {
        ChannelError::UnexpectedResponse(format!("{} returned invalid JSON: {}", method, e))
    })?;

    if !envelope.ok {
        let description = envelope
            .description
            .unwrap_or_else(|| "no description".to_string());
        let retry = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .map(|secs| format!(" (retry after {}s)", secs))
            .unwrap_or_default();
        return Err(ChannelError::Api(format!(
            "{} failed with {}: {}{}",
            method,
            envelope.error_code.unwrap_or_default(),
            description,
            retry
        )));
    }

    envelope
        .result
        .ok_or_else(|| ChannelError::UnexpectedResponse(format!("{} returned no result", method)))
}

fn reply_parameters(reply_to: Option<MessageId>) -> Option<serde_json::Value> {
    reply_to.map(|id| {
        json!({
            "message_id": id.0,
            "allow_sending_without_reply": true,
        })
    })
}

#[async_trait]
impl Messenger for TelegramClient {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChannelError> {
        let mut body = json!({
            "chat_id": chat.0,
            "text": text,
        });
        if let Some(reply) = reply_parameters(reply_to) {
            body["reply_parameters"] = reply;
        }

        let sent: SentMessage = self.call("sendMessage", &body).await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat.0,
            "message_id": message.0,
            "text": text,
        });

        // Returns the edited message, or `true` for inline messages.
        match self.call::<serde_json::Value>("editMessageText", &body).await {
            Ok(_) => Ok(()),
            Err(ChannelError::Api(description)) if description.contains(NOT_MODIFIED) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn send_typing(&self, chat: ChatId) -> Result<(), ChannelError> {
        let body = json!({
            "chat_id": chat.0,
            "action": "typing",
        });
        let _: bool = self.call("sendChatAction", &body).await?;
        Ok(())
    }

    async fn send_file(
        &self,
        chat: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<(), ChannelError> {
        debug!("Uploading {:?} to chat {}", file, chat);
        let part = Part::bytes(file.bytes).file_name(file.filename);
        let mut form = Form::new()
            .text("chat_id", chat.0.to_string())
            .part("document", part);
        if let Some(reply) = reply_parameters(reply_to) {
            form = form.text("reply_parameters", reply.to_string());
        }

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = response.bytes().await.map_err(transport_error)?;
        let _: SentMessage = decode("sendDocument", &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TelegramConfig {
        TelegramConfig {
            token: "123:abc".to_string(),
            api_base: "https://api.telegram.org/".to_string(),
            poll_timeout_secs: 30,
        }
    }

    #[test]
    fn test_method_url() {
        let client = TelegramClient::new(&config()).unwrap();
        assert_eq!(
            client.method_url("getUpdates"),
            "https://api.telegram.org/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_decode_success() {
        let body = br#"{"ok": true, "result": {"message_id": 5, "date": 0, "chat": {"id": 1}}}"#;
        let sent: SentMessage = decode("sendMessage", body).unwrap();
        assert_eq!(sent.message_id, 5);
    }

    #[test]
    fn test_decode_api_error() {
        let body = br#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#;
        let err = decode::<SentMessage>("sendMessage", body).unwrap_err();
        match err {
            ChannelError::Api(message) => {
                assert!(message.contains("sendMessage"));
                assert!(message.contains("400"));
                assert!(message.contains("chat not found"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_flood_limit_mentions_retry() {
        let body = br#"{"ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": {"retry_after": 7}}"#;
        let err = decode::<bool>("sendChatAction", body).unwrap_err();
        assert!(err.to_string().contains("retry after 7s"));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode::<bool>("getMe", b"<html>502</html>").unwrap_err();
        assert!(matches!(err, ChannelError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_reply_parameters() {
        assert!(reply_parameters(None).is_none());
        let reply = reply_parameters(Some(MessageId(9))).unwrap();
        assert_eq!(reply["message_id"], 9);
    }
}
