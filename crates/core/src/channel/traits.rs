//! Trait definitions for the channel module.

use async_trait::async_trait;

use super::error::ChannelError;
use super::types::{ChatId, MessageId, OutgoingFile};

/// Outbound operations the job engine needs from a chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Returns the name of this channel implementation.
    fn name(&self) -> &str;

    /// Sends a text message, optionally as a reply, and returns its handle.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChannelError>;

    /// Replaces the text of a previously sent message.
    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), ChannelError>;

    /// Shows a "typing" indicator in the chat.
    async fn send_typing(&self, chat: ChatId) -> Result<(), ChannelError>;

    /// Uploads a file to the chat, optionally as a reply.
    async fn send_file(
        &self,
        chat: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<(), ChannelError>;
}
