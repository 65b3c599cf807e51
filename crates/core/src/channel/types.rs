//! Identity and payload types shared by channel implementations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of the user submitting requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for RequesterId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Conversation a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a message within a chat, used for replies and edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A text message received from a requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub requester: RequesterId,
    /// First name shown in greetings, when the platform provides one.
    pub first_name: Option<String>,
    pub chat: ChatId,
    pub message: MessageId,
    pub text: String,
}

/// A file to deliver to a requester.
#[derive(Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for OutgoingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutgoingFile")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .finish()
    }
}
