//! Messaging channel abstraction.
//!
//! The job engine never talks to a chat platform directly. It reports progress
//! and delivers files through the `Messenger` trait, which the binary
//! implements for the Telegram Bot API and tests implement with
//! `testing::MockMessenger`.

mod error;
mod traits;
mod types;

pub use error::ChannelError;
pub use traits::Messenger;
pub use types::{ChatId, IncomingMessage, MessageId, OutgoingFile, RequesterId};
