//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mocks for both seams of the job engine: the chat
//! platform (`MockMessenger`) and the wrapped download tool
//! (`ScriptedLauncher`), so whole jobs run without a network or `npx`.
//!
//! # Example
//!
//! ```rust,ignore
//! use scorebot_core::testing::{fixtures, MockMessenger, ScriptedLauncher};
//!
//! let messenger = Arc::new(MockMessenger::new());
//! let launcher = Arc::new(ScriptedLauncher::new(fixtures::download_script("Sample Song", &["a.pdf"])));
//! ```

mod mock_messenger;
mod scripted_process;

pub use mock_messenger::{MockMessenger, RecordedFile, RecordedMessage};
pub use scripted_process::{ProcessLog, ScriptStep, ScriptedLauncher, ScriptedProcess};

/// Test fixtures and helper functions.
pub mod fixtures {
    use super::ScriptStep;
    use crate::channel::{ChatId, IncomingMessage, MessageId, RequesterId};

    /// A link that passes validation.
    pub const VALID_LINK: &str = "https://musescore.com/user/123/scores/456";

    /// A text message from requester 42 in chat 42.
    pub fn message(text: &str) -> IncomingMessage {
        message_from(42, text)
    }

    /// A text message from the given user, in their private chat.
    pub fn message_from(user: i64, text: &str) -> IncomingMessage {
        IncomingMessage {
            requester: RequesterId::from(user),
            first_name: Some("Ada".to_string()),
            chat: ChatId(user),
            message: MessageId(1),
            text: text.to_string(),
        }
    }

    /// The tool's prompts as they appear in a successful run, each followed
    /// by waiting for its answer. Files are written after the destination
    /// is answered.
    pub fn download_script(title: &str, files: &[&str]) -> Vec<ScriptStep> {
        vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            ScriptStep::emit(format!("\u{1b}[32m✔\u{1b}[39m Title: {}\n? Continue? (Y/n) ", title)),
            ScriptStep::ExpectInput(2),
            ScriptStep::emit("? Filetype Selection (Press <a> to toggle all)\n"),
            ScriptStep::ExpectInput(3),
            ScriptStep::emit("? Output Directory: "),
            ScriptStep::ExpectInput(4),
            ScriptStep::files(files),
            ScriptStep::emit("Done\n"),
            ScriptStep::Exit(Some(0)),
        ]
    }

    /// A run where the tool rejects the score after the link was entered.
    pub fn not_found_script() -> Vec<ScriptStep> {
        vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            ScriptStep::emit("Error: score not found\n"),
            ScriptStep::Exit(Some(1)),
        ]
    }
}
