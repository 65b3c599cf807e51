//! Mock messenger for testing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

use crate::channel::{ChannelError, ChatId, MessageId, Messenger, OutgoingFile};

/// A recorded text message, including every later edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMessage {
    pub chat: ChatId,
    pub id: MessageId,
    pub reply_to: Option<MessageId>,
    /// Text as first sent.
    pub text: String,
    /// Texts of subsequent edits, oldest first.
    pub edits: Vec<String>,
}

impl RecordedMessage {
    /// Text currently shown to the user.
    pub fn current_text(&self) -> &str {
        self.edits.last().unwrap_or(&self.text)
    }
}

/// A recorded file delivery attempt.
#[derive(Debug, Clone)]
pub struct RecordedFile {
    pub chat: ChatId,
    pub file: OutgoingFile,
    pub reply_to: Option<MessageId>,
    pub delivered: bool,
}

/// Mock implementation of the Messenger trait.
///
/// Records everything the job engine sends. It can be told to fail
/// individual file deliveries, or to hold every delivery until released.
///
/// # Example
///
/// ```rust,ignore
/// use scorebot_core::testing::MockMessenger;
///
/// let messenger = Arc::new(MockMessenger::new());
/// messenger.fail_file("score.mid").await;
///
/// supervisor.handle(&message).await;
///
/// let messages = messenger.messages().await;
/// assert!(messages[0].current_text().contains("Found score"));
/// ```
#[derive(Debug)]
pub struct MockMessenger {
    next_id: AtomicI64,
    messages: Arc<RwLock<Vec<RecordedMessage>>>,
    files: Arc<RwLock<Vec<RecordedFile>>>,
    typing: Arc<RwLock<Vec<ChatId>>>,
    failing_files: Arc<RwLock<HashSet<String>>>,
    fail_sends: Arc<RwLock<bool>>,
    /// `true` while deliveries may complete.
    file_gate: watch::Sender<bool>,
    held_files: AtomicUsize,
}

impl Default for MockMessenger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMessenger {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            messages: Arc::new(RwLock::new(Vec::new())),
            files: Arc::new(RwLock::new(Vec::new())),
            typing: Arc::new(RwLock::new(Vec::new())),
            failing_files: Arc::new(RwLock::new(HashSet::new())),
            fail_sends: Arc::new(RwLock::new(false)),
            file_gate: watch::Sender::new(true),
            held_files: AtomicUsize::new(0),
        }
    }

    /// All text messages sent so far.
    pub async fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.read().await.clone()
    }

    /// Current text of the most recent message, if any.
    pub async fn last_text(&self) -> Option<String> {
        self.messages
            .read()
            .await
            .last()
            .map(|m| m.current_text().to_string())
    }

    /// All file delivery attempts.
    pub async fn files(&self) -> Vec<RecordedFile> {
        self.files.read().await.clone()
    }

    /// Names of successfully delivered files, sorted.
    pub async fn delivered_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .read()
            .await
            .iter()
            .filter(|f| f.delivered)
            .map(|f| f.file.filename.clone())
            .collect();
        names.sort();
        names
    }

    /// Number of typing indicators shown.
    pub async fn typing_count(&self) -> usize {
        self.typing.read().await.len()
    }

    /// Makes deliveries of `filename` fail.
    pub async fn fail_file(&self, filename: impl Into<String>) {
        self.failing_files.write().await.insert(filename.into());
    }

    /// Makes every `send_text` fail.
    pub async fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.write().await = fail;
    }

    /// Makes every `send_file` wait until [`release_files`](Self::release_files).
    pub fn hold_files(&self) {
        self.file_gate.send_replace(false);
    }

    /// Lets held and future deliveries complete.
    pub fn release_files(&self) {
        self.file_gate.send_replace(true);
    }

    /// Number of deliveries currently waiting on the gate.
    pub fn held_files(&self) -> usize {
        self.held_files.load(Ordering::SeqCst)
    }

    pub async fn clear_recorded(&self) {
        self.messages.write().await.clear();
        self.files.write().await.clear();
        self.typing.write().await.clear();
    }
}

#[async_trait]
impl Messenger for MockMessenger {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ChannelError> {
        if *self.fail_sends.read().await {
            return Err(ChannelError::ConnectionFailed("mock send failure".to_string()));
        }

        let id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.messages.write().await.push(RecordedMessage {
            chat,
            id,
            reply_to,
            text: text.to_string(),
            edits: Vec::new(),
        });
        Ok(id)
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
    ) -> Result<(), ChannelError> {
        let mut messages = self.messages.write().await;
        let recorded = messages
            .iter_mut()
            .find(|m| m.chat == chat && m.id == message)
            .ok_or_else(|| ChannelError::Api(format!("message {} not found", message)))?;
        recorded.edits.push(text.to_string());
        Ok(())
    }

    async fn send_typing(&self, chat: ChatId) -> Result<(), ChannelError> {
        self.typing.write().await.push(chat);
        Ok(())
    }

    async fn send_file(
        &self,
        chat: ChatId,
        file: OutgoingFile,
        reply_to: Option<MessageId>,
    ) -> Result<(), ChannelError> {
        let mut gate = self.file_gate.subscribe();
        if !*gate.borrow() {
            self.held_files.fetch_add(1, Ordering::SeqCst);
            // The sender lives as long as `self`, so this cannot fail.
            let _ = gate.wait_for(|open| *open).await;
            self.held_files.fetch_sub(1, Ordering::SeqCst);
        }

        let delivered = !self.failing_files.read().await.contains(&file.filename);
        let filename = file.filename.clone();
        self.files.write().await.push(RecordedFile {
            chat,
            file,
            reply_to,
            delivered,
        });

        if delivered {
            Ok(())
        } else {
            Err(ChannelError::Api(format!("upload of {} rejected", filename)))
        }
    }
}
