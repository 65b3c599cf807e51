//! Runs one download request from validation to delivery.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::channel::{ChatId, IncomingMessage, MessageId, Messenger, OutgoingFile, RequesterId};
use crate::driver::{DriverEvent, DriverJob, DriverOutcome, PromptDriver};
use crate::link::{LinkValidator, LinkVerdict};
use crate::quota::QuotaTracker;
use crate::workspace::WorkspaceManager;

use super::messages;
use super::types::{FileDelivery, Job, JobOutcome, JobStatus};

/// Driver events buffered between the driver and the progress relay.
const EVENT_BUFFER: usize = 16;

/// Holds one quota slot and gives it back when dropped.
struct Admission<'a> {
    quota: &'a QuotaTracker,
    requester: &'a RequesterId,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.quota.release(self.requester);
    }
}

/// Composes validation, quota, workspaces, the driver and the channel.
pub struct JobSupervisor {
    validator: LinkValidator,
    quota: Arc<QuotaTracker>,
    workspaces: Arc<WorkspaceManager>,
    driver: PromptDriver,
    messenger: Arc<dyn Messenger>,
}

impl JobSupervisor {
    pub fn new(
        validator: LinkValidator,
        quota: Arc<QuotaTracker>,
        workspaces: Arc<WorkspaceManager>,
        driver: PromptDriver,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            validator,
            quota,
            workspaces,
            driver,
            messenger,
        }
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    /// Replies to `/start`.
    pub async fn greet(&self, request: &IncomingMessage) {
        let text = messages::greeting(request.first_name.as_deref());
        self.reply(request, &text).await;
    }

    /// Clears the requester's active job count and confirms it.
    pub async fn reset(&self, request: &IncomingMessage) {
        self.quota.reset(&request.requester);
        info!("Quota reset for {}", request.requester);
        self.reply(request, messages::RESET_DONE).await;
    }

    /// Handles one candidate link, notifying the requester along the way.
    ///
    /// The workspace is removed and the quota slot released on every path
    /// that acquired them, and only after all deliveries have finished.
    pub async fn handle(&self, request: &IncomingMessage) -> JobOutcome {
        let link = match self.validator.validate(&request.text) {
            LinkVerdict::Accepted { link } => link,
            LinkVerdict::RejectedPolicy { message } => {
                info!("Rejected restricted link from {}", request.requester);
                self.reply(request, &message).await;
                return JobOutcome::PolicyRejected { message };
            }
            LinkVerdict::Malformed => {
                debug!("Malformed link from {}: {:?}", request.requester, request.text);
                self.reply(request, messages::MALFORMED_LINK).await;
                return JobOutcome::Malformed;
            }
        };

        if !self.quota.try_acquire(&request.requester) {
            info!(
                "Quota exceeded for {} ({} active)",
                request.requester,
                self.quota.active(&request.requester)
            );
            self.reply(request, &messages::quota_exceeded(self.quota.ceiling()))
                .await;
            return JobOutcome::QuotaExceeded {
                ceiling: self.quota.ceiling(),
            };
        }
        let _admission = Admission {
            quota: &self.quota,
            requester: &request.requester,
        };

        let workspace = match self.workspaces.allocate().await {
            Ok(workspace) => workspace,
            Err(e) => {
                error!("Failed to allocate workspace: {}", e);
                self.reply(request, messages::UNEXPECTED_ERROR).await;
                return JobOutcome::Faulted {
                    error: e.to_string(),
                };
            }
        };

        let mut job = Job::new(request, link, &workspace);
        info!("Job {} started for {}: {}", job.id, job.requester, job.link);

        let outcome = self.run_job(&mut job, request).await;

        if let Err(e) = self.workspaces.destroy(&job.workspace).await {
            warn!("Failed to remove workspace of job {}: {}", job.id, e);
        }
        info!("Job {} finished ({:?}): {:?}", job.id, job.status, outcome);
        outcome
    }

    async fn run_job(&self, job: &mut Job, request: &IncomingMessage) -> JobOutcome {
        let progress = match self
            .messenger
            .send_text(request.chat, messages::STARTED, Some(request.message))
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to send progress message for job {}: {}", job.id, e);
                None
            }
        };
        self.typing(request.chat).await;

        let driver_job = DriverJob {
            link: job.link.clone(),
            workspace: job.workspace.clone(),
        };
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (result, _) = tokio::join!(
            self.driver.run(&driver_job, Some(tx)),
            self.relay(request.chat, progress, rx)
        );

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("Failed to start download tool for job {}: {}", job.id, e);
                job.finish(JobStatus::Failed);
                self.notify(request, progress, messages::UNEXPECTED_ERROR).await;
                return JobOutcome::Faulted {
                    error: e.to_string(),
                };
            }
        };
        job.record(&report);

        let title = match report.outcome {
            DriverOutcome::Success { title } => title,
            DriverOutcome::Failure { reason } => {
                info!("Job {} failed at stage {}: {}", job.id, job.stage, reason);
                debug!(
                    "Output of job {}:\n{}",
                    job.id,
                    String::from_utf8_lossy(&job.output)
                );
                self.notify(request, progress, &messages::driver_failure(&reason))
                    .await;
                return JobOutcome::DriverFailure {
                    reason,
                    stage: job.stage,
                };
            }
        };

        let files = match self.workspaces.list_files(&job.workspace).await {
            Ok(files) => files,
            Err(e) => {
                error!("Failed to list files of job {}: {}", job.id, e);
                job.finish(JobStatus::Failed);
                self.notify(request, progress, messages::UNEXPECTED_ERROR).await;
                return JobOutcome::Faulted {
                    error: e.to_string(),
                };
            }
        };

        if files.is_empty() {
            warn!("Job {} reported \"{}\" but produced no files", job.id, title);
            job.finish(JobStatus::Failed);
            self.notify(request, progress, messages::EMPTY_RESULT).await;
            return JobOutcome::EmptyResult { title };
        }

        self.typing(request.chat).await;
        let deliveries = join_all(files.iter().map(|path| self.deliver(request, path))).await;
        let failed = deliveries.iter().filter(|d| !d.delivered()).count();
        info!(
            "Job {} delivered {}/{} files",
            job.id,
            deliveries.len() - failed,
            deliveries.len()
        );

        job.finish(JobStatus::Succeeded);
        self.notify(request, progress, &messages::delivery_summary(&title, &deliveries))
            .await;
        JobOutcome::Delivered {
            title,
            files: deliveries,
        }
    }

    /// Turns driver events into edits of the progress message.
    async fn relay(
        &self,
        chat: ChatId,
        progress: Option<MessageId>,
        mut events: mpsc::Receiver<DriverEvent>,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                DriverEvent::TitleDetected { title } => {
                    if let Some(message) = progress {
                        if let Err(e) = self
                            .messenger
                            .edit_text(chat, message, &messages::title_found(&title))
                            .await
                        {
                            warn!("Failed to update progress message: {}", e);
                        }
                    }
                }
                DriverEvent::StageAdvanced { stage } => {
                    debug!("Chat {} advanced to {}", chat, stage);
                    self.typing(chat).await;
                }
                DriverEvent::ProcessClosed { exit_code, .. } => {
                    debug!("Chat {} process closed with {:?}", chat, exit_code);
                }
            }
        }
    }

    async fn deliver(&self, request: &IncomingMessage, path: &Path) -> FileDelivery {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {:?}: {}", path, e);
                return FileDelivery {
                    filename,
                    error: Some(e.to_string()),
                };
            }
        };

        let file = OutgoingFile {
            filename: filename.clone(),
            bytes,
        };
        match self
            .messenger
            .send_file(request.chat, file, Some(request.message))
            .await
        {
            Ok(()) => FileDelivery {
                filename,
                error: None,
            },
            Err(e) => {
                warn!("Failed to deliver {} to chat {}: {}", filename, request.chat, e);
                FileDelivery {
                    filename,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Sets the progress message to a terminal text, or sends a new message
    /// if there is none or it cannot be edited.
    async fn notify(&self, request: &IncomingMessage, progress: Option<MessageId>, text: &str) {
        if let Some(message) = progress {
            match self.messenger.edit_text(request.chat, message, text).await {
                Ok(()) => return,
                Err(e) => warn!("Failed to edit progress message, sending a new one: {}", e),
            }
        }
        self.reply(request, text).await;
    }

    async fn reply(&self, request: &IncomingMessage, text: &str) {
        if let Err(e) = self
            .messenger
            .send_text(request.chat, text, Some(request.message))
            .await
        {
            warn!("Failed to reply in chat {}: {}", request.chat, e);
        }
    }

    async fn typing(&self, chat: ChatId) {
        if let Err(e) = self.messenger.send_typing(chat).await {
            debug!("Failed to send typing indicator: {}", e);
        }
    }
}
