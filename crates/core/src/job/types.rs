//! Job state and outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::channel::{ChatId, IncomingMessage, RequesterId};
use crate::driver::{DriverOutcome, DriverReport, FailureReason, Stage};
use crate::workspace::Workspace;

/// Where a job stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// One admitted download request.
#[derive(Debug, Clone)]
pub struct Job {
    /// Unique id, shared with the workspace directory name.
    pub id: String,
    pub requester: RequesterId,
    pub chat: ChatId,
    pub link: String,
    pub workspace: PathBuf,
    pub created_at: DateTime<Utc>,
    pub stage: Stage,
    /// Raw output of the wrapped tool.
    pub output: Vec<u8>,
    pub title: Option<String>,
    pub status: JobStatus,
}

impl Job {
    /// Creates a pending job for an admitted request.
    pub fn new(request: &IncomingMessage, link: impl Into<String>, workspace: &Workspace) -> Self {
        Self {
            id: workspace.token.clone(),
            requester: request.requester.clone(),
            chat: request.chat,
            link: link.into(),
            workspace: workspace.path.clone(),
            created_at: Utc::now(),
            stage: Stage::AwaitingLinkPrompt,
            output: Vec::new(),
            title: None,
            status: JobStatus::Pending,
        }
    }

    /// Takes over what the driver observed.
    ///
    /// A successful driver run leaves the job pending: it only succeeds once
    /// its files are delivered.
    pub fn record(&mut self, report: &DriverReport) {
        self.stage = report.final_stage();
        self.output = report.output.clone();
        if let DriverOutcome::Success { ref title } = report.outcome {
            self.title = Some(title.clone());
        } else {
            self.status = JobStatus::Failed;
        }
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
    }
}

/// Result of delivering one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDelivery {
    pub filename: String,
    /// Why delivery failed, if it did.
    pub error: Option<String>,
}

impl FileDelivery {
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// How a request ended, as reported to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The link points at a restricted collection.
    PolicyRejected { message: String },
    /// The text is not a score link.
    Malformed,
    /// The requester already has the maximum number of jobs running.
    QuotaExceeded { ceiling: u32 },
    /// The tool never produced a title, or was killed after timing out.
    DriverFailure { reason: FailureReason, stage: Stage },
    /// The tool reported a score but left no files behind.
    EmptyResult { title: String },
    /// Files were handed to the channel. Individual deliveries may have failed.
    Delivered {
        title: String,
        files: Vec<FileDelivery>,
    },
    /// Spawning the tool or managing the workspace failed.
    Faulted { error: String },
}

impl JobOutcome {
    /// True for requests that got past validation and quota.
    pub fn was_admitted(&self) -> bool {
        !matches!(
            self,
            JobOutcome::PolicyRejected { .. } | JobOutcome::Malformed | JobOutcome::QuotaExceeded { .. }
        )
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, JobOutcome::Delivered { .. })
    }

    /// Files whose delivery failed.
    pub fn failed_deliveries(&self) -> Vec<&FileDelivery> {
        match self {
            JobOutcome::Delivered { files, .. } => files.iter().filter(|f| !f.delivered()).collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MessageId;

    fn workspace() -> Workspace {
        Workspace {
            token: "1700000000000-000001-abcd1234".to_string(),
            path: PathBuf::from("/tmp/downloads/1700000000000-000001-abcd1234"),
            created_at: Utc::now(),
        }
    }

    fn request() -> IncomingMessage {
        IncomingMessage {
            requester: RequesterId::from(7_i64),
            first_name: None,
            chat: ChatId(7),
            message: MessageId(3),
            text: "https://musescore.com/user/1/scores/2".to_string(),
        }
    }

    fn report(outcome: DriverOutcome, stages: Vec<Stage>) -> DriverReport {
        DriverReport {
            outcome,
            stages,
            exit_code: Some(0),
            output: b"Title: Etude\n".to_vec(),
            inputs_written: 2,
            duration_ms: 10,
        }
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new(&request(), "https://musescore.com/user/1/scores/2", &workspace());
        assert_eq!(job.id, "1700000000000-000001-abcd1234");
        assert_eq!(job.stage, Stage::AwaitingLinkPrompt);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn test_record_success_keeps_job_pending() {
        let mut job = Job::new(&request(), "link", &workspace());
        job.record(&report(
            DriverOutcome::Success {
                title: "Etude".to_string(),
            },
            Stage::SEQUENCE.to_vec(),
        ));

        assert_eq!(job.stage, Stage::Done);
        assert_eq!(job.title.as_deref(), Some("Etude"));
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.output, b"Title: Etude\n");
    }

    #[test]
    fn test_record_failure_fails_job() {
        let mut job = Job::new(&request(), "link", &workspace());
        job.record(&report(
            DriverOutcome::Failure {
                reason: FailureReason::NoTitle,
            },
            vec![Stage::AwaitingLinkPrompt, Stage::AwaitingConfirmation],
        ));

        assert_eq!(job.stage, Stage::AwaitingConfirmation);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn test_outcome_helpers() {
        let outcome = JobOutcome::Delivered {
            title: "Etude".to_string(),
            files: vec![
                FileDelivery {
                    filename: "a.pdf".to_string(),
                    error: None,
                },
                FileDelivery {
                    filename: "a.mid".to_string(),
                    error: Some("too large".to_string()),
                },
            ],
        };
        assert!(outcome.is_delivered());
        assert!(outcome.was_admitted());
        assert_eq!(outcome.failed_deliveries().len(), 1);

        assert!(!JobOutcome::Malformed.was_admitted());
        assert!(!JobOutcome::QuotaExceeded { ceiling: 3 }.was_admitted());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = JobOutcome::QuotaExceeded { ceiling: 3 };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"type":"quota_exceeded","ceiling":3}"#);
    }
}
