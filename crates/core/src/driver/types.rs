//! Types for the prompt driver.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in the tool's fixed prompt sequence.
///
/// Stages only move forward; failure is an outcome, not a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AwaitingLinkPrompt,
    AwaitingConfirmation,
    AwaitingFileSelection,
    AwaitingDestination,
    Done,
}

impl Stage {
    /// Every stage, in order.
    pub const SEQUENCE: [Stage; 5] = [
        Stage::AwaitingLinkPrompt,
        Stage::AwaitingConfirmation,
        Stage::AwaitingFileSelection,
        Stage::AwaitingDestination,
        Stage::Done,
    ];

    /// The stage that follows this one.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::AwaitingLinkPrompt => Some(Stage::AwaitingConfirmation),
            Stage::AwaitingConfirmation => Some(Stage::AwaitingFileSelection),
            Stage::AwaitingFileSelection => Some(Stage::AwaitingDestination),
            Stage::AwaitingDestination => Some(Stage::Done),
            Stage::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::AwaitingLinkPrompt => "awaiting_link_prompt",
            Stage::AwaitingConfirmation => "awaiting_confirmation",
            Stage::AwaitingFileSelection => "awaiting_file_selection",
            Stage::AwaitingDestination => "awaiting_destination",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a job did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// The process exited without ever printing a title. Covers bad links,
    /// crashes and unrecognised output alike.
    NoTitle,
    /// The job ran past its deadline and the process was killed.
    TimedOut { timeout_secs: u64 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoTitle => f.write_str("no title detected before exit"),
            FailureReason::TimedOut { timeout_secs } => {
                write!(f, "timed out after {} seconds", timeout_secs)
            }
        }
    }
}

/// Terminal outcome of one driven process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DriverOutcome {
    Success { title: String },
    Failure { reason: FailureReason },
}

impl DriverOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DriverOutcome::Success { .. })
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            DriverOutcome::Success { title } => Some(title),
            DriverOutcome::Failure { .. } => None,
        }
    }
}

/// Observable progress of a driven process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The stage machine moved forward.
    StageAdvanced { stage: Stage },
    /// A title was found in the output. Sent at most once per job.
    TitleDetected { title: String },
    /// The process is gone.
    ProcessClosed {
        outcome: DriverOutcome,
        exit_code: Option<i32>,
    },
}

/// Everything the driver learned while running one job.
#[derive(Debug, Clone)]
pub struct DriverReport {
    pub outcome: DriverOutcome,
    /// Stages entered, in order, starting with `AwaitingLinkPrompt`.
    pub stages: Vec<Stage>,
    /// Exit code, when the process exited on its own with one.
    pub exit_code: Option<i32>,
    /// Raw combined stdout and stderr.
    pub output: Vec<u8>,
    /// Number of answers written to the process.
    pub inputs_written: usize,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

impl DriverReport {
    /// Stage the job was in when the process went away.
    pub fn final_stage(&self) -> Stage {
        self.stages
            .last()
            .copied()
            .unwrap_or(Stage::AwaitingLinkPrompt)
    }

    /// Output decoded lossily, for logs.
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}
