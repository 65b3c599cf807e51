//! Prompt-driven process driver.
//!
//! Drives an interactive command-line tool that has no programmatic API
//! through its fixed prompt sequence:
//!
//! 1. `AwaitingLinkPrompt`: answer with the score link
//! 2. `AwaitingConfirmation`: pick up the `Title:` line, answer with a bare newline
//! 3. `AwaitingFileSelection`: toggle every file type and confirm
//! 4. `AwaitingDestination`: answer with the workspace path, then close stdin
//! 5. `Done`: every answer is written; the tool is expected to exit on its own
//!
//! Prompts are recognised by a pluggable [`PromptDetector`]. Two detectors
//! ship with the crate:
//!
//! - [`QuiescenceDetector`] (default): the tool is assumed to be waiting for
//!   input whenever its output stops growing for one polling interval and the
//!   plateau is new. Content-blind, so it survives cosmetic changes in the
//!   tool's output, but adds up to one interval of latency per stage and
//!   cannot tell a prompt from a stall.
//! - [`SignatureDetector`]: each stage has a fixed byte signature that must
//!   appear in the output received since the previous transition. Reacts
//!   immediately but breaks as soon as the tool rewords a prompt.
//!
//! Process exit is the only completion signal. The outcome is a success when
//! a title was detected and a failure otherwise; a crash, a changed output
//! format and a bad link all look the same from here.
//!
//! # Example
//!
//! ```ignore
//! use scorebot_core::driver::{DriverConfig, DriverJob, PromptDriver, TokioLauncher};
//!
//! let driver = PromptDriver::new(DriverConfig::default(), Arc::new(TokioLauncher));
//! let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//!
//! let job = DriverJob {
//!     link: "https://musescore.com/user/123/scores/456".to_string(),
//!     workspace: workspace.path.clone(),
//! };
//! let report = driver.run(&job, Some(tx)).await?;
//! println!("{:?} after stages {:?}", report.outcome, report.stages);
//! ```

mod config;
mod detector;
mod error;
mod output;
mod process;
mod runner;
mod types;

pub use config::{DetectionStrategy, DriverConfig, InputSequences, PromptSignatures};
pub use detector::{PromptDetector, QuiescenceDetector, SignatureDetector};
pub use error::DriverError;
pub use output::{extract_title, strip_ansi};
pub use process::{InteractiveProcess, LaunchSpec, ProcessEvent, ProcessLauncher, TokioLauncher};
pub use runner::{DriverJob, PromptDriver};
pub use types::{DriverEvent, DriverOutcome, DriverReport, FailureReason, Stage};
