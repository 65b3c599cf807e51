//! The stage machine that drives one process to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{interval_at, sleep, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::DriverConfig;
use super::detector::PromptDetector;
use super::error::DriverError;
use super::output::extract_title;
use super::process::{InteractiveProcess, LaunchSpec, ProcessEvent, ProcessLauncher};
use super::types::{DriverEvent, DriverOutcome, DriverReport, FailureReason, Stage};

/// What the driver needs to know about one job.
#[derive(Debug, Clone)]
pub struct DriverJob {
    /// Validated score link answered at the first prompt.
    pub link: String,
    /// Absolute workspace path; the process runs there and saves files there.
    pub workspace: PathBuf,
}

/// Drives the download tool through its prompts.
pub struct PromptDriver {
    config: DriverConfig,
    launcher: Arc<dyn ProcessLauncher>,
}

/// How the select loop ended.
enum Termination {
    Exited(Option<i32>),
    TimedOut,
}

/// Mutable state of one run.
struct Session {
    stage: Stage,
    stages: Vec<Stage>,
    output: Vec<u8>,
    /// Start of the output not yet attributed to an answered prompt.
    transition_offset: usize,
    title: Option<String>,
    inputs_written: usize,
    events: Option<mpsc::Sender<DriverEvent>>,
}

impl Session {
    fn new(events: Option<mpsc::Sender<DriverEvent>>) -> Self {
        Self {
            stage: Stage::AwaitingLinkPrompt,
            stages: vec![Stage::AwaitingLinkPrompt],
            output: Vec::new(),
            transition_offset: 0,
            title: None,
            inputs_written: 0,
            events,
        }
    }

    /// True once the destination was answered and stdin is closed.
    fn input_complete(&self) -> bool {
        self.stage == Stage::Done
    }

    async fn emit(&self, event: DriverEvent) {
        if let Some(ref tx) = self.events {
            // A dropped receiver only means nobody is watching.
            let _ = tx.send(event).await;
        }
    }

    async fn advance(&mut self) {
        let Some(next) = self.stage.next() else {
            return;
        };
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
        self.stages.push(next);
        self.emit(DriverEvent::StageAdvanced { stage: next }).await;
    }
}

impl PromptDriver {
    pub fn new(config: DriverConfig, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { config, launcher }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Spawns the tool for `job` and drives it until it exits or times out.
    ///
    /// Only a failed spawn is an error. Everything the process does after it
    /// started is reported through the returned [`DriverReport`].
    pub async fn run(
        &self,
        job: &DriverJob,
        events: Option<mpsc::Sender<DriverEvent>>,
    ) -> Result<DriverReport, DriverError> {
        let started = Instant::now();
        let spec = LaunchSpec {
            program: self.config.program.clone(),
            args: self.config.args.clone(),
            env: self.config.env.clone(),
            working_dir: job.workspace.clone(),
        };

        let mut process = self.launcher.launch(&spec).await?;
        let mut detector = self.config.detector();
        let mut session = Session::new(events);

        info!(
            "Driving {} for {} ({} detection, {}s timeout)",
            self.config.program,
            job.link,
            detector.name(),
            self.config.timeout_secs
        );

        let mut ticker = detector.poll_interval().map(|period| {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let deadline = sleep(self.config.timeout());
        tokio::pin!(deadline);

        let termination = loop {
            tokio::select! {
                event = process.next_event() => match event {
                    ProcessEvent::Output(chunk) => {
                        session.output.extend_from_slice(&chunk);
                        self.on_output(&mut session, detector.as_mut(), process.as_mut(), job)
                            .await;
                    }
                    ProcessEvent::Exited(code) => break Termination::Exited(code),
                },
                _ = next_tick(&mut ticker), if !session.input_complete() => {
                    if detector.on_tick(session.stage, session.output.len()) {
                        session.transition_offset = session.output.len();
                        self.respond(&mut session, process.as_mut(), job).await;
                    }
                }
                _ = &mut deadline => {
                    warn!(
                        "Driver timed out after {}s at stage {}, killing process",
                        self.config.timeout_secs, session.stage
                    );
                    process.kill().await;
                    break Termination::TimedOut;
                }
            }
        };

        let (outcome, exit_code) = match termination {
            Termination::TimedOut => (
                DriverOutcome::Failure {
                    reason: FailureReason::TimedOut {
                        timeout_secs: self.config.timeout_secs,
                    },
                },
                None,
            ),
            Termination::Exited(code) => {
                let outcome = match session.title.clone() {
                    Some(title) => DriverOutcome::Success { title },
                    None => DriverOutcome::Failure {
                        reason: FailureReason::NoTitle,
                    },
                };
                (outcome, code)
            }
        };

        info!(
            "Process closed at stage {} with exit code {:?}: {:?}",
            session.stage, exit_code, outcome
        );
        session
            .emit(DriverEvent::ProcessClosed {
                outcome: outcome.clone(),
                exit_code,
            })
            .await;

        Ok(DriverReport {
            outcome,
            stages: session.stages,
            exit_code,
            output: session.output,
            inputs_written: session.inputs_written,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Runs signature detection over everything since the last transition.
    ///
    /// One chunk may carry several prompts, so this keeps going until the
    /// detector stops matching.
    async fn on_output(
        &self,
        session: &mut Session,
        detector: &mut dyn PromptDetector,
        process: &mut dyn InteractiveProcess,
        job: &DriverJob,
    ) {
        while !session.input_complete() {
            let fresh = &session.output[session.transition_offset..];
            let Some(consumed) = detector.on_output(session.stage, fresh) else {
                break;
            };
            session.transition_offset += consumed;
            self.respond(session, process, job).await;
        }
    }

    /// Answers the prompt of the current stage and advances.
    async fn respond(
        &self,
        session: &mut Session,
        process: &mut dyn InteractiveProcess,
        job: &DriverJob,
    ) {
        let input = &self.config.input;
        let answer = match session.stage {
            Stage::AwaitingLinkPrompt => input.line(&job.link),
            Stage::AwaitingConfirmation => {
                if session.title.is_none() {
                    if let Some(title) = extract_title(&session.output, &self.config.title_label)
                    {
                        info!("Detected title: {}", title);
                        session.title = Some(title.clone());
                        session.emit(DriverEvent::TitleDetected { title }).await;
                    }
                }
                input.bare_confirmation()
            }
            Stage::AwaitingFileSelection => input.select_all(),
            Stage::AwaitingDestination => input.line(&job.workspace.display().to_string()),
            Stage::Done => return,
        };

        match process.write_input(&answer).await {
            Ok(()) => session.inputs_written += 1,
            // The process may already be gone; its exit event decides the outcome.
            Err(e) => debug!("Write at stage {} ignored: {}", session.stage, e),
        }

        if session.stage == Stage::AwaitingDestination {
            process.close_input().await;
        }
        session.advance().await;
    }
}

/// Waits for the next quiescence tick, or forever without a ticker.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::config::DetectionStrategy;
    use crate::testing::{ScriptStep, ScriptedLauncher};
    use std::time::Duration;

    fn job() -> DriverJob {
        DriverJob {
            link: "https://musescore.com/user/1/scores/2".to_string(),
            workspace: PathBuf::from("/tmp/scorebot-test/job"),
        }
    }

    fn signature_config() -> DriverConfig {
        DriverConfig::with_program("tool", vec![]).with_detection(DetectionStrategy::Signature)
    }

    fn quiescence_config() -> DriverConfig {
        DriverConfig::with_program("tool", vec![])
            .with_poll_interval(Duration::from_millis(20))
    }

    /// A well-behaved tool: every prompt is followed by waiting for its answer.
    fn happy_script(title_line: &str) -> Vec<ScriptStep> {
        vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            ScriptStep::emit(format!("{}\n? Continue? (Y/n) ", title_line)),
            ScriptStep::ExpectInput(2),
            ScriptStep::emit("? Filetype Selection\n"),
            ScriptStep::ExpectInput(3),
            ScriptStep::emit("? Output Directory: "),
            ScriptStep::ExpectInput(4),
            ScriptStep::emit("Done\n"),
            ScriptStep::Exit(Some(0)),
        ]
    }

    #[tokio::test]
    async fn test_signature_run_succeeds_with_title() {
        let launcher = Arc::new(ScriptedLauncher::new(happy_script("Title: Sample Song")));
        let driver = PromptDriver::new(signature_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(
            report.outcome,
            DriverOutcome::Success {
                title: "Sample Song".to_string()
            }
        );
        assert_eq!(report.stages, Stage::SEQUENCE.to_vec());
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.inputs_written, 4);

        let inputs = launcher.inputs().await;
        assert_eq!(
            inputs,
            vec![
                b"https://musescore.com/user/1/scores/2\n".to_vec(),
                b"\n".to_vec(),
                b"a\r\n".to_vec(),
                b"/tmp/scorebot-test/job\n".to_vec(),
            ]
        );
        assert!(launcher.input_closed().await);
        assert_eq!(launcher.rejected_writes().await, 0);
    }

    #[tokio::test]
    async fn test_quiescence_run_succeeds_with_title() {
        let launcher = Arc::new(ScriptedLauncher::new(happy_script("Title: Sample Song")));
        let driver = PromptDriver::new(quiescence_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(report.outcome.title(), Some("Sample Song"));
        assert_eq!(report.stages, Stage::SEQUENCE.to_vec());
        assert_eq!(launcher.inputs().await.len(), 4);
    }

    #[tokio::test]
    async fn test_exit_without_title_is_failure() {
        let script = vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            ScriptStep::emit("Error: score not found\n"),
            ScriptStep::Exit(Some(1)),
        ];
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let driver = PromptDriver::new(signature_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(
            report.outcome,
            DriverOutcome::Failure {
                reason: FailureReason::NoTitle
            }
        );
        assert_eq!(
            report.stages,
            vec![Stage::AwaitingLinkPrompt, Stage::AwaitingConfirmation]
        );
        assert_eq!(report.exit_code, Some(1));
        assert_eq!(launcher.inputs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_silent_exit_is_failure() {
        let launcher = Arc::new(ScriptedLauncher::new(vec![ScriptStep::Exit(Some(0))]));
        let driver = PromptDriver::new(quiescence_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert!(!report.outcome.is_success());
        assert_eq!(report.stages, vec![Stage::AwaitingLinkPrompt]);
        assert!(launcher.inputs().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_write_is_not_counted() {
        let launcher = Arc::new(ScriptedLauncher::new(vec![
            ScriptStep::CloseInput,
            ScriptStep::emit("? Score URL: "),
            ScriptStep::Exit(Some(1)),
        ]));
        let driver = PromptDriver::new(signature_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(report.inputs_written, 0);
        assert_eq!(launcher.rejected_writes().await, 1);
        assert!(launcher.inputs().await.is_empty());
        assert_eq!(
            report.outcome,
            DriverOutcome::Failure {
                reason: FailureReason::NoTitle
            }
        );
    }

    #[tokio::test]
    async fn test_prompts_in_one_chunk_are_answered_in_order() {
        let script = vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            ScriptStep::emit("Title: Etude\n? Continue? (Y/n) "),
            ScriptStep::ExpectInput(2),
            // Both remaining prompts arrive together.
            ScriptStep::emit("? Filetype Selection\n? Output Directory: "),
            ScriptStep::ExpectInput(4),
            ScriptStep::Exit(Some(0)),
        ];
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let driver = PromptDriver::new(signature_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert!(report.outcome.is_success());
        assert_eq!(report.stages, Stage::SEQUENCE.to_vec());
        assert_eq!(launcher.inputs().await[2], b"a\r\n".to_vec());
    }

    #[tokio::test]
    async fn test_repeated_prompt_text_is_not_answered_twice() {
        let script = vec![
            ScriptStep::emit("? Score URL: "),
            ScriptStep::ExpectInput(1),
            // The tool echoes the link prompt back; only "Continue?" may advance.
            ScriptStep::emit("Score URL: https://musescore.com/user/1/scores/2\n"),
            ScriptStep::emit("Title: Etude\n? Continue? (Y/n) "),
            ScriptStep::ExpectInput(2),
            ScriptStep::Exit(Some(0)),
        ];
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let driver = PromptDriver::new(signature_config(), launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(launcher.inputs().await.len(), 2);
        assert_eq!(
            report.stages,
            vec![
                Stage::AwaitingLinkPrompt,
                Stage::AwaitingConfirmation,
                Stage::AwaitingFileSelection
            ]
        );
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let script = vec![ScriptStep::emit("? Score URL: "), ScriptStep::Hang];
        let launcher = Arc::new(ScriptedLauncher::new(script));
        let config = signature_config().with_timeout(1);
        let driver = PromptDriver::new(config, launcher.clone());

        let report = driver.run(&job(), None).await.unwrap();

        assert_eq!(
            report.outcome,
            DriverOutcome::Failure {
                reason: FailureReason::TimedOut { timeout_secs: 1 }
            }
        );
        assert!(launcher.killed().await);
        assert_eq!(report.exit_code, None);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let launcher = Arc::new(ScriptedLauncher::new(happy_script("Title: Sample Song")));
        let driver = PromptDriver::new(signature_config(), launcher);
        let (tx, mut rx) = mpsc::channel(32);

        driver.run(&job(), Some(tx)).await.unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        let titles: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, DriverEvent::TitleDetected { .. }))
            .collect();
        assert_eq!(titles.len(), 1);

        let advanced: Vec<Stage> = events
            .iter()
            .filter_map(|e| match e {
                DriverEvent::StageAdvanced { stage } => Some(*stage),
                _ => None,
            })
            .collect();
        assert_eq!(advanced, Stage::SEQUENCE[1..].to_vec());

        assert!(matches!(
            events.last(),
            Some(DriverEvent::ProcessClosed {
                outcome: DriverOutcome::Success { .. },
                exit_code: Some(0)
            })
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let launcher = Arc::new(ScriptedLauncher::failing("tool"));
        let driver = PromptDriver::new(signature_config(), launcher);

        let err = driver.run(&job(), None).await.unwrap_err();
        assert!(matches!(err, DriverError::ProgramNotFound { .. }));
    }
}
