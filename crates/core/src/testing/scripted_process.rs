//! Scripted stand-in for the wrapped download tool.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::driver::{DriverError, InteractiveProcess, LaunchSpec, ProcessEvent, ProcessLauncher};

/// One step of a scripted process.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Print a chunk of output.
    Emit(Vec<u8>),
    /// Block until at least this many answers were written in total.
    ExpectInput(usize),
    /// Create files in the directory named by the latest answer, falling back
    /// to the working directory.
    WriteFiles(Vec<(String, Vec<u8>)>),
    /// Close stdin from the process side; later answers are rejected.
    CloseInput,
    /// Exit with the given code.
    Exit(Option<i32>),
    /// Never print or exit again; only a kill ends the process.
    Hang,
}

impl ScriptStep {
    pub fn emit(text: impl Into<String>) -> Self {
        ScriptStep::Emit(text.into().into_bytes())
    }

    pub fn files(names: &[&str]) -> Self {
        ScriptStep::WriteFiles(
            names
                .iter()
                .map(|name| (name.to_string(), format!("contents of {}", name).into_bytes()))
                .collect(),
        )
    }
}

/// What one scripted process saw.
#[derive(Debug, Clone, Default)]
pub struct ProcessLog {
    pub spec: Option<LaunchSpec>,
    pub inputs: Vec<Vec<u8>>,
    pub input_closed: bool,
    pub killed: bool,
    pub exited: bool,
    /// Writes attempted after exit or after stdin was closed.
    pub rejected_writes: usize,
}

/// Launcher handing out [`ScriptedProcess`]es that all follow one script.
///
/// # Example
///
/// ```rust,ignore
/// use scorebot_core::testing::{ScriptStep, ScriptedLauncher};
///
/// let launcher = Arc::new(ScriptedLauncher::new(vec![
///     ScriptStep::emit("? Score URL: "),
///     ScriptStep::ExpectInput(1),
///     ScriptStep::Exit(Some(1)),
/// ]));
/// let driver = PromptDriver::new(config, launcher.clone());
/// driver.run(&job, None).await?;
/// assert_eq!(launcher.inputs().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct ScriptedLauncher {
    script: Vec<ScriptStep>,
    /// Program name reported as missing instead of launching.
    missing_program: Option<String>,
    logs: Arc<RwLock<Vec<Arc<RwLock<ProcessLog>>>>>,
}

impl ScriptedLauncher {
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            missing_program: None,
            logs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// A launcher whose every launch fails as if `program` were not installed.
    pub fn failing(program: impl Into<String>) -> Self {
        Self {
            missing_program: Some(program.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Number of processes launched so far.
    pub async fn launch_count(&self) -> usize {
        self.logs.read().await.len()
    }

    /// Logs of every launched process, in launch order.
    pub async fn logs(&self) -> Vec<ProcessLog> {
        let mut logs = Vec::new();
        for log in self.logs.read().await.iter() {
            logs.push(log.read().await.clone());
        }
        logs
    }

    /// Answers written to the most recent process.
    pub async fn inputs(&self) -> Vec<Vec<u8>> {
        self.last_log().await.inputs
    }

    pub async fn input_closed(&self) -> bool {
        self.last_log().await.input_closed
    }

    pub async fn killed(&self) -> bool {
        self.last_log().await.killed
    }

    /// Writes the most recent process rejected because it was already
    /// closed or gone.
    pub async fn rejected_writes(&self) -> usize {
        self.last_log().await.rejected_writes
    }

    async fn last_log(&self) -> ProcessLog {
        match self.logs.read().await.last() {
            Some(log) => log.read().await.clone(),
            None => ProcessLog::default(),
        }
    }
}

#[async_trait]
impl ProcessLauncher for ScriptedLauncher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn InteractiveProcess>, DriverError> {
        if let Some(ref program) = self.missing_program {
            return Err(DriverError::ProgramNotFound {
                program: program.clone(),
            });
        }

        let log = Arc::new(RwLock::new(ProcessLog {
            spec: Some(spec.clone()),
            ..Default::default()
        }));
        self.logs.write().await.push(log.clone());

        Ok(Box::new(ScriptedProcess {
            steps: self.script.clone(),
            next: 0,
            working_dir: spec.working_dir.clone(),
            log,
        }))
    }
}

/// A fake process replaying a script.
pub struct ScriptedProcess {
    steps: Vec<ScriptStep>,
    next: usize,
    working_dir: PathBuf,
    log: Arc<RwLock<ProcessLog>>,
}

impl ScriptedProcess {
    async fn destination(&self) -> PathBuf {
        let log = self.log.read().await;
        log.inputs
            .last()
            .map(|input| String::from_utf8_lossy(input).trim_end().to_string())
            .filter(|text| text.starts_with('/'))
            .map(PathBuf::from)
            .unwrap_or_else(|| self.working_dir.clone())
    }
}

#[async_trait]
impl InteractiveProcess for ScriptedProcess {
    async fn next_event(&mut self) -> ProcessEvent {
        loop {
            {
                let log = self.log.read().await;
                if log.killed {
                    return ProcessEvent::Exited(None);
                }
            }

            let Some(step) = self.steps.get(self.next).cloned() else {
                self.log.write().await.exited = true;
                return ProcessEvent::Exited(Some(0));
            };

            match step {
                ScriptStep::Emit(bytes) => {
                    self.next += 1;
                    return ProcessEvent::Output(bytes);
                }
                ScriptStep::ExpectInput(count) => {
                    if self.log.read().await.inputs.len() < count {
                        // Answers only arrive while this future is not being polled.
                        std::future::pending::<()>().await;
                    }
                    self.next += 1;
                }
                ScriptStep::WriteFiles(files) => {
                    let dir = self.destination().await;
                    self.next += 1;
                    for (name, bytes) in files {
                        if let Err(e) = std::fs::write(dir.join(&name), bytes) {
                            warn!("Scripted process failed to write {}: {}", name, e);
                            self.log.write().await.exited = true;
                            return ProcessEvent::Exited(Some(1));
                        }
                    }
                }
                ScriptStep::CloseInput => {
                    self.next += 1;
                    self.log.write().await.input_closed = true;
                }
                ScriptStep::Exit(code) => {
                    self.next = self.steps.len();
                    self.log.write().await.exited = true;
                    return ProcessEvent::Exited(code);
                }
                ScriptStep::Hang => std::future::pending::<()>().await,
            }
        }
    }

    async fn write_input(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let mut log = self.log.write().await;
        if log.exited || log.killed || log.input_closed {
            log.rejected_writes += 1;
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted process input is closed",
            ));
        }
        log.inputs.push(bytes.to_vec());
        Ok(())
    }

    async fn close_input(&mut self) {
        self.log.write().await.input_closed = true;
    }

    async fn kill(&mut self) {
        let mut log = self.log.write().await;
        log.killed = true;
        log.exited = true;
    }
}
