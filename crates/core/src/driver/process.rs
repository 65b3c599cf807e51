//! Child process abstraction.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::error::DriverError;

/// Size of a single read from the child's stdout or stderr.
const READ_CHUNK: usize = 4096;

/// Chunks buffered between the pipe readers and the driver.
const OUTPUT_BUFFER: usize = 64;

/// What to spawn and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: PathBuf,
}

/// Something observed on a running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// A chunk of combined stdout/stderr output.
    Output(Vec<u8>),
    /// The process exited. Carries the exit code when there is one.
    Exited(Option<i32>),
}

/// A running interactive process.
#[async_trait]
pub trait InteractiveProcess: Send {
    /// Waits for the next output chunk or for exit.
    ///
    /// Must be cancel safe: the driver races it against timers and drops the
    /// future when a timer wins. All output is delivered before `Exited`.
    async fn next_event(&mut self) -> ProcessEvent;

    /// Writes to the process's stdin.
    async fn write_input(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Closes stdin. Later writes fail.
    async fn close_input(&mut self);

    /// Kills the process and reaps it.
    async fn kill(&mut self);
}

/// Starts interactive processes.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Returns the name of this launcher implementation.
    fn name(&self) -> &str;

    /// Spawns the process described by `spec`.
    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn InteractiveProcess>, DriverError>;
}

/// Spawns real processes with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    fn name(&self) -> &str {
        "tokio"
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<Box<dyn InteractiveProcess>, DriverError> {
        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DriverError::ProgramNotFound {
                        program: spec.program.clone(),
                    }
                } else {
                    DriverError::SpawnFailed {
                        program: spec.program.clone(),
                        source: e,
                    }
                }
            })?;

        let stdin = child.stdin.take().ok_or(DriverError::MissingPipe("stdin"))?;
        let stdout = child.stdout.take().ok_or(DriverError::MissingPipe("stdout"))?;
        let stderr = child.stderr.take().ok_or(DriverError::MissingPipe("stderr"))?;

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        forward_output(stdout, output_tx.clone());
        forward_output(stderr, output_tx);

        debug!("Spawned {} (pid {:?}) in {:?}", spec.program, child.id(), spec.working_dir);

        Ok(Box::new(TokioProcess {
            child,
            stdin: Some(stdin),
            output_rx,
        }))
    }
}

/// Copies one pipe into the shared output channel until EOF.
fn forward_output<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Output pipe closed with error: {}", e);
                    break;
                }
            }
        }
    });
}

/// A process spawned by [`TokioLauncher`].
struct TokioProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    output_rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl InteractiveProcess for TokioProcess {
    async fn next_event(&mut self) -> ProcessEvent {
        if let Some(chunk) = self.output_rx.recv().await {
            return ProcessEvent::Output(chunk);
        }

        // Both pipes hit EOF; the process is exiting.
        match self.child.wait().await {
            Ok(status) => ProcessEvent::Exited(status.code()),
            Err(e) => {
                warn!("Failed to reap child process: {}", e);
                ProcessEvent::Exited(None)
            }
        }
    }

    async fn write_input(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin already closed")
        })?;
        stdin.write_all(bytes).await?;
        stdin.flush().await
    }

    async fn close_input(&mut self) {
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
    }

    async fn kill(&mut self) {
        self.stdin = None;
        if let Err(e) = self.child.kill().await {
            debug!("Kill failed (process likely gone): {}", e);
        }
    }
}
