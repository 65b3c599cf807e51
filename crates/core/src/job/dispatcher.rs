//! Routes incoming messages to commands and spawned jobs.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::channel::IncomingMessage;

use super::command::BotCommand;
use super::supervisor::JobSupervisor;

/// Entry point for every incoming text.
#[derive(Clone)]
pub struct Dispatcher {
    supervisor: Arc<JobSupervisor>,
}

impl Dispatcher {
    pub fn new(supervisor: Arc<JobSupervisor>) -> Self {
        Self { supervisor }
    }

    pub fn supervisor(&self) -> &JobSupervisor {
        &self.supervisor
    }

    /// Answers commands inline and starts a background task for links.
    ///
    /// The returned handle belongs to a watcher that completes after the
    /// job. A panicking job is logged and followed by a best-effort removal
    /// of all workspaces; it never takes the dispatcher down.
    pub async fn dispatch(&self, message: IncomingMessage) -> Option<JoinHandle<()>> {
        match BotCommand::parse(&message.text) {
            BotCommand::Start => {
                self.supervisor.greet(&message).await;
                None
            }
            BotCommand::Reset => {
                self.supervisor.reset(&message).await;
                None
            }
            BotCommand::Link(_) => Some(self.spawn_job(message)),
        }
    }

    fn spawn_job(&self, message: IncomingMessage) -> JoinHandle<()> {
        let supervisor = self.supervisor.clone();
        let requester = message.requester.clone();
        let job = tokio::spawn(async move {
            let outcome = supervisor.handle(&message).await;
            debug!("Request from {} ended with {:?}", message.requester, outcome);
        });

        let supervisor = self.supervisor.clone();
        tokio::spawn(async move {
            let Err(e) = job.await else {
                return;
            };
            if e.is_panic() {
                error!("Job for {} panicked: {}", requester, e);
            } else {
                error!("Job for {} was aborted: {}", requester, e);
            }

            info!("Removing all workspaces after job fault");
            if let Err(e) = supervisor.workspaces().destroy_root().await {
                error!("Failed to clean up workspace root: {}", e);
            }
        })
    }
}
