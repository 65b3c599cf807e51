//! Download jobs: from an incoming link to delivered files.
//!
//! The [`JobSupervisor`] runs one request through validation, quota,
//! workspace allocation, the prompt driver and file delivery. The
//! [`Dispatcher`] sits in front of it, answering `/start` and `/reset` and
//! running every link as its own task.

mod command;
mod dispatcher;
pub mod messages;
mod supervisor;
mod types;

pub use command::BotCommand;
pub use dispatcher::Dispatcher;
pub use supervisor::JobSupervisor;
pub use types::{FileDelivery, Job, JobOutcome, JobStatus};
