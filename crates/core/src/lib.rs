pub mod channel;
pub mod config;
pub mod driver;
pub mod job;
pub mod link;
pub mod quota;
pub mod testing;
pub mod workspace;

pub use channel::{ChannelError, ChatId, IncomingMessage, MessageId, Messenger, OutgoingFile, RequesterId};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, SanitizedConfig,
};
pub use driver::{DriverConfig, DriverError, PromptDriver, TokioLauncher};
pub use job::{Dispatcher, JobOutcome, JobSupervisor};
pub use link::{LinkValidator, LinkVerdict};
pub use quota::QuotaTracker;
pub use workspace::{WorkspaceError, WorkspaceManager};
