use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::driver::DriverConfig;
use crate::link::LinkPolicyConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub links: LinkPolicyConfig,
    #[serde(default)]
    pub driver: DriverConfig,
}

/// Telegram Bot API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather.
    pub token: String,
    /// API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout for getUpdates in seconds (default: 30)
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u32,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u32 {
    30
}

/// Workspace configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Directory holding one subdirectory per running job.
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("downloads")
}

/// Per-requester concurrency limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Maximum simultaneous jobs per requester (default: 3)
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
        }
    }
}

fn default_max_concurrent_jobs() -> u32 {
    3
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub telegram: SanitizedTelegramConfig,
    pub workspace: WorkspaceConfig,
    pub quota: QuotaConfig,
    pub links: LinkPolicyConfig,
    pub driver: DriverConfig,
}

/// Sanitized Telegram config (token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub api_base: String,
    pub token_configured: bool,
    pub poll_timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            telegram: SanitizedTelegramConfig {
                api_base: config.telegram.api_base.clone(),
                token_configured: !config.telegram.token.is_empty(),
                poll_timeout_secs: config.telegram.poll_timeout_secs,
            },
            workspace: config.workspace.clone(),
            quota: config.quota.clone(),
            links: config.links.clone(),
            driver: config.driver.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DetectionStrategy;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[telegram]
token = "123:abc"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.workspace.root, PathBuf::from("downloads"));
        assert_eq!(config.quota.max_concurrent_jobs, 3);
        assert_eq!(config.links.restricted_segments, vec!["official_scores"]);
        assert_eq!(config.driver.detection, DetectionStrategy::Quiescence);
    }

    #[test]
    fn test_deserialize_missing_telegram_fails() {
        let toml = r#"
[quota]
max_concurrent_jobs = 5
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[telegram]
token = "123:abc"
api_base = "http://localhost:8081"
poll_timeout_secs = 10

[workspace]
root = "/var/lib/scorebot"

[quota]
max_concurrent_jobs = 1

[links]
restricted_segments = ["official_scores", "official_author"]

[driver]
program = "dl-librescore"
args = []
detection = "signature"
poll_interval_ms = 250
timeout_secs = 60
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.telegram.api_base, "http://localhost:8081");
        assert_eq!(config.workspace.root, PathBuf::from("/var/lib/scorebot"));
        assert_eq!(config.quota.max_concurrent_jobs, 1);
        assert_eq!(config.links.restricted_segments.len(), 2);
        assert_eq!(config.driver.program, "dl-librescore");
        assert!(config.driver.args.is_empty());
        assert_eq!(config.driver.detection, DetectionStrategy::Signature);
        assert_eq!(config.driver.poll_interval_ms, 250);
        assert_eq!(config.driver.timeout_secs, 60);
    }

    #[test]
    fn test_sanitized_config_hides_token() {
        let config: Config = toml::from_str(
            r#"
[telegram]
token = "123:secret"
"#,
        )
        .unwrap();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.telegram.token_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
    }
}
