use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Environment variable prefix for overrides (`SCOREBOT_TELEGRAM__TOKEN`, ...)
const ENV_PREFIX: &str = "SCOREBOT_";

/// Legacy variable holding the bot token.
const LEGACY_TOKEN_VAR: &str = "BOT_TOKEN";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    extract(Figment::new().merge(Toml::file(path)))
}

/// Load configuration from environment variables only
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    extract(Figment::new())
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn extract(figment: Figment) -> Result<Config, ConfigError> {
    figment
        .merge(
            Env::raw()
                .only(&[LEGACY_TOKEN_VAR])
                .map(|_| "telegram.token".into()),
        )
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[telegram]
token = "123:abc"

[quota]
max_concurrent_jobs = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.quota.max_concurrent_jobs, 2);
    }

    #[test]
    fn test_load_config_from_str_missing_telegram() {
        let toml = r#"
[workspace]
root = "/tmp/scores"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[telegram]
token = "123:abc"

[workspace]
root = "/tmp/scorebot-test"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.telegram.token, "123:abc");
        assert_eq!(
            config.workspace.root.to_str().unwrap(),
            "/tmp/scorebot-test"
        );
    }

    #[test]
    fn test_example_config_parses() {
        let config =
            load_config_from_str(include_str!("../../../../config.example.toml")).unwrap();
        crate::config::validate_config(&config).unwrap();
        assert_eq!(config.driver.timeout_secs, 300);
        assert_eq!(config.driver.input.confirm, "\r");
    }
}
