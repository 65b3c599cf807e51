use super::{types::Config, ConfigError};
use crate::driver::DetectionStrategy;

/// Validate configuration
/// Currently validates:
/// - Telegram token is present
/// - Quota ceiling is at least 1
/// - Driver program is set, timeout and poll interval are non-zero
/// - Signature detection has a signature for every prompt
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.telegram.token.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "telegram.token cannot be empty".to_string(),
        ));
    }

    if config.quota.max_concurrent_jobs == 0 {
        return Err(ConfigError::ValidationError(
            "quota.max_concurrent_jobs must be at least 1".to_string(),
        ));
    }

    let driver = &config.driver;
    if driver.program.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "driver.program cannot be empty".to_string(),
        ));
    }
    if driver.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "driver.timeout_secs cannot be 0".to_string(),
        ));
    }
    if driver.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "driver.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if driver.detection == DetectionStrategy::Signature {
        if let Some(stage) = driver.signatures.first_empty() {
            return Err(ConfigError::ValidationError(format!(
                "driver.signatures.{} cannot be empty with signature detection",
                stage
            )));
        }
    }

    Ok(())
}
