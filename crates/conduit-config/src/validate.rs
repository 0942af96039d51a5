//! Validation rules applied to a fully merged [`crate::types::Config`].

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Reject a configuration with an out-of-range or nonsensical value.
///
/// # Errors
///
/// Returns a [`ConfigError::ValidationError`] naming the first offending field.
pub fn validate(config: &Config) -> ConfigResult<()> {
    if config.runtime.max_tool_rounds == 0 {
        return Err(ConfigError::ValidationError {
            field: "runtime.max_tool_rounds".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.runtime.tool_concurrency == 0 {
        return Err(ConfigError::ValidationError {
            field: "runtime.tool_concurrency".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.http.pool_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "http.pool_size".to_string(),
            message: "must be at least 1".to_string(),
        });
    }
    if config.timeouts.request_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "timeouts.request_secs".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    if config.timeouts.stream_idle_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "timeouts.stream_idle_secs".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }
    let valid_formats = ["pretty", "json", "compact"];
    if !valid_formats.contains(&config.log.format.as_str()) {
        return Err(ConfigError::ValidationError {
            field: "log.format".to_string(),
            message: format!("must be one of {valid_formats:?}, got {:?}", config.log.format),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn zero_max_tool_rounds_is_rejected() {
        let mut config = Config::default();
        config.runtime.max_tool_rounds = 0;
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { field, .. } if field == "runtime.max_tool_rounds"));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut config = Config::default();
        config.log.format = "xml".to_string();
        assert!(validate(&config).is_err());
    }
}
