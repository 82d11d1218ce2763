use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Checks value ranges serde cannot express: non-zero port, a usable zstd
/// level, a non-zero lock timeout and a sane write-back policy.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if !(1..=22).contains(&config.cache.compression_level) {
        return Err(ConfigError::ValidationError(format!(
            "cache.compression_level must be between 1 and 22, got {}",
            config.cache.compression_level
        )));
    }

    if config.cache.lock_timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "cache.lock_timeout_ms cannot be 0".to_string(),
        ));
    }

    let write_back = &config.write_back;
    if write_back.buffer_size == 0 {
        return Err(ConfigError::ValidationError(
            "write_back.buffer_size cannot be 0".to_string(),
        ));
    }
    if write_back.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "write_back.max_attempts cannot be 0".to_string(),
        ));
    }
    if write_back.backoff_multiplier < 1.0 {
        return Err(ConfigError::ValidationError(
            "write_back.backoff_multiplier must be at least 1.0".to_string(),
        ));
    }
    if write_back.max_backoff_ms < write_back.initial_backoff_ms {
        return Err(ConfigError::ValidationError(
            "write_back.max_backoff_ms must not be below initial_backoff_ms".to_string(),
        ));
    }

    Ok(())
}
