use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Every limit is greater than 0
/// - The per-fetch timeout fits inside the batch deadline
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let limits = &config.limits;
    for (name, value) in [
        ("limits.max_batch_size", limits.max_batch_size as u64),
        (
            "limits.max_concurrent_batches",
            limits.max_concurrent_batches as u64,
        ),
        (
            "limits.max_concurrent_fetches",
            limits.max_concurrent_fetches as u64,
        ),
        ("limits.fetch_timeout_ms", limits.fetch_timeout_ms),
        ("limits.batch_timeout_ms", limits.batch_timeout_ms),
        (
            "fetcher.max_response_bytes",
            config.fetcher.max_response_bytes as u64,
        ),
    ] {
        if value == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }

    // A fetch outliving the batch deadline would be cut off by the outer
    // scope instead of reporting its own timeout.
    if limits.fetch_timeout_ms > limits.batch_timeout_ms {
        return Err(ConfigError::ValidationError(format!(
            "limits.fetch_timeout_ms ({}) cannot exceed limits.batch_timeout_ms ({})",
            limits.fetch_timeout_ms, limits.batch_timeout_ms
        )));
    }

    Ok(())
}
