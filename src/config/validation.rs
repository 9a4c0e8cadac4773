use crate::config::types::{
    BreakerConfig, Config, CrawlerConfig, OutputConfig, RefinementConfig, RendererConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use url::Url;

/// Upper bound on the worker pool size
const MAX_CONCURRENT_FETCHES: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_breaker_config(&config.breaker)?;
    validate_renderer_config(&config.renderer)?;
    if let Some(refinement) = &config.refinement {
        validate_refinement_config(refinement)?;
    }
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth of 0 is allowed and crawls nothing

    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > MAX_CONCURRENT_FETCHES
    {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and {}, got {}",
            MAX_CONCURRENT_FETCHES, config.max_concurrent_fetches
        )));
    }

    if config.per_request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "per_request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.connect_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.politeness_delay_min_ms > config.politeness_delay_max_ms {
        return Err(ConfigError::Validation(format!(
            "politeness delay range is inverted: {}ms > {}ms",
            config.politeness_delay_min_ms, config.politeness_delay_max_ms
        )));
    }

    if config.backoff_base_ms > config.backoff_max_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_base_ms ({}) must not exceed backoff_max_ms ({})",
            config.backoff_base_ms, config.backoff_max_ms
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.pool.is_empty() {
        return Err(ConfigError::Validation(
            "user agent pool cannot be empty".to_string(),
        ));
    }

    if config.pool.iter().any(|ua| ua.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user agent pool contains an empty entry".to_string(),
        ));
    }

    if let Some(referer) = &config.referer {
        Url::parse(referer)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid referer: {}", e)))?;
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.json_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "json_path cannot be empty".to_string(),
        ));
    }

    if config.tabular_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "tabular_path cannot be empty".to_string(),
        ));
    }

    if config.json_path == config.tabular_path {
        return Err(ConfigError::Validation(
            "json_path and tabular_path must differ".to_string(),
        ));
    }

    Ok(())
}

/// Validates the failure-rate breaker
fn validate_breaker_config(config: &BreakerConfig) -> Result<(), ConfigError> {
    if config.window == 0 {
        return Err(ConfigError::Validation(
            "breaker window must be >= 1".to_string(),
        ));
    }

    if config.min_samples > config.window {
        return Err(ConfigError::Validation(format!(
            "breaker min_samples ({}) cannot exceed window ({})",
            config.min_samples, config.window
        )));
    }

    if !(config.max_failure_rate > 0.0 && config.max_failure_rate <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "max_failure_rate must be in (0, 1], got {}",
            config.max_failure_rate
        )));
    }

    Ok(())
}

/// Validates renderer configuration
fn validate_renderer_config(config: &RendererConfig) -> Result<(), ConfigError> {
    if config.command.trim().is_empty() {
        return Err(ConfigError::Validation(
            "renderer command cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "renderer timeout_secs must be > 0".to_string(),
        ));
    }

    if !(0.0..=1.0).contains(&config.min_text_ratio) {
        return Err(ConfigError::Validation(format!(
            "min_text_ratio must be in [0, 1], got {}",
            config.min_text_ratio
        )));
    }

    Ok(())
}

/// Validates keyword refinement configuration
fn validate_refinement_config(config: &RefinementConfig) -> Result<(), ConfigError> {
    if config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "refinement api_key cannot be empty".to_string(),
        ));
    }

    if config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "refinement model cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid refinement endpoint: {}", e)))?;

    Ok(())
}
