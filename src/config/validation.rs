use crate::config::types::{
    Config, CrawlerConfig, FetchEngine, FetcherConfig, OutputConfig, RegionEntry, SelectorConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    validate_selectors(&config.selectors)?;
    validate_regions(&config.regions)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 16 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 16, got {}",
            config.workers
        )));
    }

    for (name, value) in [
        ("page-load-timeout-ms", config.page_load_timeout_ms),
        ("reveal-timeout-ms", config.reveal_timeout_ms),
        ("settle-timeout-ms", config.settle_timeout_ms),
        ("flush-initial-backoff-ms", config.flush_initial_backoff_ms),
        ("flush-max-elapsed-ms", config.flush_max_elapsed_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!(
                "{} must be greater than 0",
                name
            )));
        }
    }

    if config.poll_interval_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "poll-interval-ms must be >= 10ms, got {}ms",
            config.poll_interval_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates fetcher configuration against the compiled features
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.engine == FetchEngine::Browser && !cfg!(feature = "browser") {
        return Err(ConfigError::Validation(
            "engine = \"browser\" requires building with the `browser` feature".to_string(),
        ));
    }

    if let Some(path) = &config.chrome_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "chrome-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that every selector is non-empty CSS
fn validate_selectors(selectors: &SelectorConfig) -> Result<(), ConfigError> {
    for (key, selector) in selectors.entries() {
        if selector.trim().is_empty() {
            return Err(ConfigError::InvalidSelector(format!(
                "selector '{}' cannot be empty",
                key
            )));
        }

        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("selector '{}' ({}): {:?}", key, selector, e))
        })?;
    }

    Ok(())
}

/// Validates region entries
fn validate_regions(regions: &[RegionEntry]) -> Result<(), ConfigError> {
    if regions.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[region]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for region in regions {
        if region.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "region name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(region.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "region '{}' is configured more than once",
                region.name
            )));
        }

        let url = Url::parse(&region.entry_url).map_err(|e| {
            ConfigError::InvalidUrl(format!(
                "Invalid entry URL '{}' for region '{}': {}",
                region.entry_url, region.name, e
            ))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "Entry URL '{}' must use http or https",
                region.entry_url
            )));
        }
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
