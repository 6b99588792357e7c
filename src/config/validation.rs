use crate::config::types::{
    BrowserConfig, Config, FetchMode, OutputConfig, RetryConfig, ScraperConfig, SiteConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use std::net::SocketAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    if let Some(browser) = &config.browser {
        validate_browser_config(browser)?;
    }
    validate_listen_addr(&config.api.listen_addr)?;
    validate_sites(&config.sites, config.browser.is_some())?;
    Ok(())
}

/// Validates pacing and page limits
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.min_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "min_delay_ms ({}) must not exceed max_delay_ms ({})",
            config.min_delay_ms, config.max_delay_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }
    Ok(())
}

/// Validates the rotated request identities
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.agents.is_empty() {
        return Err(ConfigError::Validation(
            "at least one user agent is required".to_string(),
        ));
    }

    if config.agents.iter().any(|a| a.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "user agents cannot be empty strings".to_string(),
        ));
    }

    if config.accept_languages.iter().any(|l| l.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "accept languages cannot be empty strings".to_string(),
        ));
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

    if config.html_dir.is_empty() {
        return Err(ConfigError::Validation("html_dir cannot be empty".to_string()));
    }

    if config.image_dir.is_empty() {
        return Err(ConfigError::Validation(
            "image_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_browser_config(config: &BrowserConfig) -> Result<(), ConfigError> {
    validate_http_url(&config.webdriver_url, "webdriver-url")
}

fn validate_listen_addr(addr: &str) -> Result<(), ConfigError> {
    addr.parse::<SocketAddr>().map_err(|e| {
        ConfigError::Validation(format!("Invalid listen-addr '{}': {}", addr, e))
    })?;
    Ok(())
}

/// Validates the site list
fn validate_sites(sites: &[SiteConfig], has_browser: bool) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[site]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for site in sites {
        validate_site_name(&site.name)?;

        if !seen.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name '{}'",
                site.name
            )));
        }

        validate_http_url(&site.base_url, &format!("base-url of site '{}'", site.name))?;

        if site.fetch_mode == FetchMode::Browser && !has_browser {
            return Err(ConfigError::Validation(format!(
                "Site '{}' uses fetch-mode = \"browser\" but no [browser] section is configured",
                site.name
            )));
        }

        if site.max_pages == Some(0) {
            return Err(ConfigError::Validation(format!(
                "max-pages of site '{}' must be >= 1",
                site.name
            )));
        }
    }

    Ok(())
}

/// Site names double as progress task names: alphanumeric, hyphens and underscores
fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "site name must contain only alphanumeric characters, hyphens and underscores, got '{}'",
            name
        )));
    }

    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    Ok(())
}
