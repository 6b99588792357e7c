//! Configuration module for rx-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use rx_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Walking at most {} listing pages", config.scraper.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, BrowserConfig, Config, FetchMode, OutputConfig, RetryConfig, ScraperConfig,
    SiteConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

/// Configuration pointing every site and the WebDriver at `base_url`, with no
/// pacing delays and instant retries
#[cfg(test)]
pub(crate) fn test_config(base_url: &str, dir: &std::path::Path) -> Config {
    use crate::sites::SiteKind;

    Config {
        scraper: ScraperConfig {
            max_pages: 10,
            min_delay_ms: 0,
            max_delay_ms: 0,
            request_timeout_secs: 5,
        },
        retry: RetryConfig {
            max_attempts: 3,
            base_delay_ms: 0,
            jitter_ms: 0,
        },
        user_agent: UserAgentConfig {
            agents: vec!["rx-harvest-test/1.0".to_string()],
            accept_languages: vec!["en-US,en;q=0.9".to_string()],
        },
        browser: Some(BrowserConfig {
            webdriver_url: base_url.to_string(),
            headless: true,
        }),
        output: OutputConfig {
            database_path: dir.join("rx-harvest.db").to_string_lossy().to_string(),
            html_dir: dir.join("html").to_string_lossy().to_string(),
            image_dir: dir.join("images").to_string_lossy().to_string(),
            save_html: true,
            download_images: true,
        },
        api: ApiConfig::default(),
        sites: vec![SiteConfig {
            name: "medex".to_string(),
            kind: SiteKind::Medex,
            base_url: base_url.to_string(),
            fetch_mode: FetchMode::Http,
            max_pages: None,
        }],
    }
}
