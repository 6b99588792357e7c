use crate::sites::SiteKind;
use serde::Deserialize;

/// Main configuration structure for rx-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub browser: Option<BrowserConfig>,
    pub output: OutputConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteConfig>,
}

impl Config {
    /// Looks up a site by its configured name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }

    /// The site used when a job is started without naming one
    pub fn default_site(&self) -> Option<&SiteConfig> {
        self.sites.first()
    }
}

/// Scrape pacing and limits
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Maximum number of listing pages walked per site
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Lower bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "min-delay-ms")]
    pub min_delay_ms: u64,

    /// Upper bound of the randomized delay before each request (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,

    /// Per-request timeout
    #[serde(rename = "request-timeout-secs", default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Bounded retry policy applied at the fetcher boundary
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles on every further attempt
    #[serde(rename = "base-delay-ms")]
    pub base_delay_ms: u64,

    /// Random extra delay added to each backoff
    #[serde(rename = "jitter-ms", default)]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2000,
            jitter_ms: 500,
        }
    }
}

/// Identities rotated across requests
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// User-Agent strings, one is picked at random for every request
    pub agents: Vec<String>,

    /// Accept-Language values rotated alongside the user agent
    #[serde(rename = "accept-languages", default = "default_accept_languages")]
    pub accept_languages: Vec<String>,
}

fn default_accept_languages() -> Vec<String> {
    vec![
        "en-US,en;q=0.9".to_string(),
        "en-GB,en;q=0.8".to_string(),
        "bn-BD,bn;q=0.9,en;q=0.8".to_string(),
    ]
}

/// External WebDriver process used for script-heavy pages
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Base URL of the driver, e.g. `http://localhost:9515` for chromedriver
    #[serde(rename = "webdriver-url")]
    pub webdriver_url: String,

    #[serde(default = "default_true")]
    pub headless: bool,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Root directory for saved raw HTML
    #[serde(rename = "html-dir")]
    pub html_dir: String,

    /// Root directory for downloaded images
    #[serde(rename = "image-dir")]
    pub image_dir: String,

    #[serde(rename = "save-html", default = "default_true")]
    pub save_html: bool,

    #[serde(rename = "download-images", default = "default_true")]
    pub download_images: bool,
}

/// Control API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "listen-addr")]
    pub listen_addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

/// How item and listing pages are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP GET
    #[default]
    Http,
    /// Rendered through the configured WebDriver
    Browser,
}

/// A target site
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Unique name, also used as the progress task name
    pub name: String,

    /// Which extractor profile applies
    pub kind: SiteKind,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "fetch-mode", default)]
    pub fetch_mode: FetchMode,

    /// Overrides `scraper.max-pages` for this site
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,
}

fn default_true() -> bool {
    true
}
