//! Page fetcher
//!
//! This module handles every outbound request the scraper makes:
//! - Building the HTTP client with timeouts and compression
//! - Randomized pacing and rotated identity headers before each request
//! - Classifying failures as not-found, blocked, or transient
//! - Bounded retry of blocked and transient failures
//! - Rendering through a WebDriver session for `fetch-mode = "browser"` sites

use crate::config::{Config, FetchMode, ScraperConfig};
use crate::crawler::browser::WebDriverClient;
use crate::crawler::pacing::{RequestIdentity, RequestPacer};
use crate::crawler::retry::RetryPolicy;
use crate::sites::parser::looks_blocked;
use crate::{ConfigError, HarvestError};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use thiserror::Error;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Ways a fetch can fail
#[derive(Debug, Error)]
pub enum FetchError {
    /// The page does not exist; never retried
    #[error("not found: {url}")]
    NotFound { url: String },

    /// The site refused us: 403, 429 or 503, or a challenge page served in
    /// place of content (`status` is None then)
    #[error("blocked ({}): {url}", .status.map_or_else(|| "challenge page".to_string(), |s| format!("HTTP {}", s)))]
    Blocked { url: String, status: Option<u16> },

    /// Any other 4xx; permanent for this URL
    #[error("rejected with HTTP {status}: {url}")]
    Rejected { url: String, status: u16 },

    /// Network failure, timeout, or 5xx
    #[error("transient failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// The WebDriver session failed
    #[error("browser failure for {url}: {message}")]
    Browser { url: String, message: String },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::Transient { .. } | Self::Browser { .. }
        )
    }

    /// Classifies an HTTP status; None for success
    pub fn from_status(url: &str, status: u16) -> Option<Self> {
        let url = url.to_string();
        match status {
            200..=399 => None,
            404 | 410 => Some(Self::NotFound { url }),
            403 | 429 | 503 => Some(Self::Blocked {
                url,
                status: Some(status),
            }),
            500..=599 => Some(Self::Transient {
                url,
                message: format!("HTTP {}", status),
            }),
            _ => Some(Self::Rejected { url, status }),
        }
    }

    pub(crate) fn challenged(url: &str) -> Self {
        Self::Blocked {
            url: url.to_string(),
            status: None,
        }
    }

    pub(crate) fn transient(url: &str, err: impl std::fmt::Display) -> Self {
        Self::Transient {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Builds the HTTP client shared by page and image requests
///
/// Identity headers are set per request, not on the client.
pub fn build_http_client(config: &ScraperConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches pages for one site through its configured backend
pub struct PageFetcher {
    client: Client,
    browser: Option<WebDriverClient>,
    pacer: RequestPacer,
    retry: RetryPolicy,
}

impl PageFetcher {
    /// Creates a fetcher for a site
    ///
    /// # Arguments
    ///
    /// * `config` - Full configuration (pacing, retry, identities, browser)
    /// * `mode` - The site's fetch mode
    ///
    /// # Returns
    ///
    /// * `Ok(PageFetcher)` - Ready to fetch
    /// * `Err(HarvestError)` - The client could not be built, or browser mode
    ///   was requested without a `[browser]` section
    pub fn new(config: &Config, mode: FetchMode) -> Result<Self, HarvestError> {
        let client = build_http_client(&config.scraper)?;

        let browser = match mode {
            FetchMode::Http => None,
            FetchMode::Browser => {
                let browser_config = config.browser.as_ref().ok_or_else(|| {
                    ConfigError::Validation(
                        "fetch-mode = \"browser\" requires a [browser] section".to_string(),
                    )
                })?;
                Some(WebDriverClient::new(browser_config, client.clone()))
            }
        };

        Ok(Self {
            client,
            browser,
            pacer: RequestPacer::new(&config.scraper, &config.user_agent),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }

    pub fn mode(&self) -> FetchMode {
        if self.browser.is_some() {
            FetchMode::Browser
        } else {
            FetchMode::Http
        }
    }

    /// Fetches a page's markup, retrying blocked and transient failures
    ///
    /// A block or bot-challenge page is a `Blocked` failure even when it came
    /// with a 200 status or through the browser, which has no status at all.
    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.retry
            .run(url, move |attempt| async move {
                self.pacer.pause().await;
                let identity = self.pacer.next_identity();
                tracing::debug!("Fetching {} (attempt {})", url, attempt);

                let html = match &self.browser {
                    Some(browser) => browser.page_source(url, &identity).await?,
                    None => self.http_text(url, &identity).await?,
                };

                if is_block_page(&html) {
                    tracing::warn!("Block page served for {} (attempt {})", url, attempt);
                    return Err(FetchError::challenged(url));
                }
                Ok(html)
            })
            .await
    }

    /// Downloads raw bytes (images) over plain HTTP
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.retry
            .run(url, move |_| async move {
                self.pacer.pause().await;
                let identity = self.pacer.next_identity();
                let response = self
                    .client
                    .get(url)
                    .header(USER_AGENT, identity.user_agent.as_str())
                    .header(ACCEPT_LANGUAGE, identity.accept_language.as_str())
                    .send()
                    .await
                    .map_err(|e| FetchError::transient(url, e))?;

                if let Some(err) = FetchError::from_status(url, response.status().as_u16()) {
                    return Err(err);
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::transient(url, e))?;
                Ok(bytes.to_vec())
            })
            .await
    }

    async fn http_text(&self, url: &str, identity: &RequestIdentity) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, identity.user_agent.as_str())
            .header(ACCEPT_LANGUAGE, identity.accept_language.as_str())
            .header(ACCEPT, ACCEPT_HTML)
            .send()
            .await
            .map_err(|e| FetchError::transient(url, e))?;

        if let Some(err) = FetchError::from_status(url, response.status().as_u16()) {
            return Err(err);
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::transient(url, e))
    }
}

fn is_block_page(html: &str) -> bool {
    looks_blocked(&Html::parse_document(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_status_classification() {
        let url = "https://medex.com.bd/brands/1/a";
        assert!(FetchError::from_status(url, 200).is_none());
        assert!(matches!(
            FetchError::from_status(url, 404),
            Some(FetchError::NotFound { .. })
        ));
        assert!(matches!(
            FetchError::from_status(url, 429),
            Some(FetchError::Blocked {
                status: Some(429),
                ..
            })
        ));
        assert!(matches!(
            FetchError::from_status(url, 502),
            Some(FetchError::Transient { .. })
        ));
        assert!(matches!(
            FetchError::from_status(url, 401),
            Some(FetchError::Rejected { .. })
        ));
    }

    #[test]
    fn test_retryable() {
        let url = "u".to_string();
        assert!(!FetchError::NotFound { url: url.clone() }.is_retryable());
        assert!(!FetchError::Rejected {
            url: url.clone(),
            status: 400
        }
        .is_retryable());
        assert!(FetchError::Blocked {
            url: url.clone(),
            status: Some(403)
        }
        .is_retryable());
        assert!(FetchError::Browser {
            url,
            message: "session".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_browser_mode_requires_browser_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config("http://127.0.0.1:1", dir.path());
        config.browser = None;
        assert!(PageFetcher::new(&config, FetchMode::Browser).is_err());
        assert_eq!(
            PageFetcher::new(&config, FetchMode::Http).unwrap().mode(),
            FetchMode::Http
        );
    }

    #[tokio::test]
    async fn test_fetch_page_sends_identity_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brands"))
            .and(header_exists("user-agent"))
            .and(header_exists("accept-language"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let fetcher = PageFetcher::new(&config, FetchMode::Http).unwrap();

        let body = fetcher
            .fetch_page(&format!("{}/brands", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_not_found_is_fetched_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brands/1/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let fetcher = PageFetcher::new(&config, FetchMode::Http).unwrap();

        let result = fetcher
            .fetch_page(&format!("{}/brands/1/gone", server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brands"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let fetcher = PageFetcher::new(&config, FetchMode::Http).unwrap();

        let result = fetcher.fetch_page(&format!("{}/brands", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::Blocked {
                status: Some(503),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_block_page_with_ok_status_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/brands"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "<html><head><title>Attention Required! | Cloudflare</title></head>\
                 <body><h1>Sorry, you have been blocked</h1></body></html>",
            ))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let fetcher = PageFetcher::new(&config, FetchMode::Http).unwrap();

        let result = fetcher.fetch_page(&format!("{}/brands", server.uri())).await;
        assert!(matches!(
            result,
            Err(FetchError::Blocked { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_fetch_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/storage/images/packaging/a.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xd8, 0xff]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&server.uri(), dir.path());
        let fetcher = PageFetcher::new(&config, FetchMode::Http).unwrap();

        let bytes = fetcher
            .fetch_bytes(&format!("{}/storage/images/packaging/a.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xff, 0xd8, 0xff]);
    }
}
