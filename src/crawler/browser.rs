//! Minimal W3C WebDriver client
//!
//! Drives an external driver process (chromedriver or a Selenium node) for
//! sites whose listings only render with JavaScript. One session is opened per
//! page: new session, navigate, read source, delete session.

use crate::config::BrowserConfig;
use crate::crawler::pacing::RequestIdentity;
use crate::crawler::FetchError;
use reqwest::{Client, Method};
use serde_json::{json, Value};

pub struct WebDriverClient {
    http: Client,
    endpoint: String,
    headless: bool,
}

impl WebDriverClient {
    pub fn new(config: &BrowserConfig, http: Client) -> Self {
        Self {
            http,
            endpoint: config.webdriver_url.trim_end_matches('/').to_string(),
            headless: config.headless,
        }
    }

    /// Renders `url` in a fresh browser session and returns the page source
    ///
    /// The session is deleted even when navigation fails.
    pub async fn page_source(
        &self,
        url: &str,
        identity: &RequestIdentity,
    ) -> Result<String, FetchError> {
        let session_id = self.new_session(url, identity).await?;
        let result = self.navigate_and_read(&session_id, url).await;

        if let Err(e) = self
            .command(Method::DELETE, &format!("session/{}", session_id), None, url)
            .await
        {
            tracing::warn!("Failed to close WebDriver session {}: {}", session_id, e);
        }

        result
    }

    fn capabilities(&self, identity: &RequestIdentity) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--window-size=1920,1080".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--user-agent={}", identity.user_agent),
        ];
        if let Some(lang) = identity.accept_language.split(',').next() {
            args.push(format!("--lang={}", lang.trim()));
        }
        if self.headless {
            args.push("--headless=new".to_string());
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": {
                        "args": args,
                        "excludeSwitches": ["enable-automation"],
                        "useAutomationExtension": false
                    }
                }
            }
        })
    }

    async fn new_session(&self, url: &str, identity: &RequestIdentity) -> Result<String, FetchError> {
        let value = self
            .command(Method::POST, "session", Some(self.capabilities(identity)), url)
            .await?;

        value
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| FetchError::Browser {
                url: url.to_string(),
                message: "driver returned no session id".to_string(),
            })
    }

    async fn navigate_and_read(&self, session_id: &str, url: &str) -> Result<String, FetchError> {
        self.command(
            Method::POST,
            &format!("session/{}/url", session_id),
            Some(json!({ "url": url })),
            url,
        )
        .await?;

        let source = self
            .command(Method::GET, &format!("session/{}/source", session_id), None, url)
            .await?;

        source
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| FetchError::Browser {
                url: url.to_string(),
                message: "page source was not a string".to_string(),
            })
    }

    /// Sends one WebDriver command and unwraps the `value` member of the reply
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        url: &str,
    ) -> Result<Value, FetchError> {
        let endpoint = format!("{}/{}", self.endpoint, path);
        let mut request = self.http.request(method, &endpoint);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let browser_error = |message: String| FetchError::Browser {
            url: url.to_string(),
            message,
        };

        let response = request
            .send()
            .await
            .map_err(|e| browser_error(format!("driver unreachable: {}", e)))?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| browser_error(format!("invalid driver reply: {}", e)))?;

        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if !status.is_success() {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let message = value.get("message").and_then(Value::as_str).unwrap_or("");
            return Err(browser_error(format!("{} ({}): {}", error, status.as_u16(), message)));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn identity() -> RequestIdentity {
        RequestIdentity {
            user_agent: "TestAgent/1.0".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
        }
    }

    fn client(server: &MockServer) -> WebDriverClient {
        WebDriverClient::new(
            &BrowserConfig {
                webdriver_url: format!("{}/", server.uri()),
                headless: true,
            },
            Client::new(),
        )
    }

    async fn mount_session(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/session"))
            .and(body_partial_json(json!({
                "capabilities": {"alwaysMatch": {"browserName": "chrome"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": {"sessionId": "abc123", "capabilities": {}}
            })))
            .expect(1)
            .mount(server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/session/abc123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
            .expect(1)
            .mount(server)
            .await;
    }

    #[test]
    fn test_capabilities_carry_identity_and_stealth_args() {
        let driver = WebDriverClient::new(
            &BrowserConfig {
                webdriver_url: "http://localhost:9515".to_string(),
                headless: true,
            },
            Client::new(),
        );
        let caps = driver.capabilities(&identity());
        let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"]
            .as_array()
            .unwrap();

        assert!(args.contains(&json!("--user-agent=TestAgent/1.0")));
        assert!(args.contains(&json!("--disable-blink-features=AutomationControlled")));
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--lang=en-US")));
    }

    #[tokio::test]
    async fn test_page_source_session_lifecycle() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("POST"))
            .and(path("/session/abc123/url"))
            .and(body_partial_json(json!({"url": "https://medex.com.bd/brands"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": null})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/session/abc123/source"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"value": "<html><body>rendered</body></html>"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let source = client(&server)
            .page_source("https://medex.com.bd/brands", &identity())
            .await
            .unwrap();
        assert_eq!(source, "<html><body>rendered</body></html>");
    }

    #[tokio::test]
    async fn test_navigation_failure_still_closes_session() {
        let server = MockServer::start().await;
        mount_session(&server).await;

        Mock::given(method("POST"))
            .and(path("/session/abc123/url"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "value": {"error": "unknown error", "message": "net::ERR_NAME_NOT_RESOLVED"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .page_source("https://medex.com.bd/brands", &identity())
            .await
            .unwrap_err();

        match err {
            FetchError::Browser { message, .. } => {
                assert!(message.contains("ERR_NAME_NOT_RESOLVED"))
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_driver_is_retryable() {
        let driver = WebDriverClient::new(
            &BrowserConfig {
                webdriver_url: "http://127.0.0.1:1".to_string(),
                headless: true,
            },
            Client::new(),
        );
        let err = driver
            .page_source("https://medex.com.bd/brands", &identity())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
