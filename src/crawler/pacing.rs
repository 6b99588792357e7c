//! Randomized request pacing and identity rotation

use crate::config::{ScraperConfig, UserAgentConfig};
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Duration;

/// Headers that vary from request to request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestIdentity {
    pub user_agent: String,
    pub accept_language: String,
}

/// Spaces requests out and picks the identity for each one
#[derive(Debug, Clone)]
pub struct RequestPacer {
    min_delay: Duration,
    max_delay: Duration,
    agents: Vec<String>,
    languages: Vec<String>,
}

impl RequestPacer {
    pub fn new(scraper: &ScraperConfig, user_agent: &UserAgentConfig) -> Self {
        Self {
            min_delay: Duration::from_millis(scraper.min_delay_ms),
            max_delay: Duration::from_millis(scraper.max_delay_ms.max(scraper.min_delay_ms)),
            agents: user_agent.agents.clone(),
            languages: user_agent.accept_languages.clone(),
        }
    }

    /// Picks a delay uniformly from the configured range
    pub fn next_delay(&self) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        if max <= min {
            return self.min_delay;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }

    /// Picks a user agent and accept-language at random
    pub fn next_identity(&self) -> RequestIdentity {
        let mut rng = rand::thread_rng();
        RequestIdentity {
            user_agent: self
                .agents
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| concat!("rx-harvest/", env!("CARGO_PKG_VERSION")).to_string()),
            accept_language: self
                .languages
                .choose(&mut rng)
                .cloned()
                .unwrap_or_else(|| "en-US,en;q=0.9".to_string()),
        }
    }

    /// Waits a random delay before the next request
    pub async fn pause(&self) {
        let delay = self.next_delay();
        if !delay.is_zero() {
            tracing::debug!("Waiting {:?} before next request", delay);
            tokio::time::sleep(delay).await;
        }
    }
}
