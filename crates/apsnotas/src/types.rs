//! Process-wide configuration and shared request state.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::boletim::browser::BrowserLaunchConfig;
use crate::boletim::types::ScrapeConfig;
use crate::server::middleware::rate_limiter::{RateLimitConfig, RateLimiter};

/// Everything configurable through the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the API listens on.
    pub port: u16,
    pub browser: BrowserLaunchConfig,
    pub scrape: ScrapeConfig,
    pub rate: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            browser: BrowserLaunchConfig::default(),
            scrape: ScrapeConfig::default(),
            rate: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the environment, keeping the default for anything unset or
    /// unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(port) = env_parse("PORT") {
            config.port = port;
        }
        if let Ok(url) = std::env::var("APSNOTAS_LOGIN_URL") {
            if !url.is_empty() {
                config.scrape.login_url = url;
            }
        }
        if let Some(headless) = env_parse("APSNOTAS_HEADLESS") {
            config.browser.headless = headless;
        }
        if let Ok(path) = std::env::var("APSNOTAS_CHROME") {
            if !path.is_empty() {
                config.browser.executable = Some(path);
            }
        }
        if let Some(secs) = env_parse("APSNOTAS_GOTO_TIMEOUT_SECS") {
            config.scrape.goto_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_parse("APSNOTAS_RATE_WINDOW_SECS") {
            config.rate.window = Duration::from_secs(secs);
        }
        if let Some(max) = env_parse("APSNOTAS_RATE_MAX_REQUESTS") {
            config.rate.max_requests = max;
        }
        config
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring unparseable {key}={raw}");
            None
        }
    }
}

/// Shared state handed to every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let rate_limiter = RateLimiter::new(config.rate.clone());
        Self {
            config,
            rate_limiter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.port, 3000);
        assert!(config.browser.headless);
        assert_eq!(config.browser.executable, None);
        assert_eq!(config.scrape.goto_timeout, Duration::from_secs(45));
        assert_eq!(config.scrape.submit_nav_timeout, Duration::from_secs(15));
        assert_eq!(config.scrape.link_nav_timeout, Duration::from_secs(12));
        assert_eq!(config.rate.window, Duration::from_secs(60));
        assert_eq!(config.rate.max_requests, 6);
    }
}
