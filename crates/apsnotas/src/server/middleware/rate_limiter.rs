//! Fixed-window per-client rate limiting for the scrape API.
//!
//! Each scrape launches a full browser, so requests are budgeted per client
//! IP in fixed windows; the first request of a new window resets the count.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::warn;

use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Window length and per-client budget.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(60),
            max_requests: 6,
        }
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client IP in fixed windows.
pub struct RateLimiter {
    windows: DashMap<IpAddr, Window>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Registers one request. False means the client is over budget for the
    /// current window.
    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut window = self.windows.entry(client).or_insert_with(|| Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }
        if window.count >= self.config.max_requests {
            return false;
        }
        window.count += 1;
        true
    }
}

/// Axum middleware guarding the `/api` routes.
pub async fn enforce_rate_limit(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        warn!(client = %addr.ip(), "rate limit exceeded");
        return ApiErrorType::from((
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests; wait a minute and retry",
            None,
        ))
        .into_response();
    }
    next.run(request).await
}
