//! HTTP server: routing and middleware assembly.

pub mod endpoints;
pub mod middleware;
pub mod types;

use std::sync::Arc;

use axum::middleware as axum_mw;
use axum::routing::{get, post};
use axum::Router;

use crate::server::middleware::rate_limiter;
use crate::types::AppState;

/// Builds the full router: a health probe outside the rate limit and the
/// scrape API behind it.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .route(
            "/login-and-scrape",
            post(endpoints::boletim::post_login_and_scrape),
        )
        .layer(axum_mw::from_fn_with_state(
            app_state.clone(),
            rate_limiter::enforce_rate_limit,
        ));

    Router::new()
        .route("/health", get(endpoints::status::get_health))
        .nest("/api", api_router)
        .with_state(app_state)
}
