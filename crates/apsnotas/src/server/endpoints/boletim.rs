//! HTTP endpoint for the login-and-scrape operation.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::boletim;
use crate::boletim::browser::BrowserError;
use crate::boletim::error::ScrapeError;
use crate::boletim::types::{Credentials, TargetParameters};
use crate::server::types::ApiErrorType;
use crate::types::AppState;

/// Body of POST /api/login-and-scrape.
///
/// No Debug impl on purpose: the payload carries the password and must not
/// be loggable wholesale.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginScrapeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_target_average")]
    pub target_average: f64,
    #[serde(default = "default_passing_grade")]
    pub passing_grade: f64,
}

fn default_target_average() -> f64 {
    TargetParameters::default().target_average
}

fn default_passing_grade() -> f64 {
    TargetParameters::default().passing_grade
}

/// POST /api/login-and-scrape - log into the portal and scrape the grades
pub async fn post_login_and_scrape(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginScrapeRequest>,
) -> Response {
    info!("POST /api/login-and-scrape");

    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return scrape_error_to_response(ScrapeError::MissingCredentials);
    }

    let credentials = Credentials::new(payload.email, payload.password);
    let targets = TargetParameters {
        target_average: payload.target_average,
        passing_grade: payload.passing_grade,
    };

    match boletim::run(&state.config.browser, &state.config.scrape, credentials, targets).await {
        Ok(result) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": result })),
        )
            .into_response(),
        Err(e) => {
            if e.is_caller_error() {
                warn!("scrape rejected: {e}");
            } else {
                error!("scrape failed: {e}");
            }
            scrape_error_to_response(e)
        }
    }
}

/// Maps pipeline failures onto HTTP statuses: caller mistakes to 4xx,
/// portal-shape problems to 502, slowness to 504, the rest to 500.
fn scrape_error_to_response(error: ScrapeError) -> Response {
    let (status, message) = match &error {
        ScrapeError::MissingCredentials => {
            (StatusCode::BAD_REQUEST, "Email and password are required")
        }
        ScrapeError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            "Authentication failed; check username and password",
        ),
        ScrapeError::FieldsNotFound => (
            StatusCode::BAD_GATEWAY,
            "Could not locate the login fields on the portal",
        ),
        ScrapeError::GradesPageNotFound => (
            StatusCode::BAD_GATEWAY,
            "Could not locate the grades page on the portal",
        ),
        ScrapeError::Browser(BrowserError::NavigationTimeout(_)) => (
            StatusCode::GATEWAY_TIMEOUT,
            "The portal did not respond in time",
        ),
        ScrapeError::Browser(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Browser automation failed",
        ),
        ScrapeError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error during the scrape",
        ),
    };
    ApiErrorType::from((status, message, Some(error.to_string()))).into_response()
}
