//! Error types for the scraping pipeline.

use thiserror::Error;

use crate::boletim::browser::BrowserError;

/// Errors that can occur while logging in and scraping grades.
#[derive(Debug, Error, Clone)]
pub enum ScrapeError {
    /// Email or password missing or blank; nothing was attempted
    #[error("email and password are required")]
    MissingCredentials,

    /// No username or password input could be found on the login page
    #[error("could not locate the login fields; the portal layout may have changed")]
    FieldsNotFound,

    /// The portal rejected the credentials
    #[error("authentication failed; check username and password")]
    InvalidCredentials,

    /// Neither link texts nor well-known paths led to a grades page
    #[error("could not locate the grades page; the portal layout may have changed")]
    GradesPageNotFound,

    /// Browser-level failure (launch, navigation, DOM interaction)
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// Anything else
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// True when the failure is the caller's fault rather than the portal's
    /// or ours. Used to pick the log level at the HTTP boundary.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            ScrapeError::MissingCredentials | ScrapeError::InvalidCredentials
        )
    }
}
