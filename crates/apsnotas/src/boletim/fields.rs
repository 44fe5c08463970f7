//! Locating the username and password inputs on the login page.

use tracing::debug;

use crate::boletim::browser::PortalPage;
use crate::boletim::error::ScrapeError;
use crate::boletim::types::RunTag;

// Ordered most to least specific; APSWeb installations differ in what they
// name their inputs.
const USERNAME_SELECTORS: [&str; 5] = [
    "input[name*=useri]",
    "input[name*=usuario]",
    "input[name*=matricula]",
    "input[name*=login]",
    "input[type=\"text\"]",
];

const PASSWORD_SELECTORS: [&str; 3] = [
    "input[name*=senha]",
    "input[name*=pass]",
    "input[type=\"password\"]",
];

const USERNAME_FALLBACK_SELECTOR: &str = "input[type=\"text\"], input:not([type])";
const PASSWORD_FALLBACK_SELECTOR: &str = "input[type=\"password\"]";

/// The two inputs of the login form.
#[derive(Debug)]
pub struct LoginFields<H> {
    pub username: H,
    pub password: H,
}

/// Walks the selector cascades and falls back to the first generic text and
/// password inputs when nothing specific matches.
pub async fn locate_login_fields<P: PortalPage>(
    page: &P,
    tag: &RunTag,
) -> Result<LoginFields<P::Handle>, ScrapeError> {
    let username = match first_match(page, &USERNAME_SELECTORS).await? {
        Some(handle) => Some(handle),
        None => page.find(USERNAME_FALLBACK_SELECTOR).await?,
    };
    let password = match first_match(page, &PASSWORD_SELECTORS).await? {
        Some(handle) => Some(handle),
        None => page.find(PASSWORD_FALLBACK_SELECTOR).await?,
    };

    match (username, password) {
        (Some(username), Some(password)) => Ok(LoginFields { username, password }),
        (username, password) => {
            debug!(
                run = %tag,
                username_found = username.is_some(),
                password_found = password.is_some(),
                "login inputs missing"
            );
            Err(ScrapeError::FieldsNotFound)
        }
    }
}

async fn first_match<P: PortalPage>(
    page: &P,
    selectors: &[&str],
) -> Result<Option<P::Handle>, ScrapeError> {
    for selector in selectors {
        if let Some(handle) = page.find(selector).await? {
            return Ok(Some(handle));
        }
    }
    Ok(None)
}
