//! Typing credentials and submitting the login form.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::boletim::browser::{try_settle, PortalPage};
use crate::boletim::error::ScrapeError;
use crate::boletim::fields::LoginFields;
use crate::boletim::types::{Credentials, RunTag, ScrapeConfig};

// Portuguese failure phrasings seen across APSWeb deployments.
static AUTH_FAILURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(usu[aá]rio|senha).*(inv[aá]lido|incorreto)|erro de login|senha incorreta")
        .unwrap()
});

const SUBMIT_CANDIDATE_SELECTOR: &str = "input[type=submit], button[type=submit], button";
const SUBMIT_ACTION_WORDS: [&str; 3] = ["entrar", "acessar", "login"];

/// Types the credentials and tries three submit strategies in order: native
/// form submit, clicking a button labeled with a login action word, then
/// pressing Enter in the password field.
///
/// After the submit attempts the page state decides the outcome. Landing
/// back on a login-looking URL with a failure message means the portal
/// rejected the credentials. An ambiguous state (no navigation, no failure
/// message) lets the run continue; the grades-page search will fail soon
/// enough if the login did not stick.
pub async fn authenticate<P: PortalPage>(
    page: &P,
    fields: &LoginFields<P::Handle>,
    credentials: &Credentials,
    config: &ScrapeConfig,
    tag: &RunTag,
) -> Result<(), ScrapeError> {
    page.clear_and_type(&fields.username, &credentials.email).await?;
    page.clear_and_type(&fields.password, &credentials.password).await?;
    info!(run = %tag, "credentials entered, submitting login form");

    let mut submitted = submit_native_form(page, config).await;
    if !submitted {
        submitted = click_submit_button(page, config).await?;
    }
    if !submitted {
        submitted = press_enter_in_password(page, &fields.password, config).await;
    }

    let current = page.current_url().await?;
    if !submitted || current.to_lowercase().contains("login") {
        let body = page.body_text().await?;
        if AUTH_FAILURE_RE.is_match(&body) {
            info!(run = %tag, "portal rejected the credentials");
            return Err(ScrapeError::InvalidCredentials);
        }
        // Single-page logins and frame-based layouts never navigate; let the
        // grades-page search decide whether the login actually worked.
        warn!(run = %tag, submitted, url = %current, "ambiguous post-login state, continuing");
    } else {
        info!(run = %tag, url = %current, "login submitted");
    }
    Ok(())
}

/// Strategy 1: submit the first form on the page directly.
async fn submit_native_form<P: PortalPage>(page: &P, config: &ScrapeConfig) -> bool {
    match page.submit_form().await {
        Ok(true) => try_settle(page, config.submit_nav_timeout).await,
        Ok(false) => false,
        Err(e) => {
            debug!("native form submit failed: {e}");
            false
        }
    }
}

/// Strategy 2: click the first button whose label carries a login action
/// word. Buttons without text are judged by their `value` attribute.
async fn click_submit_button<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
) -> Result<bool, ScrapeError> {
    let candidates = page.find_all(SUBMIT_CANDIDATE_SELECTOR).await?;
    for candidate in &candidates {
        let mut label = page.text_of(candidate).await.unwrap_or_default();
        if label.trim().is_empty() {
            if let Some(value) = page.attr_of(candidate, "value").await.unwrap_or(None) {
                label = value;
            }
        }
        let label = label.to_lowercase();
        if !SUBMIT_ACTION_WORDS.iter().any(|word| label.contains(word)) {
            continue;
        }
        if page.click(candidate).await.is_err() {
            continue;
        }
        if try_settle(page, config.submit_nav_timeout).await {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Strategy 3: Enter in the password field, for forms wired to a key handler.
async fn press_enter_in_password<P: PortalPage>(
    page: &P,
    password: &P::Handle,
    config: &ScrapeConfig,
) -> bool {
    if let Err(e) = page.press_enter(password).await {
        debug!("enter-key submit failed: {e}");
        return false;
    }
    try_settle(page, config.submit_nav_timeout).await
}
