//! Finding the grades page after login.
//!
//! Two strategies: follow an anchor whose text mentions grades, then probe
//! the hardcoded paths APSWeb ships the page under. A probed page only
//! counts when its body mentions grade vocabulary, so error and redirect
//! pages are not mistaken for the real thing.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::boletim::browser::{try_settle, PortalPage};
use crate::boletim::error::ScrapeError;
use crate::boletim::types::{RunTag, ScrapeConfig};

const GRADE_LINK_WORDS: [&str; 7] = [
    "nota",
    "notas",
    "boletim",
    "avalia",
    "avaliac",
    "avalição",
    "avaliações",
];

const KNOWN_GRADES_PATHS: [&str; 3] = [
    "/modulos/aluno/boletim.php5",
    "/modulos/aluno/avaliacao.php5",
    "/modulos/aluno/notas.php5",
];

static GRADES_CONTENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)disciplin|nota|avalia").unwrap());

/// Returns the URL of the grades page once the browser is on it.
pub async fn locate_grades_page<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
    tag: &RunTag,
) -> Result<String, ScrapeError> {
    if let Some(url) = follow_grades_link(page, config, tag).await? {
        return Ok(url);
    }
    if let Some(url) = probe_known_paths(page, config, tag).await? {
        return Ok(url);
    }
    Err(ScrapeError::GradesPageNotFound)
}

/// Strategy 1: click the first anchor whose text carries a grades word.
/// When the click leads nowhere the anchor's href is resolved and loaded
/// directly; frame-busting menus often swallow clicks but keep a good href.
async fn follow_grades_link<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
    tag: &RunTag,
) -> Result<Option<String>, ScrapeError> {
    let anchors = page.find_all("a").await?;
    for anchor in &anchors {
        let text = page.text_of(anchor).await.unwrap_or_default().to_lowercase();
        if !GRADE_LINK_WORDS.iter().any(|word| text.contains(word)) {
            continue;
        }

        if page.click(anchor).await.is_ok() && try_settle(page, config.link_nav_timeout).await {
            let url = page.current_url().await?;
            info!(run = %tag, url = %url, "grades page reached via link text");
            return Ok(Some(url));
        }

        let Some(href) = page.attr_of(anchor, "href").await.unwrap_or(None) else {
            continue;
        };
        let Some(target) = resolve_href(&page.current_url().await?, &href) else {
            continue;
        };
        if page.goto(&target).await.is_ok() {
            let url = page.current_url().await?;
            info!(run = %tag, url = %url, "grades page reached via direct href");
            return Ok(Some(url));
        }
    }
    Ok(None)
}

/// Strategy 2: probe the well-known paths relative to the login URL.
async fn probe_known_paths<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
    tag: &RunTag,
) -> Result<Option<String>, ScrapeError> {
    let base = Url::parse(&config.login_url)
        .map_err(|e| ScrapeError::Internal(format!("login url unparseable: {e}")))?;

    for path in KNOWN_GRADES_PATHS {
        let Ok(candidate) = base.join(path) else {
            continue;
        };
        let candidate = String::from(candidate);
        if let Err(e) = page.goto(&candidate).await {
            debug!(run = %tag, url = %candidate, "candidate path unreachable: {e}");
            continue;
        }
        let body = page.body_text().await.unwrap_or_default();
        if GRADES_CONTENT_RE.is_match(&body) {
            let url = page.current_url().await?;
            info!(run = %tag, url = %url, "grades page reached via known path");
            return Ok(Some(url));
        }
    }
    Ok(None)
}

/// Makes an href absolute against the page it was found on.
fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    match Url::parse(href) {
        Ok(url) => Some(String::from(url)),
        Err(_) => Url::parse(base).ok()?.join(href).ok().map(String::from),
    }
}
