//! School unit pre-selection on the login page.
//!
//! Multi-unit APSWeb installations put a unit `<select>` next to the login
//! form and reject logins made against the wrong unit. The patterns and the
//! query-parameter fallback below pin the run to the Santo Ângelo unit.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::boletim::browser::PortalPage;
use crate::boletim::error::ScrapeError;
use crate::boletim::types::{RunTag, ScrapeConfig};

// Checked in order against each option's visible text.
static UNIT_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)marista santo angelo").unwrap(),
        Regex::new(r"(?i)8\s*-\s*SOME").unwrap(),
        Regex::new(r"(?i)santo angelo").unwrap(),
    ]
});

// Some installations accept the unit as a query parameter instead of the
// select control. Appended to the login URL when no option matches.
const UNIT_FALLBACK_PARAM: &str = "lstUnidades=8,Marista%20Santo%20%C3%82ngelo";

/// Scans every `<select>` on the page for a unit option and picks it.
///
/// Returns whether an option matched. A failing select action still counts
/// as matched: the portal sometimes applies the choice despite erroring, and
/// the login attempt itself will tell. Only when nothing matches at all is
/// the query-parameter fallback navigation tried.
pub async fn select_unit<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
    tag: &RunTag,
) -> Result<bool, ScrapeError> {
    let selects = page.find_all("select").await?;
    for select in &selects {
        let options = page.options_of(select).await?;
        let matched = options
            .iter()
            .find(|option| UNIT_PATTERNS.iter().any(|p| p.is_match(&option.text)));
        let Some(option) = matched else {
            continue;
        };

        info!(run = %tag, option = %option.text, "unit option matched");
        if let Err(e) = page.select_value(select, &option.value).await {
            debug!(run = %tag, "unit select action failed: {e}");
        }
        return Ok(true);
    }

    let fallback = format!("{}{}", config.login_url, UNIT_FALLBACK_PARAM);
    debug!(run = %tag, url = %fallback, "no unit option found, trying query-parameter fallback");
    if let Err(e) = page.goto(&fallback).await {
        debug!(run = %tag, "unit fallback navigation failed: {e}");
    }
    Ok(false)
}
