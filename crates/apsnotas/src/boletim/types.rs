//! Data model for a scrape run: input credentials and targets, scraped
//! subject records, and the derived statistics returned to the caller.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::boletim::error::ScrapeError;
use crate::boletim::numeric;

const DEFAULT_LOGIN_URL: &str =
    "https://gvdasa.maristas.org.br/apsweb/modulos/aluno/login.php5?";

/// Tunables of the scraping pipeline.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// APSWeb login page. Ends in `?` so query parameters can be appended.
    pub login_url: String,
    /// Cap on full page loads.
    pub goto_timeout: Duration,
    /// Wait after a login submit attempt.
    pub submit_nav_timeout: Duration,
    /// Wait after clicking a grades link.
    pub link_nav_timeout: Duration,
    /// Base per-keystroke delay while typing credentials.
    pub type_delay_ms: u64,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            goto_timeout: Duration::from_secs(45),
            submit_nav_timeout: Duration::from_secs(15),
            link_nav_timeout: Duration::from_secs(12),
            type_delay_ms: 30,
        }
    }
}

/// Login credentials for one run.
///
/// Not serializable and not cloneable: the pair lives for a single run and
/// is dropped with it. The `Debug` impl redacts both fields so credentials
/// cannot leak through logs or error chains.
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Rejects blank credentials before the browser ever starts.
    pub fn validate(&self) -> Result<(), ScrapeError> {
        if self.email.trim().is_empty() || self.password.trim().is_empty() {
            return Err(ScrapeError::MissingCredentials);
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Correlates the log lines of one run without exposing who ran it.
/// Derived from the email, so the same student always maps to the same tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTag(String);

impl RunTag {
    pub fn from_email(email: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(email.as_bytes());
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..6]))
    }
}

impl fmt::Display for RunTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grade goals the need-estimates are computed against.
#[derive(Debug, Clone, Copy)]
pub struct TargetParameters {
    /// Average the student wants to reach.
    pub target_average: f64,
    /// Passing threshold, reported back as-is in the stats.
    pub passing_grade: f64,
}

impl Default for TargetParameters {
    fn default() -> Self {
        Self {
            target_average: 7.0,
            passing_grade: 6.0,
        }
    }
}

/// One grade cell as scraped: original text plus its numeric reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawGradeCell {
    pub raw: String,
    pub value: Option<f64>,
}

impl RawGradeCell {
    pub fn from_raw(raw: &str) -> Self {
        Self {
            value: numeric::extract_number(raw),
            raw: raw.to_string(),
        }
    }
}

/// One subject row of the grades page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRecord {
    pub name: String,
    pub grades: Vec<RawGradeCell>,
    /// Mean of the numeric cells; absent when no cell parsed as a number.
    pub current_average: Option<f64>,
}

impl SubjectRecord {
    pub fn from_row(name: String, grades: Vec<RawGradeCell>) -> Self {
        let numeric: Vec<f64> = grades.iter().filter_map(|cell| cell.value).collect();
        let current_average = if numeric.is_empty() {
            None
        } else {
            Some(numeric.iter().sum::<f64>() / numeric.len() as f64)
        };
        Self {
            name,
            grades,
            current_average,
        }
    }
}

/// What the next assessment must score for the subject to reach the target
/// average, assuming equal weights and one assessment left.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NeedEstimate {
    pub possible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_on_next: Option<f64>,
    /// Required grade clamped to the 0..=10 scale of the portal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_on_next_capped: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

/// A subject annotated with its need estimate, used in the worst-first list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSubject {
    #[serde(flatten)]
    pub subject: SubjectRecord,
    pub need_to_reach_target: NeedEstimate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStats {
    pub count_subjects: usize,
    pub target_average: f64,
    pub passing_grade: f64,
}

/// Everything one successful run produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// RFC 3339 timestamp taken when the extraction finished.
    pub scraped_at: String,
    pub grades_page_url: String,
    pub subjects: Vec<SubjectRecord>,
    /// Subjects sorted worst average first; gradeless subjects sort last.
    pub worst_ordered: Vec<RankedSubject>,
    pub stats: ScrapeStats,
}

mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}
