//! Grades scraping against the GVDasa APSWeb student portal.
//!
//! One run drives a fresh browser session through login, unit selection,
//! grades-page discovery and extraction, then derives the statistics the
//! API returns. The session is exclusive to its run and closed when the run
//! ends, whether it succeeded or not.

pub mod auth;
pub mod browser;
pub mod error;
pub mod extract;
pub mod fields;
pub mod navigate;
pub mod numeric;
pub mod stats;
pub mod types;
pub mod unit;

use std::time::Instant;

use tracing::info;

use crate::boletim::browser::{BrowserLaunchConfig, CdpSession, PortalPage, PortalSession};
use crate::boletim::error::ScrapeError;
use crate::boletim::types::{
    Credentials, RunTag, ScrapeConfig, ScrapeResult, ScrapeStats, TargetParameters,
};

/// Runs one complete scrape in a fresh browser session.
pub async fn run(
    launch: &BrowserLaunchConfig,
    config: &ScrapeConfig,
    credentials: Credentials,
    targets: TargetParameters,
) -> Result<ScrapeResult, ScrapeError> {
    // Checked here too so blank credentials never cost a browser launch.
    credentials.validate()?;
    let session = CdpSession::launch(launch, config.goto_timeout, config.type_delay_ms).await?;
    run_with_session(session, config, credentials, targets).await
}

/// Runs the pipeline on an existing session.
///
/// The session is closed before returning, success or failure, so no
/// browser process can outlive its run. The credentials die with the run.
pub async fn run_with_session<S: PortalSession>(
    session: S,
    config: &ScrapeConfig,
    credentials: Credentials,
    targets: TargetParameters,
) -> Result<ScrapeResult, ScrapeError> {
    let result = run_pipeline(session.page(), config, &credentials, targets).await;
    session.close().await;
    result
}

async fn run_pipeline<P: PortalPage>(
    page: &P,
    config: &ScrapeConfig,
    credentials: &Credentials,
    targets: TargetParameters,
) -> Result<ScrapeResult, ScrapeError> {
    credentials.validate()?;
    let tag = RunTag::from_email(&credentials.email);
    let started = Instant::now();

    info!(run = %tag, url = %config.login_url, "opening portal login page");
    page.goto(&config.login_url).await?;

    unit::select_unit(page, config, &tag).await?;
    let fields = fields::locate_login_fields(page, &tag).await?;
    auth::authenticate(page, &fields, credentials, config, &tag).await?;

    let grades_page_url = navigate::locate_grades_page(page, config, &tag).await?;

    let html = page.html().await?;
    let body_text = page.body_text().await?;
    let extraction = extract::extract_subjects(&html, &body_text);
    info!(
        run = %tag,
        source = extraction.source(),
        records = extraction.len(),
        "subject records extracted"
    );

    let subjects = extraction.into_subjects();
    let worst_ordered = stats::rank_worst_first(&subjects, &targets);
    let stats = ScrapeStats {
        count_subjects: subjects.len(),
        target_average: targets.target_average,
        passing_grade: targets.passing_grade,
    };
    let result = ScrapeResult {
        scraped_at: chrono::Utc::now().to_rfc3339(),
        grades_page_url,
        subjects,
        worst_ordered,
        stats,
    };

    info!(
        run = %tag,
        subjects = result.stats.count_subjects,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scrape completed"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::boletim::browser::fake::{FakeElement, FakePage, FakeRoute, FakeSession};

    const LOGIN: &str = "https://portal.example.com/apsweb/modulos/aluno/login.php5?";
    const HOME: &str = "https://portal.example.com/apsweb/modulos/aluno/home.php5";
    // Known paths resolve host-absolute, without the /apsweb prefix.
    const BOLETIM: &str = "https://portal.example.com/modulos/aluno/boletim.php5";
    const AVALIACAO: &str = "https://portal.example.com/modulos/aluno/avaliacao.php5";

    const GRADES_HTML: &str = r#"
        <html><body>
        <table>
          <tr><th>Disciplina</th><th>N1</th><th>N2</th></tr>
          <tr><td>Matemática</td><td>5,0</td><td>6,0</td></tr>
          <tr><td>Português</td><td>9,0</td><td>8,0</td></tr>
          <tr><td>História</td><td>7,0</td><td>Faltou</td></tr>
        </table>
        </body></html>"#;

    fn config() -> ScrapeConfig {
        ScrapeConfig {
            login_url: LOGIN.to_string(),
            ..ScrapeConfig::default()
        }
    }

    fn login_route() -> FakeRoute {
        FakeRoute::new()
            .with_element(
                "select",
                FakeElement::new().with_options(&[
                    ("Escolha sua unidade", ""),
                    ("8 - Marista Santo Angelo", "8"),
                ]),
            )
            .with_element("input[name*=usuario]", FakeElement::new())
            .with_element("input[name*=senha]", FakeElement::new())
            .with_submit_target(HOME)
    }

    #[tokio::test]
    async fn test_full_run_happy_path() {
        let page = Arc::new(
            FakePage::new()
                .with_route(LOGIN, login_route())
                .with_route(HOME, FakeRoute::new().with_body_text("Bem-vindo ao portal"))
                .with_route(BOLETIM, FakeRoute::new().with_body_text("Sessão expirada"))
                .with_route(
                    AVALIACAO,
                    FakeRoute::new()
                        .with_body_text("Avaliações do aluno")
                        .with_html(GRADES_HTML),
                ),
        );
        let (session, closed) = FakeSession::new(page.clone());

        let result = run_with_session(
            session,
            &config(),
            Credentials::new("aluno@example.com", "s3nh4"),
            TargetParameters::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.grades_page_url, AVALIACAO);
        assert_eq!(result.subjects.len(), 3);
        assert_eq!(result.stats.count_subjects, 3);
        assert_eq!(result.stats.target_average, 7.0);
        assert!(!result.scraped_at.is_empty());

        // Worst average first: Matemática 5.5, História 7.0, Português 8.5.
        let order: Vec<&str> = result
            .worst_ordered
            .iter()
            .map(|r| r.subject.name.as_str())
            .collect();
        assert_eq!(order, vec!["Matemática", "História", "Português"]);

        // Matemática needs 7*3 - 11 = 10 on the next assessment.
        let worst = &result.worst_ordered[0].need_to_reach_target;
        assert_eq!(worst.required_on_next, Some(10.0));
        assert_eq!(worst.required_on_next_capped, Some(10.0));

        // The unit was picked and both credentials typed before submitting.
        assert_eq!(page.selected(), vec![("select".to_string(), "8".to_string())]);
        let typed = page.typed();
        assert_eq!(typed[0].1, "aluno@example.com");
        assert_eq!(typed[1].1, "s3nh4");

        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_invalid_login_closes_session_and_goes_no_further() {
        let rejected = "https://portal.example.com/apsweb/modulos/aluno/login.php5?erro=1";
        let page = Arc::new(
            FakePage::new()
                .with_route(LOGIN, login_route().with_submit_target(rejected))
                .with_route(
                    rejected,
                    FakeRoute::new().with_body_text("Usuário ou senha inválidos."),
                ),
        );
        let (session, closed) = FakeSession::new(page.clone());

        let err = run_with_session(
            session,
            &config(),
            Credentials::new("aluno@example.com", "errada"),
            TargetParameters::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::InvalidCredentials));
        assert!(closed.load(Ordering::SeqCst));
        // The failed login stopped the run before any grades navigation.
        assert!(!page
            .visited()
            .iter()
            .any(|url| url.contains("boletim") || url.contains("avaliacao")));
    }

    #[tokio::test]
    async fn test_blank_credentials_never_touch_the_portal() {
        let page = Arc::new(FakePage::new().with_route(LOGIN, login_route()));
        let (session, closed) = FakeSession::new(page.clone());

        let err = run_with_session(
            session,
            &config(),
            Credentials::new("", ""),
            TargetParameters::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScrapeError::MissingCredentials));
        assert!(page.visited().is_empty());
        // The session is still torn down even though nothing ran.
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_custom_targets_flow_into_stats_and_estimates() {
        let page = Arc::new(
            FakePage::new()
                .with_route(LOGIN, login_route())
                .with_route(HOME, FakeRoute::new())
                .with_route(
                    AVALIACAO,
                    FakeRoute::new()
                        .with_body_text("Notas do aluno")
                        .with_html(GRADES_HTML),
                ),
        );
        let (session, _closed) = FakeSession::new(page);

        let result = run_with_session(
            session,
            &config(),
            Credentials::new("aluno@example.com", "s3nh4"),
            TargetParameters {
                target_average: 6.0,
                passing_grade: 5.0,
            },
        )
        .await
        .unwrap();

        assert_eq!(result.stats.target_average, 6.0);
        assert_eq!(result.stats.passing_grade, 5.0);
        // Matemática: 6*3 - 11 = 7 on the next assessment.
        assert_eq!(
            result.worst_ordered[0].need_to_reach_target.required_on_next,
            Some(7.0)
        );
    }
}
