//! Session orchestration
//!
//! Drives one full run: open engine -> consent -> query -> detours -> scan ->
//! walk -> teardown, with top-level failure containment. The browsing
//! context is released on every exit path.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::CancelFlag;
use crate::behavior::consent;
use crate::behavior::detour::DetourVisitor;
use crate::behavior::pacing::DelayRange;
use crate::behavior::scanner::{ResultScanner, ScanOutcome};
use crate::behavior::typing::{QueryTyper, TypingCadence};
use crate::behavior::walker::SiteWalker;
use crate::browser::{BrowserEngine, BrowserError, BrowsingSession, LaunchSpec};
use crate::config::SessionConfig;
use crate::identity::IdentityProfile;

/// Terminal outcome of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionOutcome {
    /// Target reached and walked
    Success,
    /// Pages exhausted without a match; a legitimate result, not a failure
    TargetNotFound,
    /// The session itself failed
    Failed(String),
}

/// One result per session, produced exactly once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub session_id: String,
    /// Index of the configuration that produced this result
    pub index: usize,
    pub outcome: SessionOutcome,
}

/// Sequences one full search-and-visit run.
pub struct SessionOrchestrator {
    index: usize,
    config: SessionConfig,
    engine: Arc<dyn BrowserEngine>,
    cancel: CancelFlag,
}

impl SessionOrchestrator {
    pub fn new(
        index: usize,
        config: SessionConfig,
        engine: Arc<dyn BrowserEngine>,
        cancel: CancelFlag,
    ) -> Self {
        Self {
            index,
            config,
            engine,
            cancel,
        }
    }

    /// Run the session to its terminal outcome.
    pub async fn run(self) -> SessionResult {
        let session_id = format!("session-{}", self.index + 1);

        let identity =
            IdentityProfile::randomized(&self.config.locale, self.config.use_geolocation);
        let spec = LaunchSpec {
            session_id: session_id.clone(),
            identity,
            proxy: self.config.proxy.clone(),
        };

        let session = match self.engine.launch(&spec).await {
            Ok(session) => session,
            Err(e) => {
                error!("Session {} failed to launch: {}", session_id, e);
                return SessionResult {
                    session_id,
                    index: self.index,
                    outcome: SessionOutcome::Failed(e.into()),
                };
            }
        };

        let outcome = self.drive(&session).await;

        // Unconditional teardown, whichever branch ended the drive.
        if let Err(e) = session.close().await {
            warn!("Session {} close failed: {}", session_id, e);
        }

        info!("Session {} finished: {:?}", session_id, outcome);
        SessionResult {
            session_id,
            index: self.index,
            outcome,
        }
    }

    async fn drive(&self, session: &BrowsingSession) -> SessionOutcome {
        let driver = session.driver();

        info!("Session {} opening {}", session.id, self.config.engine_url());
        if let Err(e) = driver.navigate(&self.config.engine_url()).await {
            return SessionOutcome::Failed(e.into());
        }
        if let Err(e) = driver.wait_for_navigation(Duration::from_secs(30)).await {
            warn!("Session {} homepage slow to settle: {}", session.id, e);
        }
        DelayRange::new(1000, 3000).pause().await;
        consent::dismiss(session).await;

        if self.cancel.is_cancelled() {
            return SessionOutcome::Failed(BrowserError::Cancelled.into());
        }

        let typer = QueryTyper::new(
            TypingCadence::default().with_char_delay(self.config.typing_delay),
        );
        if let Err(e) = typer.type_query(session, &self.config.query).await {
            error!("Session {} query entry failed: {}", session.id, e);
            return SessionOutcome::Failed(e.into());
        }

        if self.config.detour_count > 0 {
            let detour = DetourVisitor::new(self.config.search_url(), &self.config.target);
            let visited = detour
                .visit_detours(session, self.config.detour_count, &self.cancel)
                .await;
            info!("Session {} completed {} detours", session.id, visited);
        }

        if self.cancel.is_cancelled() {
            return SessionOutcome::Failed(BrowserError::Cancelled.into());
        }

        let scanner = ResultScanner::default();
        match scanner
            .scan_for_target(
                session,
                &self.config.target,
                self.config.max_pages,
                &self.cancel,
            )
            .await
        {
            Ok(ScanOutcome::Found { page_index, .. }) => {
                info!(
                    "Session {} target reached on SERP page {}",
                    session.id,
                    page_index + 1
                );
                SiteWalker::default()
                    .walk_site(
                        session,
                        self.config.site_time_budget_ms,
                        self.config.site_page_count,
                        &self.cancel,
                    )
                    .await;
                SessionOutcome::Success
            }
            Ok(ScanOutcome::NotFound { pages_scanned }) => {
                warn!(
                    "Session {} target not found after {} pages",
                    session.id, pages_scanned
                );
                SessionOutcome::TargetNotFound
            }
            Err(e) => {
                error!("Session {} scan failed: {}", session.id, e);
                SessionOutcome::Failed(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::behavior::pacing::DelayRange;
    use crate::browser::fake::{FakeEngine, FakeLink, FakePage};

    fn config() -> SessionConfig {
        SessionConfig {
            query: "used cars lyon".to_string(),
            target: "example.com".to_string(),
            proxy: None,
            search_domain: "google.fr".to_string(),
            locale: "fr-FR".to_string(),
            use_geolocation: false,
            detour_count: 0,
            site_page_count: 1,
            site_time_budget_ms: 5_000,
            typing_delay: DelayRange::new(50, 150),
            max_pages: 3,
        }
    }

    fn engine_with(page: Arc<FakePage>) -> Arc<FakeEngine> {
        let engine = Arc::new(FakeEngine::new());
        engine.script("session-1", page);
        engine
    }

    #[tokio::test(start_paused = true)]
    async fn success_closes_session_exactly_once() {
        let page = Arc::new(FakePage::new(vec![vec![FakeLink::organic(
            "https://www.example.com/",
        )]]));
        let engine = engine_with(page.clone());

        let result = SessionOrchestrator::new(0, config(), engine, CancelFlag::new())
            .run()
            .await;

        assert_eq!(result.outcome, SessionOutcome::Success);
        assert_eq!(page.close_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn not_found_closes_session_exactly_once() {
        let page = Arc::new(FakePage::new(vec![vec![FakeLink::organic(
            "https://other.test/",
        )]]));
        let engine = engine_with(page.clone());

        let result = SessionOrchestrator::new(0, config(), engine, CancelFlag::new())
            .run()
            .await;

        assert_eq!(result.outcome, SessionOutcome::TargetNotFound);
        assert_eq!(page.close_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_closes_session_exactly_once() {
        let page = Arc::new(FakePage::new(Vec::new()).with_input_ready(false));
        let engine = engine_with(page.clone());

        let result = SessionOrchestrator::new(0, config(), engine, CancelFlag::new())
            .run()
            .await;

        assert!(matches!(result.outcome, SessionOutcome::Failed(_)));
        assert_eq!(page.close_calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn launch_failure_is_fatal() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_launch("session-1");

        let result = SessionOrchestrator::new(0, config(), engine, CancelFlag::new())
            .run()
            .await;

        match result.outcome {
            SessionOutcome::Failed(cause) => assert!(cause.contains("launch")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn detours_run_before_the_scan() {
        let page = Arc::new(FakePage::new(vec![vec![
            FakeLink::organic("https://competitor.test/"),
            FakeLink::organic("https://www.example.com/"),
        ]]));
        let engine = engine_with(page.clone());

        let mut cfg = config();
        cfg.detour_count = 1;
        let result = SessionOrchestrator::new(0, cfg, engine, CancelFlag::new())
            .run()
            .await;

        assert_eq!(result.outcome, SessionOutcome::Success);
        let clicked = page.clicked.lock().unwrap().clone();
        assert_eq!(clicked[0], "https://competitor.test/");
        assert!(clicked.contains(&"https://www.example.com/".to_string()));
    }
}
