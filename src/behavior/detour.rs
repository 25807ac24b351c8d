//! Competitor detours
//!
//! Visits non-target results on the current SERP before the primary scan
//! resumes. Best-effort: internal errors are logged and visitation stops
//! early, never failing the session.

use std::time::Duration;

use tracing::{info, warn};

use crate::behavior::links;
use crate::behavior::pacing::{chance, jitter, DelayRange, ScrollPattern};
use crate::behavior::selectors;
use crate::bot::CancelFlag;
use crate::browser::{BrowserError, BrowsingSession};

/// Visits competitor results before the target scan.
pub struct DetourVisitor {
    /// Search URL used to recover the results page when going back fails
    search_url: String,
    /// Target key; matching links are never detoured into
    target_key: String,
    /// Dwell duration drawn per visit
    dwell_duration: DelayRange,
}

impl DetourVisitor {
    pub fn new(search_url: impl Into<String>, target: &str) -> Self {
        Self {
            search_url: search_url.into(),
            target_key: links::normalize(target),
            dwell_duration: DelayRange::new(8000, 15000),
        }
    }

    /// Visit up to `count` non-target organic results, in document order.
    ///
    /// Returns the number actually visited.
    pub async fn visit_detours(
        &self,
        session: &BrowsingSession,
        count: usize,
        cancel: &CancelFlag,
    ) -> usize {
        if count == 0 {
            return 0;
        }

        let driver = session.driver();

        if let Err(e) = selectors::RESULTS_CONTAINER
            .resolve(driver, Duration::from_secs(10), Duration::from_secs(5))
            .await
        {
            warn!("Session {} no results to detour through: {}", session.id, e);
            return 0;
        }
        DelayRange::new(1000, 2000).pause().await;

        let total = match driver.count(selectors::ORGANIC_LINKS).await {
            Ok(n) => n,
            Err(e) => {
                warn!(
                    "Session {} could not enumerate organic results: {}",
                    session.id, e
                );
                return 0;
            }
        };

        let mut visited = 0;
        for i in 0..total {
            if visited >= count || cancel.is_cancelled() {
                break;
            }

            let href = match driver
                .attribute_of_nth(selectors::ORGANIC_LINKS, i, "href")
                .await
            {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Session {} detour enumeration stopped: {}", session.id, e);
                    break;
                }
            };

            if links::keys_match(&links::normalize(&href), &self.target_key) {
                continue;
            }

            info!(
                "Session {} visiting competitor {}: {}",
                session.id,
                visited + 1,
                href
            );
            match self.visit_one(session, i).await {
                Ok(()) => visited += 1,
                Err(e) => {
                    warn!("Session {} detour visit failed: {}", session.id, e);
                    if self.recover_results(session).await.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Session {} visited {} competitor sites", session.id, visited);
        visited
    }

    /// One detour: into view, activate, dwell, back to the results page.
    async fn visit_one(&self, session: &BrowsingSession, index: usize) -> Result<(), BrowserError> {
        let driver = session.driver();

        driver
            .scroll_into_view_nth(selectors::ORGANIC_LINKS, index)
            .await?;
        DelayRange::new(800, 1500).pause().await;

        driver.click_nth(selectors::ORGANIC_LINKS, index).await?;
        driver.wait_for_navigation(Duration::from_secs(10)).await?;

        self.dwell(session).await?;

        driver.go_back().await?;
        selectors::RESULTS_CONTAINER
            .resolve(driver, Duration::from_secs(5), Duration::from_secs(3))
            .await?;
        DelayRange::new(2000, 4000).pause().await;
        Ok(())
    }

    /// Bounded randomized dwell on the visited page.
    async fn dwell(&self, session: &BrowsingSession) -> Result<(), BrowserError> {
        let driver = session.driver();
        let pattern = ScrollPattern::dwell();
        let budget = self.dwell_duration.sample();
        let mut elapsed = Duration::ZERO;

        while elapsed < budget {
            driver
                .scroll_by(jitter(pattern.tick_px.0, pattern.tick_px.1))
                .await?;
            let pause = pattern.tick_pause.sample();
            tokio::time::sleep(pause).await;
            elapsed += pause;

            if chance(pattern.long_pause_chance) {
                let extra = pattern.long_pause.sample();
                tokio::time::sleep(extra).await;
                elapsed += extra;
            }
        }
        Ok(())
    }

    /// Re-issue the original query when going back to the results fails.
    async fn recover_results(&self, session: &BrowsingSession) -> Result<(), BrowserError> {
        let driver = session.driver();
        warn!(
            "Session {} recovering results page via fresh query",
            session.id
        );
        driver.navigate(&self.search_url).await?;
        let _ = driver.wait_for_navigation(Duration::from_secs(30)).await;
        selectors::RESULTS_CONTAINER
            .resolve(driver, Duration::from_secs(5), Duration::from_secs(3))
            .await?;
        DelayRange::new(1000, 2000).pause().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::browser::fake::{FakeLink, FakePage};

    #[tokio::test(start_paused = true)]
    async fn visits_requested_count_skipping_ads_and_target() {
        let page = Arc::new(FakePage::new(vec![vec![
            FakeLink::ad("https://sponsored.test/"),
            FakeLink::organic("https://competitor-one.test/"),
            FakeLink::organic("https://www.example.com/"),
            FakeLink::organic("https://competitor-two.test/"),
            FakeLink::organic("https://competitor-three.test/"),
        ]]));
        let session = BrowsingSession::new("test", page.clone());

        let detour = DetourVisitor::new("https://www.google.fr/search?q=x", "example.com");
        let visited = detour
            .visit_detours(&session, 2, &CancelFlag::new())
            .await;

        assert_eq!(visited, 2);
        let clicked = page.clicked.lock().unwrap().clone();
        assert_eq!(
            clicked,
            vec![
                "https://competitor-one.test/".to_string(),
                "https://competitor-two.test/".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_results_visit_nothing() {
        let page = Arc::new(FakePage::new(vec![Vec::new()]));
        let session = BrowsingSession::new("test", page);

        let detour = DetourVisitor::new("https://www.google.fr/search?q=x", "example.com");
        assert_eq!(
            detour.visit_detours(&session, 3, &CancelFlag::new()).await,
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_with_fresh_query_when_back_fails() {
        let page = Arc::new(
            FakePage::new(vec![vec![
                FakeLink::organic("https://competitor-one.test/"),
                FakeLink::organic("https://competitor-two.test/"),
            ]])
            .with_back_failure(),
        );
        let session = BrowsingSession::new("test", page.clone());

        let detour = DetourVisitor::new("https://www.google.fr/search?q=x", "example.com");
        let visited = detour
            .visit_detours(&session, 2, &CancelFlag::new())
            .await;

        // Every visit fails at the back-navigation, so nothing counts as
        // visited, but recovery re-issued the query instead of aborting.
        assert_eq!(visited, 0);
        assert!(page
            .navigations
            .lock()
            .unwrap()
            .iter()
            .any(|url| url.contains("/search?q=")));
    }
}
