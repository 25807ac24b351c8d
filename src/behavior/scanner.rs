//! SERP scanning and pagination
//!
//! Locates a target destination within one or more result pages, with
//! selector fallback, bounded reload retries and page-by-page pagination.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::behavior::consent;
use crate::behavior::links::{self, ResultLink};
use crate::behavior::pacing::{jitter, scroll_ticks, DelayRange, ScrollPattern};
use crate::behavior::selectors;
use crate::bot::CancelFlag;
use crate::browser::{BrowserError, BrowsingSession};

/// Terminal value of one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Target activated; `page_index` is 0-based.
    Found {
        link: ResultLink,
        page_index: usize,
    },
    /// All pages exhausted without a match.
    NotFound { pages_scanned: usize },
}

/// Scans paginated result sets for a target destination.
pub struct ResultScanner {
    /// Reload-and-retry budget for an unreadable page
    reload_retries: u32,
    /// Pause between SERP pages
    page_pause: DelayRange,
}

impl Default for ResultScanner {
    fn default() -> Self {
        Self {
            reload_retries: 3,
            page_pause: DelayRange::new(2000, 4000),
        }
    }
}

impl ResultScanner {
    /// Scan up to `max_pages` result pages for `target`.
    ///
    /// A page that fails to enumerate counts as having no match; only an
    /// unreadable page after the reload budget, or cancellation, fails the
    /// whole scan.
    pub async fn scan_for_target(
        &self,
        session: &BrowsingSession,
        target: &str,
        max_pages: usize,
        cancel: &CancelFlag,
    ) -> Result<ScanOutcome, BrowserError> {
        let target_key = links::normalize(target);
        info!("Session {} looking for target key: {}", session.id, target_key);

        for page_index in 0..max_pages {
            if cancel.is_cancelled() {
                return Err(BrowserError::Cancelled);
            }

            info!("Session {} scanning SERP page {}", session.id, page_index + 1);

            self.settle_on_page(session).await?;

            match self.find_on_page(session, &target_key).await {
                Ok(Some(link)) => {
                    info!(
                        "Session {} found target on page {}: {}",
                        session.id,
                        page_index + 1,
                        link.raw
                    );
                    return Ok(ScanOutcome::Found { link, page_index });
                }
                Ok(None) => {
                    debug!(
                        "Session {} no matching links on page {}",
                        session.id,
                        page_index + 1
                    );
                }
                Err(e) => {
                    // One flaky page must not abort the whole session.
                    warn!(
                        "Session {} page {} scan error (treated as no match): {}",
                        session.id,
                        page_index + 1,
                        e
                    );
                }
            }

            if page_index + 1 >= max_pages {
                break;
            }

            if !self.next_page(session).await? {
                info!(
                    "Session {} no more SERP pages after page {}",
                    session.id,
                    page_index + 1
                );
                return Ok(ScanOutcome::NotFound {
                    pages_scanned: page_index + 1,
                });
            }

            self.page_pause.pause().await;
        }

        info!(
            "Session {} target not found within {} pages",
            session.id, max_pages
        );
        Ok(ScanOutcome::NotFound {
            pages_scanned: max_pages,
        })
    }

    /// Simulated reading burst plus a readiness wait with the reload budget.
    async fn settle_on_page(&self, session: &BrowsingSession) -> Result<(), BrowserError> {
        let driver = session.driver();

        let ticks = jitter(3, 6) as usize;
        // Scroll failures here are cosmetic; readability is decided below.
        if let Err(e) = scroll_ticks(driver, &ScrollPattern::serp_settle(), ticks).await {
            debug!("Session {} settle scroll failed: {}", session.id, e);
        }

        consent::dismiss(session).await;

        let mut attempt = 0;
        loop {
            match selectors::RESULTS_CONTAINER
                .resolve(driver, Duration::from_secs(10), Duration::from_secs(5))
                .await
            {
                Ok(_) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.reload_retries {
                        return Err(BrowserError::NavigationFailed(format!(
                            "results not readable after {} reloads: {}",
                            self.reload_retries, e
                        )));
                    }
                    warn!(
                        "Session {} results not visible (attempt {}/{}), reloading",
                        session.id, attempt, self.reload_retries
                    );
                    driver.reload().await?;
                    let _ = driver.wait_for_navigation(Duration::from_secs(30)).await;
                    consent::dismiss(session).await;
                }
            }
        }
    }

    /// First candidate on the current page whose destination matches.
    async fn find_on_page(
        &self,
        session: &BrowsingSession,
        target_key: &str,
    ) -> Result<Option<ResultLink>, BrowserError> {
        let driver = session.driver();

        let selector = match selectors::RESULT_LINKS.first_with_matches(driver).await? {
            Some(s) => s,
            None => return Ok(None),
        };

        let total = driver.count(selector).await?;
        debug!("Session {} found {} candidate links", session.id, total);

        for i in 0..total {
            let href = match driver.attribute_of_nth(selector, i, "href").await? {
                Some(href) => href,
                None => continue,
            };

            let link = ResultLink::new(href);
            if !link.matches_key(target_key) {
                continue;
            }

            driver.scroll_into_view_nth(selector, i).await?;
            DelayRange::new(1000, 2000).pause().await;
            driver.click_nth(selector, i).await?;

            // The activation already went through; a slow settle is not
            // worth re-scanning the page over.
            if let Err(e) = driver.wait_for_navigation(Duration::from_secs(30)).await {
                warn!(
                    "Session {} target navigation slow to settle: {}",
                    session.id, e
                );
            }

            return Ok(Some(link));
        }

        Ok(None)
    }

    /// Activate the next-page control. `Ok(false)` when there is none.
    async fn next_page(&self, session: &BrowsingSession) -> Result<bool, BrowserError> {
        let driver = session.driver();

        let selector = match selectors::NEXT_PAGE.first_with_matches(driver).await {
            Ok(Some(s)) => s,
            Ok(None) => return Ok(false),
            Err(e) => {
                debug!("Session {} next-page lookup failed: {}", session.id, e);
                return Ok(false);
            }
        };

        driver.scroll_into_view_nth(selector, 0).await?;
        driver.click_nth(selector, 0).await?;
        if let Err(e) = driver.wait_for_navigation(Duration::from_secs(30)).await {
            warn!("Session {} next page slow to settle: {}", session.id, e);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::browser::fake::{FakeLink, FakePage};

    fn serp(pages: &[&[&str]]) -> Vec<Vec<FakeLink>> {
        pages
            .iter()
            .map(|links| links.iter().map(|href| FakeLink::organic(href)).collect())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn finds_target_on_third_page() {
        let page = Arc::new(FakePage::new(serp(&[
            &["https://alpha.test/", "https://beta.test/"],
            &["https://gamma.test/"],
            &["https://delta.test/", "https://www.example.com/page/?utm=1"],
        ])));
        let session = BrowsingSession::new("test", page.clone());

        let outcome = ResultScanner::default()
            .scan_for_target(&session, "example.com/page", 10, &CancelFlag::new())
            .await
            .unwrap();

        match outcome {
            ScanOutcome::Found { page_index, link } => {
                assert_eq!(page_index, 2);
                assert_eq!(link.key, "example.com/page");
            }
            other => panic!("expected Found, got {:?}", other),
        }
        assert!(page
            .clicked
            .lock()
            .unwrap()
            .contains(&"https://www.example.com/page/?utm=1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_exactly_max_pages() {
        // More pages exist than the budget allows; the scan must stop at 5.
        let page = Arc::new(FakePage::new(serp(&[
            &["https://a.test/"],
            &["https://b.test/"],
            &["https://c.test/"],
            &["https://d.test/"],
            &["https://e.test/"],
            &["https://f.test/"],
            &["https://g.test/"],
        ])));
        let session = BrowsingSession::new("test", page.clone());

        let outcome = ResultScanner::default()
            .scan_for_target(&session, "example.com", 5, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::NotFound { pages_scanned: 5 });
        assert_eq!(page.next_clicks.load(Ordering::Relaxed), 4);
        assert_eq!(page.current_page(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_early_when_pagination_ends() {
        let page = Arc::new(FakePage::new(serp(&[
            &["https://a.test/"],
            &["https://b.test/"],
        ])));
        let session = BrowsingSession::new("test", page);

        let outcome = ResultScanner::default()
            .scan_for_target(&session, "example.com", 5, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(outcome, ScanOutcome::NotFound { pages_scanned: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_page_recovers_within_reload_budget() {
        let page = Arc::new(
            FakePage::new(serp(&[&["https://www.example.com/"]])).with_results_after_reloads(2),
        );
        let session = BrowsingSession::new("test", page.clone());

        let outcome = ResultScanner::default()
            .scan_for_target(&session, "example.com", 3, &CancelFlag::new())
            .await
            .unwrap();

        assert!(matches!(outcome, ScanOutcome::Found { page_index: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_page_fails_after_reload_budget() {
        let page = Arc::new(
            FakePage::new(serp(&[&["https://www.example.com/"]])).with_results_after_reloads(10),
        );
        let session = BrowsingSession::new("test", page);

        let err = ResultScanner::default()
            .scan_for_target(&session, "example.com", 3, &CancelFlag::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::NavigationFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_observed() {
        let page = Arc::new(FakePage::new(serp(&[&["https://a.test/"]])));
        let session = BrowsingSession::new("test", page);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = ResultScanner::default()
            .scan_for_target(&session, "example.com", 5, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, BrowserError::Cancelled));
    }
}
