//! On-site visit simulation

use std::time::Duration;

use tracing::{debug, info};

use crate::behavior::pacing::{chance, jitter, DelayRange};
use crate::bot::CancelFlag;
use crate::browser::BrowsingSession;

/// Simulates a timed, paced visit on the target site.
///
/// Best-effort: driver errors end the walk quietly, and one time budget
/// bounds the whole walk across all iterations.
pub struct SiteWalker {
    settle: DelayRange,
}

impl Default for SiteWalker {
    fn default() -> Self {
        Self {
            settle: DelayRange::new(2000, 4000),
        }
    }
}

impl SiteWalker {
    pub async fn walk_site(
        &self,
        session: &BrowsingSession,
        time_budget_ms: u64,
        page_count: usize,
        cancel: &CancelFlag,
    ) {
        let driver = session.driver();
        let budget = Duration::from_millis(time_budget_ms);
        let mut spent = Duration::ZERO;

        info!(
            "Session {} walking site (budget: {}ms, pages: {})",
            session.id, time_budget_ms, page_count
        );

        for page in 0..page_count {
            if spent >= budget || cancel.is_cancelled() {
                break;
            }

            let settle = self.settle.sample();
            tokio::time::sleep(settle).await;
            spent += settle;

            let extent = match driver.scroll_extent().await {
                Ok(height) => height,
                Err(e) => {
                    debug!("Session {} scroll extent unavailable: {}", session.id, e);
                    break;
                }
            };

            let mut viewed: i64 = 0;
            while viewed < extent && spent < budget {
                let tick = jitter(100, 300);
                if let Err(e) = driver.scroll_by(tick).await {
                    debug!("Session {} walk scroll failed: {}", session.id, e);
                    return;
                }
                viewed += tick;

                if chance(0.3) {
                    let pause = DelayRange::new(800, 1500).sample();
                    tokio::time::sleep(pause).await;
                    spent += pause;
                }
            }

            debug!(
                "Session {} walked page {} ({}ms of {}ms budget spent)",
                session.id,
                page + 1,
                spent.as_millis(),
                time_budget_ms
            );
        }

        if spent >= budget {
            info!("Session {} time budget exhausted on site", session.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::browser::fake::FakePage;

    #[tokio::test(start_paused = true)]
    async fn zero_budget_performs_no_scrolls() {
        let page = Arc::new(FakePage::new(Vec::new()).with_scroll_height(5000));
        let session = BrowsingSession::new("test", page.clone());

        SiteWalker::default()
            .walk_site(&session, 0, 3, &CancelFlag::new())
            .await;

        assert_eq!(page.scrolls.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn covers_extent_within_budget() {
        let page = Arc::new(FakePage::new(Vec::new()).with_scroll_height(600));
        let session = BrowsingSession::new("test", page.clone());

        SiteWalker::default()
            .walk_site(&session, 120_000, 1, &CancelFlag::new())
            .await;

        // 600px of extent takes at least two 100-300px ticks.
        assert!(page.scrolls.load(Ordering::Relaxed) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_iterations() {
        let page = Arc::new(FakePage::new(Vec::new()).with_scroll_height(5000));
        let session = BrowsingSession::new("test", page.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        SiteWalker::default()
            .walk_site(&session, 60_000, 3, &cancel)
            .await;

        assert_eq!(page.scrolls.load(Ordering::Relaxed), 0);
    }
}
