//! Consent dialog handling

use std::time::Duration;

use tracing::{debug, info};

use crate::behavior::pacing::DelayRange;
use crate::behavior::selectors;
use crate::browser::BrowsingSession;

/// Dismiss a consent/cookie dialog if one is present.
///
/// Absence of the dialog is not an error. Returns whether a button was
/// clicked.
pub async fn dismiss(session: &BrowsingSession) -> bool {
    let driver = session.driver();

    for &selector in selectors::CONSENT_BUTTONS.selectors {
        if driver
            .wait_for_visible(selector, Duration::from_secs(2))
            .await
            .is_err()
        {
            continue;
        }

        DelayRange::new(500, 1000).pause().await;
        match driver.click_nth(selector, 0).await {
            Ok(()) => {
                DelayRange::new(2000, 3000).pause().await;
                info!(
                    "Session {} consent dialog dismissed ({})",
                    session.id, selector
                );
                return true;
            }
            Err(e) => {
                debug!(
                    "Session {} consent click failed on {}: {}",
                    session.id, selector, e
                );
            }
        }
    }

    debug!("Session {} no consent dialog found", session.id);
    false
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::browser::fake::FakePage;
    use crate::browser::BrowsingSession;

    #[tokio::test(start_paused = true)]
    async fn dismisses_dialog_when_present() {
        let page = Arc::new(FakePage::new(Vec::new()).with_consent_dialog());
        let session = BrowsingSession::new("test", page.clone());
        assert!(dismiss(&session).await);
        // A second pass finds nothing to click.
        assert!(!dismiss(&session).await);
    }

    #[tokio::test(start_paused = true)]
    async fn absence_is_not_an_error() {
        let page = Arc::new(FakePage::new(Vec::new()));
        let session = BrowsingSession::new("test", page.clone());
        assert!(!dismiss(&session).await);
        assert_eq!(page.close_calls.load(Ordering::Relaxed), 0);
    }
}
