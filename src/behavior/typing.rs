//! Human-like query entry

use std::time::Duration;

use tracing::{info, warn};

use crate::behavior::pacing::{chance, DelayRange};
use crate::behavior::selectors;
use crate::browser::{BrowserError, BrowsingSession};

/// Typing cadence bounds.
///
/// Defaults reproduce non-uniform human typing: quick alphanumerics, slower
/// separators, occasional hesitation. All of it is configuration, not
/// constants baked into the typer.
#[derive(Debug, Clone)]
pub struct TypingCadence {
    pub char_delay: DelayRange,
    pub separator_delay: DelayRange,
    pub hesitation_chance: f64,
    pub hesitation: DelayRange,
    pub settle: DelayRange,
}

impl Default for TypingCadence {
    fn default() -> Self {
        Self {
            char_delay: DelayRange::new(50, 150),
            separator_delay: DelayRange::new(200, 400),
            hesitation_chance: 0.1,
            hesitation: DelayRange::new(400, 800),
            settle: DelayRange::new(800, 1500),
        }
    }
}

impl TypingCadence {
    /// Override the per-character bounds (taken from the session config).
    pub fn with_char_delay(mut self, range: DelayRange) -> Self {
        self.char_delay = range;
        self
    }
}

/// Types queries into the engine's search box.
pub struct QueryTyper {
    cadence: TypingCadence,
}

impl QueryTyper {
    pub fn new(cadence: TypingCadence) -> Self {
        Self { cadence }
    }

    /// Enter `text` into the query field and submit it.
    ///
    /// Fails with `InputNotReady` if the field never becomes interactable,
    /// and with `Timeout` if no results container appears after submission.
    pub async fn type_query(
        &self,
        session: &BrowsingSession,
        text: &str,
    ) -> Result<(), BrowserError> {
        let driver = session.driver();

        let input = selectors::SEARCH_INPUT
            .resolve(driver, Duration::from_secs(10), Duration::from_secs(3))
            .await
            .map_err(|e| BrowserError::InputNotReady(e.to_string()))?;

        info!("Session {} typing search term: {}", session.id, text);

        driver
            .click_nth(input, 0)
            .await
            .map_err(|e| BrowserError::InputNotReady(e.to_string()))?;
        DelayRange::new(300, 600).pause().await;

        driver.clear_input(input).await?;
        DelayRange::new(200, 400).pause().await;

        for c in text.chars() {
            if c.is_whitespace() || c == '-' || c == '_' {
                self.cadence.separator_delay.pause().await;
            } else {
                self.cadence.char_delay.pause().await;
            }

            driver.type_char(c).await?;

            if chance(self.cadence.hesitation_chance) {
                self.cadence.hesitation.pause().await;
            }
        }

        self.cadence.settle.pause().await;
        driver.press_enter().await?;

        // The query only counts once results are actually on screen.
        match selectors::RESULTS_CONTAINER
            .resolve(driver, Duration::from_secs(10), Duration::from_secs(5))
            .await
        {
            Ok(_) => {
                DelayRange::new(1000, 2000).pause().await;
                Ok(())
            }
            Err(e) => {
                warn!("Session {} no search results after query: {}", session.id, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::*;
    use crate::browser::fake::{FakeLink, FakePage};

    #[tokio::test(start_paused = true)]
    async fn types_query_and_submits() {
        let page = Arc::new(FakePage::new(vec![vec![FakeLink::organic(
            "https://a.test/",
        )]]));
        let session = BrowsingSession::new("test", page.clone());

        let typer = QueryTyper::new(TypingCadence::default());
        typer.type_query(&session, "used cars lyon").await.unwrap();

        assert_eq!(*page.typed.lock().unwrap(), "used cars lyon");
        assert!(page.submitted.load(Ordering::Relaxed));
    }

    #[tokio::test(start_paused = true)]
    async fn fails_when_input_never_ready() {
        let page = Arc::new(FakePage::new(Vec::new()).with_input_ready(false));
        let session = BrowsingSession::new("test", page);

        let typer = QueryTyper::new(TypingCadence::default());
        let err = typer.type_query(&session, "query").await.unwrap_err();
        assert!(matches!(err, BrowserError::InputNotReady(_)));
    }
}
