//! Result-page selectors and fallback chains
//!
//! Search engines rename their DOM often enough that every lookup goes
//! through an ordered chain of selectors, tried in sequence until one
//! succeeds.

use std::time::Duration;

use tracing::{debug, info};

use crate::browser::{BrowserError, PageDriver};

/// Ordered list of selector strategies for one kind of element.
#[derive(Debug, Clone, Copy)]
pub struct SelectorChain {
    pub label: &'static str,
    pub selectors: &'static [&'static str],
}

pub const SEARCH_INPUT: SelectorChain = SelectorChain {
    label: "search input",
    selectors: &[
        "textarea[name='q'], input[name='q']",
        "input[aria-label*='Search'], textarea[aria-label*='Search']",
        "input[type='text'][title*='Search']",
    ],
};

pub const RESULTS_CONTAINER: SelectorChain = SelectorChain {
    label: "results container",
    selectors: &["div#search", "div#main", "div#rso", "div.g"],
};

pub const RESULT_LINKS: SelectorChain = SelectorChain {
    label: "result links",
    selectors: &[
        "div#search a[href^='http']",
        "div#main a[href^='http']",
        "div#rso a[href^='http']",
    ],
};

/// Organic results only: sponsored blocks carry the ad marker in data-hveid.
pub const ORGANIC_LINKS: &str = "div#search div.g:not([data-hveid*='CAA']) a[href^='http']";

pub const NEXT_PAGE: SelectorChain = SelectorChain {
    label: "next page",
    selectors: &[
        "a#pnnext",
        "a[aria-label='Next page']",
        "a[aria-label='Page suivante']",
    ],
};

pub const CONSENT_BUTTONS: SelectorChain = SelectorChain {
    label: "consent button",
    selectors: &[
        "button#L2AGLb",
        "button[aria-label='Tout accepter']",
        "button[aria-label='Alle akzeptieren']",
        "[aria-label*='Accept all']",
        "form[action*='consent'] button",
        "div[role='dialog'] button",
    ],
};

impl SelectorChain {
    /// Wait until one of the selectors becomes visible. The first selector
    /// gets `primary_timeout`, each fallback `fallback_timeout`. Returns the
    /// selector that matched.
    pub async fn resolve(
        &self,
        driver: &dyn PageDriver,
        primary_timeout: Duration,
        fallback_timeout: Duration,
    ) -> Result<&'static str, BrowserError> {
        let mut timeout = primary_timeout;
        for &selector in self.selectors {
            match driver.wait_for_visible(selector, timeout).await {
                Ok(()) => {
                    if selector != self.selectors[0] {
                        info!("Found {} with fallback selector: {}", self.label, selector);
                    }
                    return Ok(selector);
                }
                Err(e) => {
                    debug!("{} not matched by {}: {}", self.label, selector, e);
                }
            }
            timeout = fallback_timeout;
        }
        Err(BrowserError::Timeout(format!(
            "{} not found with any selector",
            self.label
        )))
    }

    /// First selector currently matching at least one element, if any.
    pub async fn first_with_matches(
        &self,
        driver: &dyn PageDriver,
    ) -> Result<Option<&'static str>, BrowserError> {
        for &selector in self.selectors {
            if driver.count(selector).await? > 0 {
                return Ok(Some(selector));
            }
        }
        Ok(None)
    }
}
