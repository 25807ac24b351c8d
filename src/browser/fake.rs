//! Scripted in-memory driver for tests
//!
//! Simulates a paginated result set plus a search box without a browser.
//! Selector dispatch keys off the patterns the behavior layer actually uses.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::driver::{BrowserEngine, LaunchSpec, PageDriver};
use super::errors::BrowserError;
use super::session::BrowsingSession;
use crate::identity::IdentityProfile;

/// One scripted result link.
#[derive(Debug, Clone)]
pub struct FakeLink {
    pub href: String,
    pub sponsored: bool,
}

impl FakeLink {
    pub fn organic(href: &str) -> Self {
        Self {
            href: href.to_string(),
            sponsored: false,
        }
    }

    pub fn ad(href: &str) -> Self {
        Self {
            href: href.to_string(),
            sponsored: true,
        }
    }
}

enum SelectorKind {
    SearchInput,
    ResultsContainer,
    ResultLinks,
    OrganicLinks,
    NextPage,
    Consent,
    Other,
}

fn classify(selector: &str) -> SelectorKind {
    if selector.contains("name='q'") {
        SelectorKind::SearchInput
    } else if selector.contains("div.g:not") {
        SelectorKind::OrganicLinks
    } else if selector.contains("pnnext")
        || selector.contains("Next page")
        || selector.contains("suivante")
    {
        SelectorKind::NextPage
    } else if selector.contains("a[href^='http']") {
        SelectorKind::ResultLinks
    } else if matches!(selector, "div#search" | "div#main" | "div#rso" | "div.g") {
        SelectorKind::ResultsContainer
    } else if selector.contains("ccept")
        || selector.contains("akzeptieren")
        || selector.contains("consent")
        || selector.contains("dialog")
        || selector.contains("L2AGLb")
    {
        SelectorKind::Consent
    } else {
        SelectorKind::Other
    }
}

/// Scripted page: a sequence of SERP pages plus interaction counters.
#[derive(Default)]
pub struct FakePage {
    pages: Vec<Vec<FakeLink>>,
    current: AtomicUsize,
    input_ready: bool,
    consent_present: AtomicBool,
    back_fails: bool,
    scroll_height: i64,
    /// Results container stays invisible until this many reloads happened
    results_after_reloads: usize,
    reloads: AtomicUsize,

    pub typed: Mutex<String>,
    pub submitted: AtomicBool,
    pub clicked: Mutex<Vec<String>>,
    pub navigations: Mutex<Vec<String>>,
    pub next_clicks: AtomicUsize,
    pub scrolls: AtomicUsize,
    pub close_calls: AtomicUsize,
}

impl FakePage {
    pub fn new(pages: Vec<Vec<FakeLink>>) -> Self {
        Self {
            pages,
            input_ready: true,
            ..Default::default()
        }
    }

    pub fn with_input_ready(mut self, ready: bool) -> Self {
        self.input_ready = ready;
        self
    }

    pub fn with_consent_dialog(self) -> Self {
        self.consent_present.store(true, Ordering::Relaxed);
        self
    }

    pub fn with_back_failure(mut self) -> Self {
        self.back_fails = true;
        self
    }

    pub fn with_scroll_height(mut self, height: i64) -> Self {
        self.scroll_height = height;
        self
    }

    pub fn with_results_after_reloads(mut self, reloads: usize) -> Self {
        self.results_after_reloads = reloads;
        self
    }

    pub fn current_page(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    fn current_links(&self) -> Vec<FakeLink> {
        self.pages
            .get(self.current.load(Ordering::Relaxed))
            .cloned()
            .unwrap_or_default()
    }

    fn organic_links(&self) -> Vec<FakeLink> {
        self.current_links()
            .into_iter()
            .filter(|l| !l.sponsored)
            .collect()
    }

    fn has_next(&self) -> bool {
        self.current.load(Ordering::Relaxed) + 1 < self.pages.len()
    }

    fn links_for(&self, kind: &SelectorKind) -> Option<Vec<FakeLink>> {
        match kind {
            SelectorKind::ResultLinks => Some(self.current_links()),
            SelectorKind::OrganicLinks => Some(self.organic_links()),
            _ => None,
        }
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn wait_for_navigation(&self, _timeout: Duration) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        if self.back_fails {
            Err(BrowserError::NavigationFailed("history back failed".into()))
        } else {
            Ok(())
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self
            .navigations
            .lock()
            .unwrap()
            .last()
            .cloned()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn wait_for_visible(
        &self,
        selector: &str,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        let visible = match classify(selector) {
            SelectorKind::SearchInput => self.input_ready,
            SelectorKind::ResultsContainer => {
                matches!(selector, "div#search")
                    && self.reloads.load(Ordering::Relaxed) >= self.results_after_reloads
            }
            SelectorKind::ResultLinks => !self.current_links().is_empty(),
            SelectorKind::OrganicLinks => !self.organic_links().is_empty(),
            SelectorKind::NextPage => self.has_next(),
            SelectorKind::Consent => self.consent_present.load(Ordering::Relaxed),
            SelectorKind::Other => false,
        };
        if visible {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!(
                "Selector not visible: {}",
                selector
            )))
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        Ok(match classify(selector) {
            SelectorKind::ResultLinks => self.current_links().len(),
            SelectorKind::OrganicLinks => self.organic_links().len(),
            SelectorKind::NextPage => usize::from(self.has_next()),
            SelectorKind::Consent => usize::from(self.consent_present.load(Ordering::Relaxed)),
            SelectorKind::SearchInput => usize::from(self.input_ready),
            _ => 0,
        })
    }

    async fn attribute_of_nth(
        &self,
        selector: &str,
        index: usize,
        _attr: &str,
    ) -> Result<Option<String>, BrowserError> {
        let links = self
            .links_for(&classify(selector))
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))?;
        links
            .get(index)
            .map(|l| Some(l.href.clone()))
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{}[{}]", selector, index)))
    }

    async fn scroll_into_view_nth(
        &self,
        _selector: &str,
        _index: usize,
    ) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), BrowserError> {
        match classify(selector) {
            SelectorKind::NextPage => {
                self.next_clicks.fetch_add(1, Ordering::Relaxed);
                self.current.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            kind @ (SelectorKind::ResultLinks | SelectorKind::OrganicLinks) => {
                let links = self.links_for(&kind).unwrap_or_default();
                let link = links.get(index).ok_or_else(|| {
                    BrowserError::ElementNotFound(format!("{}[{}]", selector, index))
                })?;
                self.clicked.lock().unwrap().push(link.href.clone());
                Ok(())
            }
            SelectorKind::SearchInput => Ok(()),
            SelectorKind::Consent => {
                self.consent_present.store(false, Ordering::Relaxed);
                Ok(())
            }
            _ => Err(BrowserError::ElementNotFound(selector.to_string())),
        }
    }

    async fn clear_input(&self, _selector: &str) -> Result<(), BrowserError> {
        self.typed.lock().unwrap().clear();
        Ok(())
    }

    async fn type_char(&self, c: char) -> Result<(), BrowserError> {
        self.typed.lock().unwrap().push(c);
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), BrowserError> {
        self.submitted.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn scroll_by(&self, _delta_y: i64) -> Result<(), BrowserError> {
        self.scrolls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<i64, BrowserError> {
        Ok(self.scroll_height)
    }

    async fn apply_identity(&self, _identity: &IdentityProfile) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Engine handing out scripted pages keyed by session id.
#[derive(Default)]
pub struct FakeEngine {
    pages: Mutex<HashMap<String, Arc<FakePage>>>,
    failing: Mutex<HashSet<String>>,
    pub launches: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, session_id: &str, page: Arc<FakePage>) {
        self.pages
            .lock()
            .unwrap()
            .insert(session_id.to_string(), page);
    }

    pub fn fail_launch(&self, session_id: &str) {
        self.failing.lock().unwrap().insert(session_id.to_string());
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, spec: &LaunchSpec) -> Result<BrowsingSession, BrowserError> {
        self.launches
            .lock()
            .unwrap()
            .push((spec.session_id.clone(), spec.proxy.clone()));

        if self.failing.lock().unwrap().contains(&spec.session_id) {
            return Err(BrowserError::LaunchFailed(format!(
                "scripted launch failure for {}",
                spec.session_id
            )));
        }

        let page = self
            .pages
            .lock()
            .unwrap()
            .get(&spec.session_id)
            .cloned()
            .unwrap_or_else(|| Arc::new(FakePage::new(Vec::new())));

        Ok(BrowsingSession::new(spec.session_id.clone(), page))
    }
}
