//! Driver capability traits
//!
//! The browsing engine is consumed through this narrow surface: everything
//! the behavior layer needs from a page, and nothing else. The production
//! backend is the CDP implementation in `chrome.rs`; tests drive the same
//! traits through a scripted fake.

use std::time::Duration;

use async_trait::async_trait;

use super::session::BrowsingSession;
use super::BrowserError;
use crate::identity::IdentityProfile;

/// Page-level primitives exposed by the browsing engine.
///
/// Every wait is bounded; no method suspends indefinitely.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate the page to a URL.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait for the current navigation to settle.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError>;

    /// Reload the current page.
    async fn reload(&self) -> Result<(), BrowserError>;

    /// Go back one entry in the session history.
    async fn go_back(&self) -> Result<(), BrowserError>;

    /// Current page URL.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// Wait until an element matching `selector` is present and visible.
    async fn wait_for_visible(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Number of elements currently matching `selector`, in document order.
    async fn count(&self, selector: &str) -> Result<usize, BrowserError>;

    /// Read an attribute of the n-th element matching `selector`.
    async fn attribute_of_nth(
        &self,
        selector: &str,
        index: usize,
        attr: &str,
    ) -> Result<Option<String>, BrowserError>;

    /// Scroll the n-th element matching `selector` into view.
    async fn scroll_into_view_nth(&self, selector: &str, index: usize)
        -> Result<(), BrowserError>;

    /// Click the n-th element matching `selector`.
    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), BrowserError>;

    /// Clear the value of the first input matching `selector`.
    async fn clear_input(&self, selector: &str) -> Result<(), BrowserError>;

    /// Type a single character into the focused element as a trusted key event.
    async fn type_char(&self, c: char) -> Result<(), BrowserError>;

    /// Press Enter on the focused element.
    async fn press_enter(&self) -> Result<(), BrowserError>;

    /// Scroll the page by a wheel delta (positive = down).
    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError>;

    /// Total scrollable document height in pixels.
    async fn scroll_extent(&self) -> Result<i64, BrowserError>;

    /// Apply an identity profile to this page. Idempotent.
    async fn apply_identity(&self, identity: &IdentityProfile) -> Result<(), BrowserError>;

    /// Tear down the underlying page, context and engine process.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// What a session launch needs from the caller.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Display id for the session, used in logs and data-dir naming
    pub session_id: String,
    /// Randomized identity for this session
    pub identity: IdentityProfile,
    /// Proxy URL, if one was assigned
    pub proxy: Option<String>,
}

/// Launches isolated browsing contexts.
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Launch a fresh isolated context and return its session handle.
    ///
    /// Failure here is fatal for the session that requested the launch.
    async fn launch(&self, spec: &LaunchSpec) -> Result<BrowsingSession, BrowserError>;
}
