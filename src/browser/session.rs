//! Browsing session handle
//!
//! One isolated browser identity: the page, the network egress point and the
//! fingerprint live and die with this handle. Owned exclusively by one
//! orchestrator; never shared across sessions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::driver::PageDriver;
use super::BrowserError;

/// Handle to one isolated browsing context.
pub struct BrowsingSession {
    /// Session id, e.g. "session-1"
    pub id: String,
    driver: Arc<dyn PageDriver>,
    closed: AtomicBool,
}

impl BrowsingSession {
    pub fn new(id: impl Into<String>, driver: Arc<dyn PageDriver>) -> Self {
        Self {
            id: id.into(),
            driver,
            closed: AtomicBool::new(false),
        }
    }

    /// Page primitives for this session.
    pub fn driver(&self) -> &dyn PageDriver {
        self.driver.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Release the browsing context.
    ///
    /// Safe to call more than once; the engine teardown runs exactly once.
    pub async fn close(&self) -> Result<(), BrowserError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Session {} already closed", self.id);
            return Ok(());
        }
        self.driver.close().await
    }
}
