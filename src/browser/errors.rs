//! Browser error types

use thiserror::Error;

/// Errors produced while driving a browsing session
#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Input not interactable: {0}")]
    InputNotReady(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Session cancelled")]
    Cancelled,
}

impl From<BrowserError> for String {
    fn from(err: BrowserError) -> String {
        err.to_string()
    }
}
