//! Chrome/CDP engine
//!
//! Production implementation of the driver traits over chromiumoxide.
//! Identity overrides are applied at the protocol level and typing/scrolling
//! are dispatched as trusted input events, so nothing the page scripts can
//! inspect distinguishes the session from keyboard and wheel input.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetGeolocationOverrideParams, SetTimezoneOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchKeyEventParams, DispatchKeyEventType, DispatchMouseEventParams,
    DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::driver::{BrowserEngine, LaunchSpec, PageDriver};
use super::session::BrowsingSession;
use super::BrowserError;
use crate::identity::IdentityProfile;

/// Engine-level options shared by all sessions.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOptions {
    /// Path to the Chrome/Chromium executable (auto-detected if unset)
    pub chrome_path: Option<String>,
    /// Run in headless mode
    pub headless: bool,
    /// Navigation settle timeout in seconds
    pub nav_timeout_secs: u64,
    /// Selector poll interval in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: false,
            nav_timeout_secs: 30,
            poll_interval_ms: 250,
        }
    }
}

/// Launches Chrome contexts with a fresh user-data directory per session.
pub struct ChromeEngine {
    options: EngineOptions,
}

impl ChromeEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserEngine for ChromeEngine {
    async fn launch(&self, spec: &LaunchSpec) -> Result<BrowsingSession, BrowserError> {
        let data_dir = std::env::temp_dir()
            .join("serpwalk")
            .join("browser_data")
            .join(format!("{}_{}", spec.session_id, Uuid::new_v4()));
        let _ = std::fs::create_dir_all(&data_dir);

        info!(
            "Launching browser for session {} (headless: {})",
            spec.session_id, self.options.headless
        );

        let mut builder = BrowserConfig::builder();

        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.options.chrome_path {
            builder = builder.chrome_executable(path);
        }

        let (width, height) = spec.identity.viewport;
        builder = builder
            .user_data_dir(&data_dir)
            .window_size(width, height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-default-browser-check")
            .arg("--disable-infobars")
            .arg("--disable-session-crashed-bubble")
            .arg("--disable-notifications")
            // Required when running as root (e.g., in Docker or on a VPS)
            .arg("--no-sandbox")
            .arg(format!("--lang={}", spec.identity.locale));

        if let Some(ref proxy) = spec.proxy {
            info!(
                "Session {} using proxy: {}",
                spec.session_id,
                proxy.split('@').last().unwrap_or("unknown")
            );
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        let config = builder.build().map_err(BrowserError::LaunchFailed)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        // Drain CDP events; when the handler ends, Chrome has disconnected.
        let session_id = spec.session_id.clone();
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("Session {} browser event error: {:?}", session_id, event);
                }
            }
            warn!("Session {} Chrome disconnected (event handler ended)", session_id);
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let driver = ChromePage {
            id: spec.session_id.clone(),
            browser: Mutex::new(Some(browser)),
            page,
            options: self.options.clone(),
        };
        driver.apply_identity(&spec.identity).await?;

        info!("Session {} browser ready", spec.session_id);
        Ok(BrowsingSession::new(spec.session_id.clone(), Arc::new(driver)))
    }
}

/// One Chrome page plus its owning browser process.
struct ChromePage {
    id: String,
    browser: Mutex<Option<Browser>>,
    page: Page,
    options: EngineOptions,
}

impl ChromePage {
    fn engine_err(e: impl std::fmt::Display) -> BrowserError {
        BrowserError::Engine(e.to_string())
    }

    /// Escape a CSS selector for embedding in a double-quoted JS string.
    fn js_quote(selector: &str) -> String {
        selector.replace('\\', "\\\\").replace('"', "\\\"")
    }
}

#[async_trait]
impl PageDriver for ChromePage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Session {} navigating to: {}", self.id, url);
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<(), BrowserError> {
        tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .map_err(|_| BrowserError::Timeout("Navigation timeout".into()))?
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn reload(&self) -> Result<(), BrowserError> {
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        Ok(())
    }

    async fn go_back(&self) -> Result<(), BrowserError> {
        self.page
            .evaluate("window.history.back()")
            .await
            .map_err(|e| BrowserError::NavigationFailed(e.to_string()))?;
        self.wait_for_navigation(Duration::from_secs(self.options.nav_timeout_secs))
            .await
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.page
            .url()
            .await
            .map_err(Self::engine_err)?
            .ok_or_else(|| BrowserError::Engine("No URL".into()))
    }

    async fn wait_for_visible(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "Selector not visible: {}",
                    selector
                )));
            }
            tokio::time::sleep(Duration::from_millis(self.options.poll_interval_ms)).await;
        }
    }

    async fn count(&self, selector: &str) -> Result<usize, BrowserError> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            // No matches surfaces as a node error on some Chrome versions
            Err(_) => Ok(0),
        }
    }

    async fn attribute_of_nth(
        &self,
        selector: &str,
        index: usize,
        attr: &str,
    ) -> Result<Option<String>, BrowserError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;
        let element = elements
            .get(index)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{}[{}]", selector, index)))?;
        element.attribute(attr).await.map_err(Self::engine_err)
    }

    async fn scroll_into_view_nth(
        &self,
        selector: &str,
        index: usize,
    ) -> Result<(), BrowserError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;
        let element = elements
            .get(index)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{}[{}]", selector, index)))?;
        element.scroll_into_view().await.map_err(Self::engine_err)?;
        Ok(())
    }

    async fn click_nth(&self, selector: &str, index: usize) -> Result<(), BrowserError> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(|e| BrowserError::ElementNotFound(format!("{}: {}", selector, e)))?;
        let element = elements
            .get(index)
            .ok_or_else(|| BrowserError::ElementNotFound(format!("{}[{}]", selector, index)))?;
        element.click().await.map_err(Self::engine_err)?;
        Ok(())
    }

    async fn clear_input(&self, selector: &str) -> Result<(), BrowserError> {
        let js = format!(
            r#"(function() {{
                const el = document.querySelector("{}");
                if (el) {{
                    el.focus();
                    el.value = '';
                    el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                }}
            }})()"#,
            Self::js_quote(selector)
        );
        self.page.evaluate(js).await.map_err(Self::engine_err)?;
        Ok(())
    }

    async fn type_char(&self, c: char) -> Result<(), BrowserError> {
        let key_down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyDown)
            .text(c.to_string())
            .build()
            .unwrap();
        self.page
            .execute(key_down)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP keyDown failed: {}", e)))?;

        let key_up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .build()
            .unwrap();
        self.page
            .execute(key_up)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP keyUp failed: {}", e)))?;
        Ok(())
    }

    async fn press_enter(&self) -> Result<(), BrowserError> {
        // rawKeyDown + char(\r) + keyUp is what a physical Enter produces and
        // what form submission handlers listen for.
        let key_down = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::RawKeyDown)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .unwrap();
        self.page
            .execute(key_down)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP Enter keyDown failed: {}", e)))?;

        let char_event = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::Char)
            .text("\r")
            .build()
            .unwrap();
        self.page
            .execute(char_event)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP Enter char failed: {}", e)))?;

        let key_up = DispatchKeyEventParams::builder()
            .r#type(DispatchKeyEventType::KeyUp)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13)
            .native_virtual_key_code(13)
            .build()
            .unwrap();
        self.page
            .execute(key_up)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP Enter keyUp failed: {}", e)))?;
        Ok(())
    }

    async fn scroll_by(&self, delta_y: i64) -> Result<(), BrowserError> {
        let scroll = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(400.0)
            .y(300.0)
            .button(MouseButton::None)
            .delta_x(0.0)
            .delta_y(delta_y as f64)
            .build()
            .unwrap();
        self.page
            .execute(scroll)
            .await
            .map_err(|e| BrowserError::Engine(format!("CDP scroll failed: {}", e)))?;
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<i64, BrowserError> {
        let result = self
            .page
            .evaluate("document.body.scrollHeight")
            .await
            .map_err(Self::engine_err)?;
        result.into_value::<i64>().map_err(Self::engine_err)
    }

    async fn apply_identity(&self, identity: &IdentityProfile) -> Result<(), BrowserError> {
        let platform = if identity.user_agent.contains("Windows") {
            "Win32"
        } else {
            "Linux x86_64"
        };

        let ua = SetUserAgentOverrideParams::builder()
            .user_agent(identity.user_agent.clone())
            .accept_language(identity.accept_language.clone())
            .platform(platform)
            .build()
            .map_err(BrowserError::Engine)?;
        self.page
            .execute(ua)
            .await
            .map_err(|e| BrowserError::LaunchFailed(format!("Failed to set UA override: {}", e)))?;

        self.page
            .execute(SetTimezoneOverrideParams::new(identity.timezone.clone()))
            .await
            .map_err(|e| {
                BrowserError::LaunchFailed(format!("Failed to set timezone override: {}", e))
            })?;

        if let Some(geo) = identity.geolocation {
            let params = SetGeolocationOverrideParams::builder()
                .latitude(geo.latitude)
                .longitude(geo.longitude)
                .accuracy(100.0)
                .build();
            self.page.execute(params).await.map_err(|e| {
                BrowserError::LaunchFailed(format!("Failed to set geolocation: {}", e))
            })?;
            info!(
                "Session {} geolocation overridden to ({}, {})",
                self.id, geo.latitude, geo.longitude
            );
        }

        let mask = AddScriptToEvaluateOnNewDocumentParams::builder()
            .source(identity.init_script.clone())
            .build()
            .map_err(BrowserError::Engine)?;
        self.page.execute(mask).await.map_err(|e| {
            BrowserError::LaunchFailed(format!("Failed to inject fingerprint masks: {}", e))
        })?;

        debug!(
            "Session {} identity applied (viewport {}x{}, tz {})",
            self.id, identity.viewport.0, identity.viewport.1, identity.timezone
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        // Close the page first to stop navigation and script execution, then
        // take the browser down. The grace period lets Chrome child processes
        // exit before the force kill.
        let _ = self.page.clone().close().await;

        {
            let mut browser = self.browser.lock().await;
            if let Some(mut b) = browser.take() {
                let _ = b.close().await;
                tokio::time::sleep(Duration::from_millis(500)).await;
                let _ = b.kill().await;
            }
        }

        info!("Session {} browser closed", self.id);
        Ok(())
    }
}
