//! Application and session configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::behavior::pacing::DelayRange;

/// Immutable configuration for one session.
///
/// Owned exclusively by one orchestrator once the session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Query term typed into the engine
    pub query: String,
    /// Target URL or domain fragment to locate in the results
    pub target: String,
    /// Proxy URL assigned to this session, if any
    #[serde(default)]
    pub proxy: Option<String>,
    /// Search engine domain, e.g. "google.fr"
    pub search_domain: String,
    /// Locale tag, e.g. "fr-FR"
    pub locale: String,
    /// Override geolocation with the region's coordinates
    pub use_geolocation: bool,
    /// Competitor results to visit before the primary scan
    pub detour_count: usize,
    /// On-site pages to walk after the target is reached
    pub site_page_count: usize,
    /// On-site time budget in milliseconds across all walked pages
    pub site_time_budget_ms: u64,
    /// Per-character typing delay bounds
    pub typing_delay: DelayRange,
    /// Maximum SERP pages to scan
    pub max_pages: usize,
}

impl SessionConfig {
    /// Engine homepage for this session's region.
    pub fn engine_url(&self) -> String {
        format!("https://www.{}/", self.search_domain)
    }

    /// Direct search URL for the configured query (used for recovery).
    pub fn search_url(&self) -> String {
        format!(
            "https://www.{}/search?q={}&hl={}&num=10&pws=0",
            self.search_domain,
            urlencoding::encode(&self.query),
            self.locale.split(['-', '_']).next().unwrap_or("en")
        )
    }
}

/// Top-level application configuration, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Search keyword shared by all sessions
    pub keyword: String,
    /// Target site to locate
    pub target_site: String,
    /// Concurrent sessions to run
    pub session_count: usize,
    #[serde(default)]
    pub use_proxies: bool,
    #[serde(default)]
    pub proxies: Vec<String>,
    pub search_domain: String,
    pub locale: String,
    #[serde(default)]
    pub use_geolocation: bool,
    #[serde(default)]
    pub detour_count: usize,
    pub pages_to_visit: usize,
    /// Seconds to spend on the target site
    pub time_on_site_secs: u64,
    pub min_type_delay_ms: u64,
    pub max_type_delay_ms: u64,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    pub headless: bool,
    #[serde(default)]
    pub chrome_path: Option<String>,
}

fn default_max_pages() -> usize {
    10
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            keyword: String::new(),
            target_site: String::new(),
            session_count: 3,
            use_proxies: false,
            proxies: Vec::new(),
            search_domain: "google.fr".to_string(),
            locale: "fr-FR".to_string(),
            use_geolocation: false,
            detour_count: 0,
            pages_to_visit: 3,
            time_on_site_secs: 30,
            min_type_delay_ms: 100,
            max_type_delay_ms: 300,
            max_pages: default_max_pages(),
            headless: false,
            chrome_path: None,
        }
    }
}

impl AppConfig {
    /// Config file path under the platform config dir.
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("serpwalk").join("config.json"))
    }

    /// Load the saved config, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str(&content) {
                        Ok(config) => {
                            info!("Loaded config from {:?}", path);
                            return config;
                        }
                        Err(e) => {
                            warn!("Failed to parse config file: {}", e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read config file: {}", e);
                    }
                }
            }
        }
        Self::default()
    }

    /// Load a config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {:?}: {}", path, e))
    }

    /// Save the config to the default path.
    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    error!("Failed to create config directory: {}", e);
                    return;
                }
            }

            match serde_json::to_string_pretty(self) {
                Ok(content) => {
                    if let Err(e) = std::fs::write(&path, content) {
                        error!("Failed to save config: {}", e);
                    } else {
                        info!("Config saved to {:?}", path);
                    }
                }
                Err(e) => {
                    error!("Failed to serialize config: {}", e);
                }
            }
        }
    }

    /// One `SessionConfig` per requested session, all sharing the query and
    /// target. Proxies are assigned later by the pool.
    pub fn session_configs(&self) -> Vec<SessionConfig> {
        (0..self.session_count)
            .map(|_| SessionConfig {
                query: self.keyword.clone(),
                target: self.target_site.clone(),
                proxy: None,
                search_domain: self.search_domain.clone(),
                locale: self.locale.clone(),
                use_geolocation: self.use_geolocation,
                detour_count: self.detour_count,
                site_page_count: self.pages_to_visit,
                site_time_budget_ms: self.time_on_site_secs * 1000,
                typing_delay: DelayRange::new(self.min_type_delay_ms, self.max_type_delay_ms),
                max_pages: self.max_pages,
            })
            .collect()
    }

    /// Proxy list handed to the pool (empty when proxies are disabled).
    pub fn proxy_list(&self) -> Vec<String> {
        if self.use_proxies {
            self.proxies.clone()
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.session_count, 3);
        assert_eq!(config.search_domain, "google.fr");
        assert_eq!(config.max_pages, 10);
        assert!(!config.use_proxies);
    }

    #[test]
    fn session_configs_share_query_and_target() {
        let config = AppConfig {
            keyword: "used cars".to_string(),
            target_site: "example.com".to_string(),
            session_count: 4,
            time_on_site_secs: 20,
            ..Default::default()
        };

        let sessions = config.session_configs();
        assert_eq!(sessions.len(), 4);
        for session in &sessions {
            assert_eq!(session.query, "used cars");
            assert_eq!(session.target, "example.com");
            assert_eq!(session.site_time_budget_ms, 20_000);
            assert!(session.proxy.is_none());
        }
    }

    #[test]
    fn search_url_encodes_the_query() {
        let config = AppConfig {
            keyword: "used cars lyon".to_string(),
            target_site: "example.com".to_string(),
            ..Default::default()
        };
        let session = &config.session_configs()[0];
        assert_eq!(
            session.search_url(),
            "https://www.google.fr/search?q=used%20cars%20lyon&hl=fr&num=10&pws=0"
        );
    }

    #[test]
    fn proxy_list_empty_when_disabled() {
        let config = AppConfig {
            proxies: vec!["http://p1:8080".to_string()],
            use_proxies: false,
            ..Default::default()
        };
        assert!(config.proxy_list().is_empty());
    }
}
