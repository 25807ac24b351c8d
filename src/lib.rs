//! SerpWalk
//!
//! Multi-session "search -> locate -> visit" automation: each session types a
//! query into a search engine, scans paginated results for a target
//! destination, optionally detours through competing results, then walks the
//! target site with human-like pacing. Sessions run concurrently, each with
//! its own browser identity and proxy.

pub mod behavior;
pub mod bot;
pub mod browser;
pub mod config;
pub mod identity;

use std::path::PathBuf;

pub use bot::{CancelFlag, SessionOutcome, SessionPool, SessionResult};
pub use config::{AppConfig, SessionConfig};

/// Log directory under the platform config dir.
pub fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("serpwalk").join("logs"))
}

/// Initialize logging: console layer plus a daily-rolling file layer.
pub fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    if let Some(log_dir) = log_dir() {
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "serpwalk.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(non_blocking);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .init();

        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .init();

        None
    }
}
