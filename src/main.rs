//! SerpWalk headless runner
//!
//! Usage: `serpwalk [config.json]`
//!
//! Loads the JSON configuration (falling back to the saved config under the
//! platform config dir), runs the configured sessions and logs a summary.

use std::sync::Arc;

use anyhow::bail;
use tracing::{info, warn};

use serpwalk::browser::{ChromeEngine, EngineOptions};
use serpwalk::{AppConfig, SessionOutcome, SessionPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = serpwalk::init_logging();

    info!("Starting SerpWalk");
    if let Some(dir) = serpwalk::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from(std::path::Path::new(&path))
            .map_err(anyhow::Error::msg)?,
        None => AppConfig::load(),
    };

    if config.keyword.is_empty() || config.target_site.is_empty() {
        bail!("config must set keyword and target_site");
    }

    info!(
        "Running {} sessions for '{}' -> {}",
        config.session_count, config.keyword, config.target_site
    );

    let engine = Arc::new(ChromeEngine::new(EngineOptions {
        chrome_path: config.chrome_path.clone(),
        headless: config.headless,
        ..EngineOptions::default()
    }));

    let pool = SessionPool::new(engine, config.proxy_list());

    // Ctrl-C requests cooperative shutdown; sessions stop at the next step
    // boundary.
    let cancel = pool.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received - cancelling sessions");
            cancel.cancel();
        }
    });

    let results = pool.run(config.session_configs()).await;

    let mut success = 0usize;
    let mut not_found = 0usize;
    let mut failed = 0usize;
    for result in &results {
        match &result.outcome {
            SessionOutcome::Success => success += 1,
            SessionOutcome::TargetNotFound => not_found += 1,
            SessionOutcome::Failed(cause) => {
                warn!("Session {} failed: {}", result.session_id, cause);
                failed += 1;
            }
        }
    }
    info!(
        "Run complete: {} success, {} target-not-found, {} failed",
        success, not_found, failed
    );

    Ok(())
}
