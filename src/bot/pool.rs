//! Session pool
//!
//! Fans session runs out across concurrent tasks, one per configuration,
//! with round-robin proxy assignment and cooperative cancellation.

use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use tracing::{error, info};

use super::{CancelFlag, SessionOrchestrator, SessionOutcome, SessionResult};
use crate::browser::BrowserEngine;
use crate::config::SessionConfig;

/// Runs one session per configuration, all concurrently.
pub struct SessionPool {
    engine: Arc<dyn BrowserEngine>,
    proxies: Vec<String>,
    cancel: CancelFlag,
}

impl SessionPool {
    pub fn new(engine: Arc<dyn BrowserEngine>, proxies: Vec<String>) -> Self {
        Self {
            engine,
            proxies,
            cancel: CancelFlag::new(),
        }
    }

    /// Cancellation handle shared with all sessions.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Request cooperative shutdown of in-flight sessions.
    pub fn cancel(&self) {
        info!("Pool cancellation requested");
        self.cancel.cancel();
    }

    /// Run every configuration to a result.
    ///
    /// All sessions start together. The output preserves input order:
    /// result `i` corresponds to configuration `i`. A session's panic or
    /// error never affects its siblings.
    pub async fn run(&self, configs: Vec<SessionConfig>) -> Vec<SessionResult> {
        info!("Starting {} sessions", configs.len());

        let mut tasks = Vec::with_capacity(configs.len());
        for (index, mut config) in configs.into_iter().enumerate() {
            if config.proxy.is_none() {
                config.proxy = self.assign_proxy(index);
            }

            let orchestrator =
                SessionOrchestrator::new(index, config, self.engine.clone(), self.cancel.clone());

            tasks.push(tokio::spawn(async move {
                let session_id = format!("session-{}", index + 1);
                match std::panic::AssertUnwindSafe(orchestrator.run())
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result,
                    Err(panic) => {
                        let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                            s.to_string()
                        } else if let Some(s) = panic.downcast_ref::<String>() {
                            s.clone()
                        } else {
                            "unknown panic".to_string()
                        };
                        error!("Session {} panicked: {}", session_id, msg);
                        SessionResult {
                            session_id,
                            index,
                            outcome: SessionOutcome::Failed(format!("panic: {}", msg)),
                        }
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(tasks.len());
        for (index, task) in join_all(tasks).await.into_iter().enumerate() {
            results.push(task.unwrap_or_else(|e| {
                error!("Session task {} aborted: {}", index + 1, e);
                SessionResult {
                    session_id: format!("session-{}", index + 1),
                    index,
                    outcome: SessionOutcome::Failed(format!("task aborted: {}", e)),
                }
            }));
        }

        info!("All {} sessions finished", results.len());
        results
    }

    /// Round-robin proxy by session index, if a list is configured.
    fn assign_proxy(&self, index: usize) -> Option<String> {
        if self.proxies.is_empty() {
            None
        } else {
            Some(self.proxies[index % self.proxies.len()].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::behavior::pacing::DelayRange;
    use crate::browser::fake::{FakeEngine, FakeLink, FakePage};

    fn config() -> SessionConfig {
        SessionConfig {
            query: "query".to_string(),
            target: "example.com".to_string(),
            proxy: None,
            search_domain: "google.fr".to_string(),
            locale: "fr-FR".to_string(),
            use_geolocation: false,
            detour_count: 0,
            site_page_count: 1,
            site_time_budget_ms: 2_000,
            typing_delay: DelayRange::new(50, 150),
            max_pages: 2,
        }
    }

    fn success_page() -> Arc<FakePage> {
        Arc::new(FakePage::new(vec![vec![FakeLink::organic(
            "https://www.example.com/",
        )]]))
    }

    #[tokio::test(start_paused = true)]
    async fn results_preserve_input_order_and_isolate_failures() {
        let engine = Arc::new(FakeEngine::new());
        engine.fail_launch("session-1");
        engine.script("session-2", success_page());

        let pool = SessionPool::new(engine, Vec::new());
        let results = pool.run(vec![config(), config()]).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert!(matches!(results[0].outcome, SessionOutcome::Failed(_)));
        assert_eq!(results[1].index, 1);
        assert_eq!(results[1].outcome, SessionOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn proxies_rotate_round_robin_by_index() {
        let engine = Arc::new(FakeEngine::new());
        for i in 1..=3 {
            engine.script(&format!("session-{}", i), success_page());
        }

        let pool = SessionPool::new(
            engine.clone(),
            vec!["http://p1:8080".to_string(), "http://p2:8080".to_string()],
        );
        pool.run(vec![config(), config(), config()]).await;

        let mut launches = engine.launches.lock().unwrap().clone();
        launches.sort();
        assert_eq!(launches[0], ("session-1".to_string(), Some("http://p1:8080".to_string())));
        assert_eq!(launches[1], ("session-2".to_string(), Some("http://p2:8080".to_string())));
        assert_eq!(launches[2], ("session-3".to_string(), Some("http://p1:8080".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_fails_in_flight_sessions() {
        let engine = Arc::new(FakeEngine::new());
        engine.script("session-1", success_page());

        let pool = SessionPool::new(engine, Vec::new());
        pool.cancel();
        let results = pool.run(vec![config()]).await;

        match &results[0].outcome {
            SessionOutcome::Failed(cause) => assert!(cause.contains("cancelled")),
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
