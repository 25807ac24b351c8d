//! Session orchestration and pooling

mod orchestrator;
mod pool;

pub use orchestrator::{SessionOrchestrator, SessionOutcome, SessionResult};
pub use pool::SessionPool;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between the pool and its sessions.
///
/// Advisory: sessions check it between major steps; nothing is killed
/// mid-primitive.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
