use std::sync::Arc;
use std::time::Duration;

/// Emitted once per finished VU (or registration).
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub completed: u64,
    pub total: u64,
    pub elapsed: Duration,
    pub max_duration: Duration,
    pub checks_failed_total: u64,
}

pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
