/*!
 * Job progress tracking with throttled persistence.
 *
 * State is owned by one job; two jobs never share a throttle.
 */

use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Receives persisted progress values (0-100)
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, progress: f64) -> anyhow::Result<()>;
}

/// Sink that drops every update
#[derive(Debug, Default, Clone)]
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn report(&self, _progress: f64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Thresholds deciding when a progress value is worth persisting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressPolicy {
    /// Minimum increase between two writes
    pub step: f64,
    /// Progress above which the smaller tail step applies
    pub tail_start: f64,
    /// Minimum increase once past `tail_start`
    pub tail_step: f64,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            step: 15.0,
            tail_start: 90.0,
            tail_step: 10.0,
        }
    }
}

/// Remembers the last persisted value and applies the policy
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    policy: ProgressPolicy,
    last_persisted: f64,
}

impl ProgressThrottle {
    pub fn new(policy: ProgressPolicy) -> Self {
        Self {
            policy,
            last_persisted: 0.0,
        }
    }

    pub fn should_persist(&self, current: f64, force: bool) -> bool {
        if current < self.last_persisted {
            return false;
        }
        let delta = current - self.last_persisted;
        force
            || (self.last_persisted == 0.0 && current > 0.0)
            || delta >= self.policy.step
            || (current >= self.policy.tail_start && delta >= self.policy.tail_step)
    }

    pub fn mark_persisted(&mut self, value: f64) {
        self.last_persisted = value;
    }

    pub fn last_persisted(&self) -> f64 {
        self.last_persisted
    }
}

/// Completed / total as a percentage rounded to one decimal
pub fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = completed as f64 / total as f64 * 100.0;
    (raw * 10.0).round() / 10.0
}

struct TrackerState {
    completed: usize,
    throttle: ProgressThrottle,
}

/// Counts unit completions of one job and forwards throttled values to a sink.
///
/// The counter update and the sink write happen under one lock so persisted
/// values never go backwards.
pub struct ProgressTracker {
    total: usize,
    state: Mutex<TrackerState>,
    sink: Arc<dyn ProgressSink>,
}

impl ProgressTracker {
    pub fn new(total: usize, policy: ProgressPolicy, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            total,
            state: Mutex::new(TrackerState {
                completed: 0,
                throttle: ProgressThrottle::new(policy),
            }),
            sink,
        }
    }

    /// Record one finished unit, returning the new percentage
    pub async fn unit_completed(&self) -> f64 {
        let mut state = self.state.lock().await;
        state.completed = (state.completed + 1).min(self.total);
        let current = percent(state.completed, self.total);
        let finished = state.completed == self.total;
        if state.throttle.should_persist(current, finished) {
            match self.sink.report(current).await {
                Ok(()) => {
                    debug!("Progress persisted: {:.1}%", current);
                    state.throttle.mark_persisted(current);
                }
                Err(e) => warn!("Failed to persist progress {:.1}%: {}", current, e),
            }
        }
        current
    }

    pub async fn completed(&self) -> usize {
        self.state.lock().await.completed
    }
}
