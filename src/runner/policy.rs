//! Runtime policy - cooperative cancellation between steps.
//!
//! A tick checks this policy at step boundaries only; an in-flight model
//! call is never interrupted (its own timeout bounds it). The policy is
//! explicit per-run state with no shared statics.

use std::time::{Duration, Instant};

/// Wall-clock and iteration-count limits for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimePolicy {
    /// Stop after this many step iterations, if set
    pub max_iterations: Option<u32>,
    /// Stop after this much wall time, if set
    pub max_wall_time: Option<Duration>,
}

impl RuntimePolicy {
    /// A policy with no limits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Limit total step iterations.
    #[must_use]
    pub fn with_max_iterations(mut self, iterations: u32) -> Self {
        self.max_iterations = Some(iterations);
        self
    }

    /// Limit total wall time.
    #[must_use]
    pub fn with_max_wall_time(mut self, limit: Duration) -> Self {
        self.max_wall_time = Some(limit);
        self
    }

    /// Start tracking a run under this policy.
    #[must_use]
    pub fn start(self) -> PolicyState {
        PolicyState {
            policy: self,
            started: Instant::now(),
            iterations: 0,
        }
    }
}

/// Why a run was told to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// Iteration budget exhausted
    IterationLimit,
    /// Wall-clock budget exhausted
    WallTimeLimit,
}

impl std::fmt::Display for StopCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IterationLimit => write!(f, "iteration limit reached"),
            Self::WallTimeLimit => write!(f, "wall time limit reached"),
        }
    }
}

/// Live counters for one run under a [`RuntimePolicy`].
#[derive(Debug, Clone)]
pub struct PolicyState {
    policy: RuntimePolicy,
    started: Instant,
    iterations: u32,
}

impl PolicyState {
    /// Record one completed step iteration.
    pub fn record_iteration(&mut self) {
        self.iterations += 1;
    }

    /// Check whether the run should stop now. Called between steps.
    #[must_use]
    pub fn should_stop(&self) -> Option<StopCause> {
        if let Some(max) = self.policy.max_iterations {
            if self.iterations >= max {
                return Some(StopCause::IterationLimit);
            }
        }
        if let Some(limit) = self.policy.max_wall_time {
            if self.started.elapsed() >= limit {
                return Some(StopCause::WallTimeLimit);
            }
        }
        None
    }

    /// Iterations recorded so far.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_never_stops() {
        let mut state = RuntimePolicy::unlimited().start();
        for _ in 0..1000 {
            state.record_iteration();
        }
        assert_eq!(state.should_stop(), None);
    }

    #[test]
    fn test_iteration_limit() {
        let mut state = RuntimePolicy::unlimited().with_max_iterations(2).start();
        assert_eq!(state.should_stop(), None);
        state.record_iteration();
        assert_eq!(state.should_stop(), None);
        state.record_iteration();
        assert_eq!(state.should_stop(), Some(StopCause::IterationLimit));
    }

    #[test]
    fn test_wall_time_limit() {
        let state = RuntimePolicy::unlimited()
            .with_max_wall_time(Duration::ZERO)
            .start();
        assert_eq!(state.should_stop(), Some(StopCause::WallTimeLimit));
    }
}
