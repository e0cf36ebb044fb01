use std::sync::{Mutex, PoisonError};

/// Aggregate status of the most recent deployments refresh.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchState {
    #[default]
    Idle,
    Loading,
    Finished,
    Error,
}

impl FetchState {
    pub fn label(&self) -> &'static str {
        match self {
            FetchState::Idle => "idle",
            FetchState::Loading => "loading",
            FetchState::Finished => "finished",
            FetchState::Error => "error",
        }
    }
}

#[derive(Debug, Default)]
pub struct FetchStateTracker {
    state: Mutex<FetchState>,
}

impl FetchStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> FetchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Only show `Loading` when there is nothing cached to show instead;
    /// refreshing populated data stays `Idle` so observers do not flicker.
    pub fn begin(&self, has_cached_deployments: bool) -> FetchState {
        let next = if has_cached_deployments {
            FetchState::Idle
        } else {
            FetchState::Loading
        };
        self.set(next)
    }

    pub fn complete(&self, succeeded: bool) -> FetchState {
        self.set(if succeeded {
            FetchState::Finished
        } else {
            FetchState::Error
        })
    }

    fn set(&self, next: FetchState) -> FetchState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        assert_eq!(FetchStateTracker::new().current(), FetchState::Idle);
    }

    #[test]
    fn empty_cache_shows_loading() {
        let tracker = FetchStateTracker::new();
        assert_eq!(tracker.begin(false), FetchState::Loading);
        assert_eq!(tracker.current(), FetchState::Loading);
    }

    #[test]
    fn populated_cache_stays_idle() {
        let tracker = FetchStateTracker::new();
        assert_eq!(tracker.begin(true), FetchState::Idle);
        assert_eq!(tracker.current(), FetchState::Idle);
    }

    #[test]
    fn completion_outcomes() {
        let tracker = FetchStateTracker::new();
        tracker.begin(false);
        assert_eq!(tracker.complete(true), FetchState::Finished);
        tracker.begin(true);
        assert_eq!(tracker.complete(false), FetchState::Error);
        assert_eq!(tracker.current(), FetchState::Error);
    }
}
