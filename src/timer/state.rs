use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Finished,
}

/// Lifecycle of the countdown. The remaining seconds live in the state
/// store (`CurrentTimer`); this only tracks where the run is.
#[derive(Debug, Clone, Default)]
pub struct TimerState {
    pub status: TimerStatus,
    /// Bumped on every start so a stale ticker can tell it was replaced.
    pub run: u64,
}

impl TimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_start(&self) -> bool {
        self.status != TimerStatus::Running
    }

    pub fn begin_run(&mut self) -> u64 {
        self.status = TimerStatus::Running;
        self.run = self.run.wrapping_add(1);
        self.run
    }

    pub fn pause(&mut self) -> bool {
        if self.status == TimerStatus::Running {
            self.status = TimerStatus::Paused;
            true
        } else {
            false
        }
    }

    /// Moves to `Finished`. Returns `false` when the run already finished,
    /// which keeps the finish path to a single execution.
    pub fn finish(&mut self) -> bool {
        if self.status == TimerStatus::Finished {
            return false;
        }
        self.status = TimerStatus::Finished;
        true
    }

    pub fn reset(&mut self) {
        self.status = TimerStatus::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_only_succeeds_once_per_run() {
        let mut state = TimerState::new();
        let first = state.begin_run();
        assert!(state.finish());
        assert!(!state.finish());

        state.reset();
        let second = state.begin_run();
        assert_ne!(first, second);
        assert!(state.finish());
    }

    #[test]
    fn pause_requires_a_running_timer() {
        let mut state = TimerState::new();
        assert!(!state.pause());
        state.begin_run();
        assert!(state.pause());
        assert_eq!(state.status, TimerStatus::Paused);
        assert!(state.can_start());
    }
}
