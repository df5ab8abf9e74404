use crate::events::RunId;
use crate::launcher::RunningProcess;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    /// The generator process is alive.
    Running,
    /// The process has exited but frames are still expected.
    PollingOnly,
}

#[derive(Default)]
pub struct RunState {
    pub run: RunId,
    pub working_dir: PathBuf,
    pub next_expected_index: u32,
    pub total_expected: u32,
    pub process: Option<RunningProcess>,
    pub is_running: bool,
    pub polling: bool,
}

impl RunState {
    pub fn phase(&self) -> RunPhase {
        if self.is_running {
            RunPhase::Running
        } else if self.polling && !self.is_complete() {
            RunPhase::PollingOnly
        } else {
            RunPhase::Idle
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_expected_index >= self.total_expected
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run: self.run,
            phase: self.phase(),
            next_expected_index: self.next_expected_index,
            total_expected: self.total_expected,
            is_running: self.is_running,
            polling: self.polling,
        }
    }
}

/// Read-only view handed to the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSnapshot {
    pub run: RunId,
    pub phase: RunPhase,
    pub next_expected_index: u32,
    pub total_expected: u32,
    pub is_running: bool,
    pub polling: bool,
}

impl RunSnapshot {
    pub fn progress(&self) -> f32 {
        if self.total_expected == 0 {
            0.0
        } else {
            self.next_expected_index as f32 / self.total_expected as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_tracks_process_and_cursor() {
        let mut state = RunState {
            total_expected: 3,
            is_running: true,
            polling: true,
            ..RunState::default()
        };
        assert_eq!(state.phase(), RunPhase::Running);

        state.is_running = false;
        assert_eq!(state.phase(), RunPhase::PollingOnly);

        state.next_expected_index = 3;
        assert_eq!(state.phase(), RunPhase::Idle);
    }

    #[test]
    fn snapshot_progress_handles_empty_run() {
        assert_eq!(RunState::default().snapshot().progress(), 0.0);
        let state = RunState {
            next_expected_index: 1,
            total_expected: 4,
            ..RunState::default()
        };
        assert_eq!(state.snapshot().progress(), 0.25);
    }
}
