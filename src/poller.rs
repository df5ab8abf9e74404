use crate::events::{EventSink, RunEvent, RunId};
use crate::frames::{frame_path, load_frame, Frame};
use crate::state::RunState;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug)]
pub enum PollOutcome {
    /// Every expected frame has been seen.
    Idle,
    /// The next file does not exist yet.
    Waiting,
    /// The file exists but could not be decoded; retried next tick.
    NotReady,
    Advanced(Frame),
}

/// One poll step. Advances the cursor by at most one frame.
pub fn poll_once(state: &mut RunState) -> PollOutcome {
    if state.is_complete() {
        return PollOutcome::Idle;
    }

    let index = state.next_expected_index;
    if !frame_path(&state.working_dir, index).is_file() {
        return PollOutcome::Waiting;
    }

    match load_frame(&state.working_dir, index) {
        Some(frame) => {
            state.next_expected_index += 1;
            log::debug!(
                "Frame {} ready ({}/{})",
                index,
                state.next_expected_index,
                state.total_expected
            );
            PollOutcome::Advanced(frame)
        }
        None => PollOutcome::NotReady,
    }
}

/// Fixed-interval tick source for one run.
pub struct PollTimer {
    handle: JoinHandle<()>,
}

impl PollTimer {
    pub fn start(runtime: &Handle, interval: Duration, run: RunId, events: EventSink) -> Self {
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if !events.post(RunEvent::Tick { run }) {
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event_queue;
    use crate::frames::test_support::write_frame;
    use std::fs;

    fn state_for(dir: &std::path::Path, total: u32) -> RunState {
        RunState {
            working_dir: dir.to_path_buf(),
            total_expected: total,
            polling: true,
            ..RunState::default()
        }
    }

    #[test]
    fn advances_once_per_tick_until_done() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..4 {
            write_frame(dir.path(), i, i as u8 * 40);
        }
        let mut state = state_for(dir.path(), 4);

        for expected in 0..4 {
            match poll_once(&mut state) {
                PollOutcome::Advanced(frame) => assert_eq!(frame.index, expected),
                other => panic!("unexpected {:?}", other),
            }
            assert_eq!(state.next_expected_index, expected + 1);
        }
        assert!(matches!(poll_once(&mut state), PollOutcome::Idle));
        assert_eq!(state.next_expected_index, 4);
    }

    #[test]
    fn never_skips_a_missing_frame() {
        let dir = tempfile::tempdir().unwrap();
        for i in [0, 2, 3] {
            write_frame(dir.path(), i, 50);
        }
        let mut state = state_for(dir.path(), 4);
        assert!(matches!(poll_once(&mut state), PollOutcome::Advanced(_)));
        for _ in 0..5 {
            assert!(matches!(poll_once(&mut state), PollOutcome::Waiting));
            assert_eq!(state.next_expected_index, 1);
        }

        write_frame(dir.path(), 1, 50);
        assert!(matches!(poll_once(&mut state), PollOutcome::Advanced(_)));
        assert_eq!(state.next_expected_index, 2);
    }

    #[test]
    fn partially_written_file_is_retried_silently() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(frame_path(dir.path(), 0), b"\x89PNG").unwrap();
        let mut state = state_for(dir.path(), 1);

        assert!(matches!(poll_once(&mut state), PollOutcome::NotReady));
        assert_eq!(state.next_expected_index, 0);

        write_frame(dir.path(), 0, 90);
        assert!(matches!(poll_once(&mut state), PollOutcome::Advanced(_)));
    }

    #[tokio::test]
    async fn timer_posts_ticks_until_stopped() {
        let (sink, mut rx) = event_queue(None);
        let timer = PollTimer::start(&Handle::current(), Duration::from_millis(5), 7, sink);

        for _ in 0..3 {
            match rx.recv().await {
                Some(RunEvent::Tick { run }) => assert_eq!(run, 7),
                other => panic!("unexpected {:?}", other),
            }
        }
        timer.stop();
        drop(timer);
    }
}
