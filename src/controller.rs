// Ticks, process exits and assembly results are handled one at a time.

use crate::args::{build_args, BuiltArgs};
use crate::assembler::{assemble_animation, AssemblyReport};
use crate::config::{GeneratorPaths, RunConfig};
use crate::error::PanelError;
use crate::events::{event_queue, EventSink, Notifier, RunEvent, RunId};
use crate::frames::{load_frame, Frame};
use crate::launcher::{launch, LaunchRequest, RunningProcess};
use crate::poller::{poll_once, PollOutcome, PollTimer};
use crate::settings::Settings;
use crate::state::{RunSnapshot, RunState};
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

/// Notifications for the display layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RunUpdate {
    /// The displayed frame changed.
    FrameShown(u32),
    Progress { index: u32, total: u32 },
    /// Emitted once per poll tick.
    Refresh,
    ProcessExited { code: Option<i32> },
    /// Every expected frame was observed and the process has exited.
    Completed,
    AssemblyDone(AssemblyReport),
    AssemblyFailed(String),
}

#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub run: RunId,
    pub built: BuiltArgs,
}

pub struct RunController {
    runtime: Handle,
    settings: Settings,
    paths: GeneratorPaths,
    state: RunState,
    timer: Option<PollTimer>,
    sink: EventSink,
    events: UnboundedReceiver<RunEvent>,
    display: Option<Frame>,
    display_revision: u64,
    assembling: bool,
}

impl RunController {
    pub fn new(
        runtime: Handle,
        paths: GeneratorPaths,
        settings: Settings,
        notify: Option<Notifier>,
    ) -> Self {
        let (sink, events) = event_queue(notify);
        Self {
            runtime,
            settings,
            paths,
            state: RunState::default(),
            timer: None,
            sink,
            events,
            display: None,
            display_revision: 0,
            assembling: false,
        }
    }

    pub fn paths(&self) -> &GeneratorPaths {
        &self.paths
    }

    pub fn set_paths(&mut self, paths: GeneratorPaths) {
        self.paths = paths;
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.state.snapshot()
    }

    /// Directory frames are read from: the active run's, or the configured one.
    pub fn working_dir(&self) -> PathBuf {
        if self.state.run == 0 {
            self.paths.working_dir()
        } else {
            self.state.working_dir.clone()
        }
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.display.as_ref()
    }

    /// Bumped whenever the displayed frame changes.
    pub fn display_revision(&self) -> u64 {
        self.display_revision
    }

    pub fn is_assembling(&self) -> bool {
        self.assembling
    }

    /// Build arguments and launch a new run.
    ///
    /// On failure the previous run's state is left as it was.
    pub fn start_run(&mut self, config: &RunConfig) -> Result<StartOutcome, PanelError> {
        if self.state.is_running {
            return Err(PanelError::RunInProgress);
        }

        let built = build_args(config, &self.paths);
        if let Some(warning) = built.warning {
            log::warn!("{}", warning);
        }

        let run = self.state.run + 1;
        let request = LaunchRequest {
            paths: &self.paths,
            built: &built,
            command_log_file: &self.settings.command_log_file,
            cleanup_scan_limit: self.settings.cleanup_scan_limit,
        };
        let process = launch(&self.runtime, &request, run, self.sink.clone())?;

        let working_dir = self.paths.working_dir();
        self.reset_for_run(run, working_dir, built.count, Some(process));
        self.timer = Some(PollTimer::start(
            &self.runtime,
            self.settings.poll_interval(),
            run,
            self.sink.clone(),
        ));

        Ok(StartOutcome { run, built })
    }

    fn reset_for_run(
        &mut self,
        run: RunId,
        working_dir: PathBuf,
        total: u32,
        process: Option<RunningProcess>,
    ) {
        self.cancel_polling();
        self.state = RunState {
            run,
            working_dir,
            next_expected_index: 0,
            total_expected: total,
            is_running: process.is_some(),
            process,
            polling: true,
        };
    }

    /// Stop the poll timer. The generator process keeps running.
    pub fn cancel_polling(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop();
        }
        self.state.polling = false;
    }

    /// Run one poll step against the working directory.
    pub fn tick(&mut self) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        if !self.state.polling {
            return updates;
        }

        match poll_once(&mut self.state) {
            PollOutcome::Advanced(frame) => {
                updates.push(RunUpdate::FrameShown(frame.index));
                updates.push(RunUpdate::Progress {
                    index: self.state.next_expected_index,
                    total: self.state.total_expected,
                });
                self.show(frame);
            }
            PollOutcome::Idle | PollOutcome::Waiting | PollOutcome::NotReady => {}
        }

        if self.state.is_complete() {
            self.cancel_polling();
            if !self.state.is_running {
                updates.push(RunUpdate::Completed);
            }
        }

        updates.push(RunUpdate::Refresh);
        updates
    }

    pub fn handle_event(&mut self, event: RunEvent) -> Vec<RunUpdate> {
        match event {
            RunEvent::Tick { run } if run == self.state.run => self.tick(),
            RunEvent::ProcessExited { run, code } if run == self.state.run => {
                self.state.is_running = false;
                self.state.process = None;
                let mut updates = vec![RunUpdate::ProcessExited { code }];
                if self.state.is_complete() {
                    updates.push(RunUpdate::Completed);
                }
                updates
            }
            RunEvent::Tick { .. } | RunEvent::ProcessExited { .. } => {
                log::trace!("Discarding event from an earlier run");
                Vec::new()
            }
            RunEvent::AssemblyFinished(result) => {
                self.assembling = false;
                match result {
                    Ok(report) => vec![RunUpdate::AssemblyDone(report)],
                    Err(e) => vec![RunUpdate::AssemblyFailed(e.to_string())],
                }
            }
        }
    }

    /// Drain every queued event without blocking.
    pub fn pump(&mut self) -> Vec<RunUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            updates.extend(self.handle_event(event));
        }
        updates
    }

    /// Wait for the next event and process it.
    pub async fn next_updates(&mut self) -> Vec<RunUpdate> {
        match self.events.recv().await {
            Some(event) => self.handle_event(event),
            None => Vec::new(),
        }
    }

    /// Display an already produced frame without moving the cursor.
    pub fn seek(&mut self, index: u32) -> Option<u32> {
        if index > self.state.next_expected_index {
            return None;
        }
        let frame = load_frame(&self.working_dir(), index)?;
        self.show(frame);
        Some(index)
    }

    /// Highest index [`seek`](Self::seek) may be asked for in the current run.
    pub fn seek_limit(&self) -> u32 {
        self.state
            .next_expected_index
            .min(self.state.total_expected.saturating_sub(1))
    }

    fn show(&mut self, frame: Frame) {
        self.display = Some(frame);
        self.display_revision += 1;
    }

    /// Frame count used for assembly: the active run's, or `fallback` before any run.
    pub fn assembly_total(&self, fallback: u32) -> u32 {
        if self.state.run == 0 {
            fallback
        } else {
            self.state.total_expected
        }
    }

    /// Assemble on the calling thread.
    pub fn assemble(&self, total: u32, output: &Path) -> Result<AssemblyReport, PanelError> {
        assemble_animation(
            &self.working_dir(),
            total,
            output,
            self.settings.frame_delay_ms,
        )
    }

    /// Assemble on the blocking pool; the result arrives as [`RunUpdate::AssemblyDone`]
    /// or [`RunUpdate::AssemblyFailed`]. Returns false if an assembly is already running.
    pub fn assemble_in_background(&mut self, total: u32, output: PathBuf) -> bool {
        if self.assembling {
            return false;
        }
        self.assembling = true;

        let dir = self.working_dir();
        let delay = self.settings.frame_delay_ms;
        let sink = self.sink.clone();
        self.runtime.spawn_blocking(move || {
            let result = assemble_animation(&dir, total, &output, delay);
            sink.post(RunEvent::AssemblyFinished(result));
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::test_support::write_frame;
    use crate::state::RunPhase;

    fn controller(dir: &Path) -> RunController {
        let paths = GeneratorPaths::new(dir.join("bin"), "stylegan");
        RunController::new(Handle::current(), paths, Settings::default(), None)
    }

    #[tokio::test]
    async fn ticks_advance_then_exit_completes_run() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write_frame(dir.path(), i, 30);
        }
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 3, None);
        ctl.state.is_running = true;

        for expected in 1..=3 {
            let updates = ctl.tick();
            assert!(updates.contains(&RunUpdate::Progress {
                index: expected,
                total: 3
            }));
            assert_eq!(updates.last(), Some(&RunUpdate::Refresh));
        }
        assert_eq!(ctl.snapshot().phase, RunPhase::Running);
        assert!(!ctl.snapshot().polling);
        assert_eq!(ctl.current_frame().map(|f| f.index), Some(2));

        let updates = ctl.handle_event(RunEvent::ProcessExited { run: 1, code: Some(0) });
        assert_eq!(
            updates,
            vec![
                RunUpdate::ProcessExited { code: Some(0) },
                RunUpdate::Completed
            ]
        );
        assert_eq!(ctl.snapshot().phase, RunPhase::Idle);
    }

    #[tokio::test]
    async fn polling_continues_after_process_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 2, None);

        let updates = ctl.handle_event(RunEvent::ProcessExited { run: 1, code: Some(1) });
        assert_eq!(updates, vec![RunUpdate::ProcessExited { code: Some(1) }]);
        assert_eq!(ctl.snapshot().phase, RunPhase::PollingOnly);

        write_frame(dir.path(), 0, 1);
        write_frame(dir.path(), 1, 2);
        ctl.handle_event(RunEvent::Tick { run: 1 });
        let updates = ctl.handle_event(RunEvent::Tick { run: 1 });
        assert!(updates.contains(&RunUpdate::Completed));
        assert_eq!(ctl.snapshot().phase, RunPhase::Idle);
    }

    #[tokio::test]
    async fn events_from_earlier_runs_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 0, 1);
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(2, dir.path().to_path_buf(), 1, None);
        ctl.state.is_running = true;

        assert!(ctl
            .handle_event(RunEvent::ProcessExited { run: 1, code: None })
            .is_empty());
        assert!(ctl.handle_event(RunEvent::Tick { run: 1 }).is_empty());
        assert!(ctl.snapshot().is_running);
        assert_eq!(ctl.snapshot().next_expected_index, 0);
    }

    #[tokio::test]
    async fn seek_shows_frame_without_moving_cursor() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write_frame(dir.path(), i, 10);
        }
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 5, None);
        ctl.tick();
        ctl.tick();
        let before = ctl.snapshot();

        assert_eq!(ctl.seek(0), Some(0));
        assert_eq!(ctl.current_frame().map(|f| f.index), Some(0));
        assert_eq!(ctl.seek(4), None);
        assert_eq!(ctl.snapshot(), before);
    }

    #[tokio::test]
    async fn seek_limit_follows_run_not_config() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write_frame(dir.path(), i, 10);
        }
        let mut ctl = controller(dir.path());
        assert_eq!(ctl.seek_limit(), 0);

        ctl.reset_for_run(1, dir.path().to_path_buf(), 3, None);
        assert_eq!(ctl.seek_limit(), 0);
        ctl.tick();
        ctl.tick();
        assert_eq!(ctl.seek_limit(), 2);
        ctl.tick();
        assert_eq!(ctl.seek_limit(), 2);
        assert_eq!(ctl.seek(ctl.seek_limit()), Some(2));
    }

    #[tokio::test]
    async fn failed_launch_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), 0, 1);
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(4, dir.path().to_path_buf(), 1, None);
        ctl.tick();
        let before = ctl.snapshot();

        let config = RunConfig {
            count: 3,
            ..RunConfig::default()
        };
        assert!(matches!(ctl.start_run(&config), Err(PanelError::Launch(_))));
        assert_eq!(ctl.snapshot(), before);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_executable_generator_keeps_previous_frames() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let install = dir.path().join("bin");
        std::fs::create_dir(&install).unwrap();
        let generator = install.join("stylegan");
        std::fs::write(&generator, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&generator, std::fs::Permissions::from_mode(0o644)).unwrap();
        for i in 0..3 {
            write_frame(dir.path(), i, 40);
        }

        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 3, None);
        for _ in 0..3 {
            ctl.tick();
        }
        let before = ctl.snapshot();

        let config = RunConfig {
            count: 3,
            ..RunConfig::default()
        };
        assert!(matches!(ctl.start_run(&config), Err(PanelError::Launch(_))));
        assert_eq!(ctl.snapshot(), before);
        assert!(dir.path().join("image_0000.png").exists());
        assert!(!dir.path().join("command_line.txt").exists());
        assert_eq!(ctl.seek(0), Some(0));
    }

    #[tokio::test]
    async fn waiting_tick_only_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 3, None);

        assert_eq!(ctl.tick(), vec![RunUpdate::Refresh]);
        assert_eq!(ctl.snapshot().next_expected_index, 0);
        assert!(ctl.current_frame().is_none());
    }

    #[tokio::test]
    async fn unreadable_frame_tick_only_refreshes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("image_0000.png"), b"\x89PNG\r\n").unwrap();
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 3, None);

        assert_eq!(ctl.tick(), vec![RunUpdate::Refresh]);
        assert_eq!(ctl.tick(), vec![RunUpdate::Refresh]);
        assert_eq!(ctl.snapshot().next_expected_index, 0);
        assert!(ctl.current_frame().is_none());
    }

    #[tokio::test]
    async fn second_run_is_refused_while_process_alive() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctl = controller(dir.path());
        ctl.state.is_running = true;
        assert!(matches!(
            ctl.start_run(&RunConfig::default()),
            Err(PanelError::RunInProgress)
        ));
    }

    #[tokio::test]
    async fn background_assembly_reports_through_queue() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..2 {
            write_frame(dir.path(), i, 100);
        }
        let mut ctl = controller(dir.path());
        ctl.reset_for_run(1, dir.path().to_path_buf(), 2, None);
        let out = dir.path().join("out.gif");

        assert!(ctl.assemble_in_background(2, out.clone()));
        assert!(!ctl.assemble_in_background(2, out.clone()));

        let updates = ctl.next_updates().await;
        match updates.as_slice() {
            [RunUpdate::AssemblyDone(report)] => assert_eq!(report.frames, vec![0, 1]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!ctl.is_assembling());
        assert!(out.exists());
    }
}
