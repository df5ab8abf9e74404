use crate::args::BuiltArgs;
use crate::config::GeneratorPaths;
use crate::error::PanelError;
use crate::events::{EventSink, RunEvent, RunId};
use crate::frames::clear_frames;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub struct LaunchRequest<'a> {
    pub paths: &'a GeneratorPaths,
    pub built: &'a BuiltArgs,
    pub command_log_file: &'a str,
    pub cleanup_scan_limit: u32,
}

/// Handle to a started generator process.
pub struct RunningProcess {
    pub run: RunId,
    pub pid: Option<u32>,
    waiter: JoinHandle<()>,
}

impl RunningProcess {
    /// True once the exit notification has been posted.
    pub fn is_finished(&self) -> bool {
        self.waiter.is_finished()
    }
}

/// Clear old frames, log the command line and spawn the generator.
///
/// The exit of the process is posted as [`RunEvent::ProcessExited`] on
/// `events`; nothing else is touched from the waiter task.
pub fn launch(
    runtime: &Handle,
    request: &LaunchRequest,
    run: RunId,
    events: EventSink,
) -> Result<RunningProcess, PanelError> {
    if !request.paths.is_configured() {
        return Err(PanelError::Launch(
            "generator installation path is not configured".to_string(),
        ));
    }

    let executable = request.paths.executable();
    check_executable(&executable)?;

    let working_dir = request.paths.working_dir();
    clear_frames(&working_dir, request.cleanup_scan_limit)?;

    let command_line = request.built.command_line(&executable);
    write_command_log(&working_dir, request.command_log_file, &command_line)?;
    log::info!("Launching: {}", command_line);

    let _guard = runtime.enter();
    let mut child = Command::new(&executable)
        .args(&request.built.args)
        .current_dir(&working_dir)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|e| PanelError::Launch(e.to_string()))?;
    let pid = child.id();

    let waiter = runtime.spawn(async move {
        let code = match child.wait().await {
            Ok(status) => {
                log::info!("Generator (run {}) exited with {}", run, status);
                status.code()
            }
            Err(e) => {
                log::warn!("Waiting for generator (run {}) failed: {}", run, e);
                None
            }
        };
        events.post(RunEvent::ProcessExited { run, code });
    });

    Ok(RunningProcess { run, pid, waiter })
}

// Nothing on disk may change before this passes.
fn check_executable(executable: &Path) -> Result<(), PanelError> {
    let metadata = fs::metadata(executable)
        .map_err(|e| PanelError::Launch(format!("{}: {}", executable.display(), e)))?;
    if !metadata.is_file() {
        return Err(PanelError::Launch(format!(
            "{}: not a file",
            executable.display()
        )));
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(PanelError::Launch(format!(
                "{}: not executable",
                executable.display()
            )));
        }
    }
    Ok(())
}

/// Overwrite the command log with a timestamped copy of the invocation.
pub fn write_command_log(dir: &Path, file_name: &str, command_line: &str) -> Result<(), PanelError> {
    let path = dir.join(file_name);
    let line = format!("{}{}\n", timestamp(), command_line);
    fs::write(&path, line).map_err(|e| PanelError::io(&path, e))
}

fn timestamp() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_default()
}
