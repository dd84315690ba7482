// ombuild-aio/src/process.rs
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use ombuild_common::error::{OmbError, Result};
use ombuild_common::pipeline::StepResult;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, error, trace};

/// Lines of output kept per stream for failure reports.
const OUTPUT_TAIL_LINES: usize = 20;

/// How long output is still read after the command itself has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Runs an external command to completion and reports its exit status.
///
/// stdin is closed so tools never wait for input. stdout and stderr are
/// streamed into the current tracing span line by line; the last few lines of
/// each are logged again if the command exits non-zero. The command runs in its
/// own process group, which is killed if the returned future is dropped before
/// the command exits.
///
/// Only a failure to spawn or wait is an `Err`; a non-zero exit is reported
/// through the returned [`StepResult`].
pub async fn run_step(program: &Path, args: &[OsString], cwd: Option<&Path>) -> Result<StepResult> {
    let command: Vec<String> = std::iter::once(program.as_os_str())
        .chain(args.iter().map(OsString::as_os_str))
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    debug!("Running command: {} (cwd: {:?})", command.join(" "), cwd);

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.kill_on_drop(true);
    // Own group, so cancellation also reaches the compilers make spawns.
    #[cfg(unix)]
    cmd.process_group(0);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        error!("Failed to spawn {}: {}", command[0], e);
        OmbError::CommandExecError(format!("{}: {e}", command.join(" ")))
    })?;
    let mut group = ProcessGroupGuard::new(child.id());

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let mut stdout_tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let mut stderr_tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
    let (exited_tx, exited_rx) = oneshot::channel::<()>();

    let wait = async {
        let status = child.wait().await;
        let _ = exited_tx.send(());
        status
    };
    let drain = async {
        let streams = async {
            tokio::join!(
                drain_lines(stdout, "stdout", &mut stdout_tail),
                drain_lines(stderr, "stderr", &mut stderr_tail),
            )
        };
        tokio::pin!(streams);
        let exited = tokio::select! {
            _ = &mut streams => false,
            _ = exited_rx => true,
        };
        // A background descendant may still hold the pipes open.
        if exited && tokio::time::timeout(OUTPUT_GRACE, &mut streams).await.is_err() {
            debug!(
                "Output of {} still open after it exited; no longer reading it",
                command[0]
            );
        }
    };
    let (status, ()) = tokio::join!(wait, drain);
    group.disarm();

    let status = status.map_err(|e| {
        error!("Failed to wait for {}: {}", command[0], e);
        OmbError::CommandExecError(format!("{}: {e}", command.join(" ")))
    })?;

    if status.success() {
        debug!("Command finished successfully: {}", command[0]);
    } else {
        error!("`{}` failed with {}", command.join(" "), status);
        for (name, tail) in [("stdout", stdout_tail), ("stderr", stderr_tail)] {
            if !tail.is_empty() {
                error!("Last {} lines of {}:", tail.len(), name);
                for line in tail {
                    error!("  {}", line);
                }
            }
        }
    }

    Ok(StepResult { command, status })
}

/// Reads a child stream to EOF, tracing every line and keeping the last
/// [`OUTPUT_TAIL_LINES`] in `tail`.
///
/// Keeps reading past undecodable bytes so the child never blocks on a full pipe.
async fn drain_lines<R>(reader: Option<R>, stream: &'static str, tail: &mut VecDeque<String>)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                trace!(stream, "{}", line);
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Err(e) => {
                debug!("Stopped reading {}: {}", stream, e);
                break;
            }
        }
    }
}

/// Kills the command's whole process group when dropped while armed.
struct ProcessGroupGuard {
    #[cfg(unix)]
    pgid: Option<libc::pid_t>,
}

impl ProcessGroupGuard {
    #[cfg(unix)]
    fn new(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    #[cfg(not(unix))]
    fn new(_pid: Option<u32>) -> Self {
        Self {}
    }

    /// The command has been reaped; its group id may be reused from here on.
    fn disarm(&mut self) {
        #[cfg(unix)]
        {
            self.pgid = None;
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: killpg only sends a signal; it touches no memory of ours.
            if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
                debug!("Killed process group {}", pgid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Instant;

    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec![OsString::from("-c"), OsString::from(script)]
    }

    #[tokio::test]
    async fn reports_exit_status_and_command() {
        let result = run_step(Path::new("sh"), &sh("exit 3"), None).await.unwrap();
        assert!(!result.success());
        assert_eq!(result.status.code(), Some(3));
        assert_eq!(result.command, vec!["sh", "-c", "exit 3"]);
    }

    #[tokio::test]
    async fn runs_in_requested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_step(Path::new("sh"), &sh("echo hi > marker"), Some(dir.path()))
            .await
            .unwrap();
        assert!(result.success());
        assert!(dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn large_output_does_not_block_the_child() {
        let script = "i=0; while [ $i -lt 5000 ]; do echo line $i; echo err $i >&2; i=$((i+1)); done";
        let result = run_step(Path::new("sh"), &sh(script), None).await.unwrap();
        assert!(result.success());
    }

    #[tokio::test]
    async fn missing_program_is_an_exec_error() {
        let missing = PathBuf::from("/nonexistent/ombuild-test-tool");
        let err = run_step(&missing, &[], None).await.unwrap_err();
        assert!(matches!(err, OmbError::CommandExecError(_)));
    }

    #[tokio::test]
    async fn tail_keeps_only_the_last_lines() {
        let (mut writer, reader) = tokio::io::duplex(4096);
        let producer = tokio::spawn(async move {
            use tokio::io::AsyncWriteExt;
            for i in 0..(OUTPUT_TAIL_LINES + 5) {
                writer
                    .write_all(format!("line {i}\n").as_bytes())
                    .await
                    .unwrap();
            }
        });
        let mut tail = VecDeque::new();
        drain_lines(Some(reader), "stdout", &mut tail).await;
        producer.await.unwrap();
        assert_eq!(tail.len(), OUTPUT_TAIL_LINES);
        assert_eq!(tail.front().map(String::as_str), Some("line 5"));
        assert_eq!(
            tail.back().map(String::as_str),
            Some(format!("line {}", OUTPUT_TAIL_LINES + 4).as_str())
        );
    }

    #[tokio::test]
    async fn background_descendant_holding_output_does_not_delay_exit() {
        let started = Instant::now();
        let result = run_step(Path::new("sh"), &sh("sleep 4 & exit 1"), None)
            .await
            .unwrap();
        assert_eq!(result.status.code(), Some(1));
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn dropping_the_step_kills_its_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("descendant.pid");
        let args = sh("sleep 30 & echo $! > descendant.pid; wait");
        let run = run_step(
            Path::new("sh"),
            &args,
            Some(dir.path()),
        );
        let pid = tokio::select! {
            _ = run => panic!("command should still be running"),
            pid = read_pid(&pid_file) => pid,
        };

        let deadline = Instant::now() + Duration::from_secs(5);
        while is_running(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!is_running(pid), "descendant {pid} survived cancellation");
    }

    #[cfg(target_os = "linux")]
    async fn read_pid(path: &Path) -> u32 {
        loop {
            let pid = std::fs::read_to_string(path)
                .ok()
                .and_then(|text| text.trim().parse().ok());
            if let Some(pid) = pid {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Alive and not yet a zombie.
    #[cfg(target_os = "linux")]
    fn is_running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
            Err(_) => false,
        }
    }
}
