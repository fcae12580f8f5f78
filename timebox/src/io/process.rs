//! Helpers for running child processes that can be interrupted, with bounded
//! output capture.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::context::InterruptSignal;

/// How often a running child is checked for exit and interruption.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    /// The child was killed because the interrupt signal was raised.
    pub interrupted: bool,
}

impl CommandOutput {
    pub fn stderr_truncated_notice(&self, label: &str) -> String {
        if self.stderr_truncated > 0 {
            format!(
                "\n[{label} stderr truncated {} bytes]\n",
                self.stderr_truncated
            )
        } else {
            String::new()
        }
    }
}

/// Run a command until it exits or `interrupt` is raised, capturing
/// stdout/stderr without risking pipe deadlocks.
///
/// Output is read concurrently while the child runs. `output_limit_bytes`
/// bounds the amount of stdout/stderr stored in memory (bytes beyond this are
/// discarded while still draining the pipe). An interrupted child is killed
/// and reaped before returning; grandchildren that inherited its pipes keep
/// the readers open until they exit.
#[instrument(skip_all, fields(output_limit_bytes))]
pub fn run_command_interruptible(
    mut cmd: Command,
    interrupt: &InterruptSignal,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let (status, interrupted) = match wait_or_kill(&mut child, interrupt) {
        Ok(waited) => waited,
        Err(err) => {
            error!(err = %format!("{err:#}"), "lost track of child process; killing it");
            abort_child(&mut child, stdout_handle, stderr_handle);
            return Err(err);
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), interrupted, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        interrupted,
    })
}

/// Wait for `child` to exit, killing it once `interrupt` is raised. Returns
/// the exit status and whether the child was killed.
fn wait_or_kill(child: &mut Child, interrupt: &InterruptSignal) -> Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL).context("wait for command")? {
            return Ok((status, false));
        }
        if interrupt.is_raised() {
            warn!("interrupt raised, killing child process");
            child.kill().context("kill command")?;
            return Ok((child.wait().context("wait command after kill")?, true));
        }
    }
}

/// Best-effort kill and reap after a failed wait, then drain the readers.
fn abort_child(child: &mut Child, stdout: OutputReader, stderr: OutputReader) {
    if let Err(err) = child.kill() {
        debug!(err = %err, "kill after failed wait");
    }
    if let Err(err) = child.wait() {
        warn!(err = %err, "could not reap child process");
    }
    for reader in [stdout, stderr] {
        if let Err(err) = join_output(reader) {
            debug!(err = %format!("{err:#}"), "discarding output of aborted child");
        }
    }
}

type OutputReader = thread::JoinHandle<Result<(Vec<u8>, usize)>>;

fn join_output(handle: OutputReader) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_output_of_finished_command() {
        let output = run_command_interruptible(
            sh("echo hello; echo oops >&2; exit 3"),
            &InterruptSignal::new(),
            1000,
        )
        .expect("run");
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "oops\n");
        assert!(!output.interrupted);
    }

    #[test]
    fn truncates_beyond_limit() {
        let output =
            run_command_interruptible(sh("printf 'abcdefghij'"), &InterruptSignal::new(), 4)
                .expect("run");
        assert_eq!(output.stdout, b"abcd");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn kills_child_when_interrupted() {
        let interrupt = InterruptSignal::new();
        let raiser = {
            let interrupt = interrupt.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                interrupt.raise();
            })
        };

        let started = Instant::now();
        let output = run_command_interruptible(sh("exec sleep 30"), &interrupt, 1000).expect("run");
        assert!(output.interrupted);
        assert!(!output.status.success());
        assert!(started.elapsed() < Duration::from_secs(10));
        raiser.join().expect("join raiser");
    }

    #[test]
    fn aborted_child_is_killed_and_reaped() {
        let mut child = sh("exec sleep 30")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("spawn");
        let stdout = child.stdout.take().expect("stdout");
        let stderr = child.stderr.take().expect("stderr");
        let stdout = thread::spawn(move || read_stream_limited(stdout, 1000));
        let stderr = thread::spawn(move || read_stream_limited(stderr, 1000));

        let started = Instant::now();
        abort_child(&mut child, stdout, stderr);
        assert!(started.elapsed() < Duration::from_secs(10));
        let status = child.try_wait().expect("try_wait").expect("child reaped");
        assert!(!status.success());
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run_command_interruptible(
            Command::new("timebox-definitely-missing-binary"),
            &InterruptSignal::new(),
            1000,
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn command"));
    }
}
