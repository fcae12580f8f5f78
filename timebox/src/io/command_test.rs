//! A leaf test that runs an external program.
//!
//! The program passes when it exits with status 0. It watches the
//! invocation's interrupt signal and kills the child when it is raised, so
//! process tests are the one kind of test that stops for real on timeout.

use std::ffi::OsString;
use std::process::Command;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::command::TestCommand;
use crate::context::ExecutionContext;
use crate::core::types::{FailureSite, TestDescriptor, TestResult};
use crate::io::process::run_command_interruptible;

/// Bytes of stderr quoted in a failure message.
const STDERR_EXCERPT_BYTES: usize = 2_000;

#[derive(Debug, Clone)]
pub struct ProcessTestCommand {
    test: TestDescriptor,
    program: OsString,
    args: Vec<OsString>,
    output_limit_bytes: usize,
}

impl ProcessTestCommand {
    pub fn new(name: impl Into<String>, program: impl Into<OsString>) -> Self {
        Self {
            test: TestDescriptor::method(name),
            program: program.into(),
            args: Vec::new(),
            output_limit_bytes: 100_000,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_limit_bytes(mut self, limit: usize) -> Self {
        self.output_limit_bytes = limit;
        self
    }
}

impl TestCommand for ProcessTestCommand {
    fn test(&self) -> &TestDescriptor {
        &self.test
    }

    #[instrument(skip_all, fields(test = %self.test.name, program = ?self.program))]
    fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let started = Instant::now();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        let output = match run_command_interruptible(cmd, ctx.interrupt(), self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                return TestResult::error(FailureSite::Test, format!("{err:#}"))
                    .with_duration(started.elapsed());
            }
        };

        let result = if output.interrupted {
            TestResult::error(FailureSite::Test, "process killed after interrupt")
        } else if output.status.success() {
            TestResult::passed()
        } else {
            let mut message = match output.status.code() {
                Some(code) => format!("process exited with status {code}"),
                None => "process terminated by signal".to_string(),
            };
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt = tail(stderr.trim_end(), STDERR_EXCERPT_BYTES);
            if !excerpt.is_empty() {
                message.push_str("\n--- stderr ---\n");
                message.push_str(excerpt);
                message.push_str(&output.stderr_truncated_notice("test"));
            }
            TestResult::failed(FailureSite::Test, message)
        };
        debug!(status = ?result.status, exit_code = ?output.status.code(), "process test finished");
        result.with_duration(started.elapsed())
    }
}

/// Last `max_bytes` of `text`, cut at a char boundary.
fn tail(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TestStatus;

    #[test]
    fn tail_respects_char_boundaries() {
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
        assert_eq!(tail("aé", 1), "");
    }

    #[cfg(unix)]
    #[test]
    fn zero_exit_passes() {
        let cmd = ProcessTestCommand::new("true", "sh").args(["-c", "exit 0"]);
        let ctx = ExecutionContext::new(cmd.test().clone());
        assert_eq!(cmd.execute(&ctx).status, TestStatus::Passed);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_fails_with_stderr() {
        let cmd = ProcessTestCommand::new("fails", "sh").args(["-c", "echo 'bad input' >&2; exit 4"]);
        let ctx = ExecutionContext::new(cmd.test().clone());
        let result = cmd.execute(&ctx);
        assert_eq!(result.status, TestStatus::Failed);
        let message = result.message.unwrap_or_default();
        assert!(message.contains("status 4"));
        assert!(message.contains("bad input"));
    }

    #[test]
    fn missing_program_is_an_error() {
        let cmd = ProcessTestCommand::new("missing", "timebox-definitely-missing-binary");
        let ctx = ExecutionContext::new(cmd.test().clone());
        let result = cmd.execute(&ctx);
        assert_eq!(result.status, TestStatus::Error);
        assert!(result.message.unwrap_or_default().contains("spawn command"));
    }
}
