//! The timeout decorator.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::command::TestCommand;
use crate::context::ExecutionContext;
use crate::core::arbiter::OutcomeArbiter;
use crate::core::types::{TestDescriptor, TestKind, TestResult};
use crate::invoker::Invoker;
use crate::strategy::{self, BoundedExecutor};

/// Invalid timeout configuration. Raised at construction, never at run time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("timeout must be a positive number of milliseconds, got {0}")]
    NonPositiveTimeout(i64),
    #[error("timeout can only wrap a single test method, but `{name}` is a {kind:?}")]
    NotALeaf { name: String, kind: TestKind },
    #[error("`{name}` already has a timeout of {existing_ms}ms; timeouts do not nest")]
    NestedTimeout { name: String, existing_ms: u64 },
}

/// Validated timeout settings for one wrapped test.
#[derive(Clone)]
pub struct TimeoutConfig {
    timeout: Duration,
    inner: Arc<dyn TestCommand>,
}

impl TimeoutConfig {
    pub fn new(inner: Arc<dyn TestCommand>, timeout_ms: i64) -> Result<Self, ConfigError> {
        let millis = u64::try_from(timeout_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or(ConfigError::NonPositiveTimeout(timeout_ms))?;

        let test = inner.test();
        if !test.is_leaf() {
            return Err(ConfigError::NotALeaf {
                name: test.name.clone(),
                kind: test.kind,
            });
        }
        if let Some(existing) = inner.timeout() {
            return Err(ConfigError::NestedTimeout {
                name: test.name.clone(),
                existing_ms: u64::try_from(existing.as_millis()).unwrap_or(u64::MAX),
            });
        }

        Ok(Self {
            timeout: Duration::from_millis(millis),
            inner,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &Arc<dyn TestCommand> {
        &self.inner
    }
}

impl std::fmt::Debug for TimeoutConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutConfig")
            .field("timeout", &self.timeout)
            .field("test", self.inner.test())
            .finish()
    }
}

/// Runs the wrapped test on another thread of control and replaces its
/// outcome with a timeout failure if it does not finish in time.
///
/// ```no_run
/// use std::sync::Arc;
/// use timebox::command::{TestCommand, TestMethodCommand};
/// use timebox::context::ExecutionContext;
/// use timebox::timeout::TimeoutCommand;
///
/// let test = Arc::new(TestMethodCommand::new("slow", |ctx| {
///     ctx.sleep(std::time::Duration::from_secs(5))?;
///     Ok(())
/// }));
/// let command = TimeoutCommand::new(test, 100).expect("valid timeout");
/// let ctx = ExecutionContext::new(command.test().clone());
/// let result = command.execute(&ctx);
/// assert_eq!(
///     result.message.as_deref(),
///     Some("Test exceeded Timeout value of 100ms.")
/// );
/// ```
#[derive(Debug)]
pub struct TimeoutCommand {
    config: TimeoutConfig,
    executor: Arc<dyn BoundedExecutor>,
}

impl TimeoutCommand {
    /// Wrap `inner` using the process-wide executor.
    pub fn new(inner: Arc<dyn TestCommand>, timeout_ms: i64) -> Result<Self, ConfigError> {
        Self::with_executor(inner, timeout_ms, strategy::active())
    }

    pub fn with_executor(
        inner: Arc<dyn TestCommand>,
        timeout_ms: i64,
        executor: Arc<dyn BoundedExecutor>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_config(TimeoutConfig::new(inner, timeout_ms)?, executor))
    }

    pub fn from_config(config: TimeoutConfig, executor: Arc<dyn BoundedExecutor>) -> Self {
        Self { config, executor }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }
}

impl TestCommand for TimeoutCommand {
    fn test(&self) -> &TestDescriptor {
        self.config.inner.test()
    }

    fn timeout(&self) -> Option<Duration> {
        Some(self.config.timeout)
    }

    #[instrument(skip_all, fields(
        test = %self.test().name,
        timeout_ms = self.config.timeout.as_millis() as u64,
        strategy = %self.executor.strategy()
    ))]
    fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let invoker = Invoker::new(Arc::clone(&self.config.inner));
        let race = self.executor.run(invoker, ctx, self.config.timeout);
        let timed_out = race.is_expired();

        let result = OutcomeArbiter::new(self.config.timeout).resolve(ctx.result(), race);
        if timed_out {
            warn!(elapsed_ms = result.duration_ms, "test exceeded timeout");
        } else {
            info!(status = ?result.status, duration_ms = result.duration_ms, "test finished");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::TestMethodCommand;
    use crate::strategy::RacingExecutor;

    fn passing() -> Arc<dyn TestCommand> {
        Arc::new(TestMethodCommand::new("passing", |_| Ok(())))
    }

    #[test]
    fn rejects_zero_and_negative_timeouts() {
        for timeout_ms in [0, -1, i64::MIN] {
            let err = TimeoutConfig::new(passing(), timeout_ms).unwrap_err();
            assert_eq!(err, ConfigError::NonPositiveTimeout(timeout_ms));
        }
    }

    #[test]
    fn rejects_nested_timeouts() {
        let executor: Arc<dyn BoundedExecutor> =
            Arc::new(RacingExecutor::new(1).expect("runtime"));
        let once = TimeoutCommand::with_executor(passing(), 100, Arc::clone(&executor))
            .expect("first timeout");
        let err = TimeoutCommand::with_executor(Arc::new(once), 200, executor).unwrap_err();
        assert_eq!(
            err,
            ConfigError::NestedTimeout {
                name: "passing".to_string(),
                existing_ms: 100,
            }
        );
    }

    #[test]
    fn exposes_inner_descriptor_and_timeout() {
        let executor: Arc<dyn BoundedExecutor> =
            Arc::new(RacingExecutor::new(1).expect("runtime"));
        let command = TimeoutCommand::with_executor(passing(), 250, executor).expect("valid");
        assert_eq!(command.test().name, "passing");
        assert_eq!(command.timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn config_error_messages_are_descriptive() {
        assert_eq!(
            ConfigError::NonPositiveTimeout(-1).to_string(),
            "timeout must be a positive number of milliseconds, got -1"
        );
        let err = ConfigError::NotALeaf {
            name: "suite".to_string(),
            kind: TestKind::Suite,
        };
        assert!(err.to_string().contains("single test method"));
    }
}
