//! Bounded executors: how a test gets its own thread of control and what
//! happens to that thread when the deadline elapses.
//!
//! - [`interrupting`]: one dedicated thread per test. On timeout the thread
//!   is interrupted and given a short grace period to unwind.
//! - [`racing`]: tests run on the blocking pool of a tokio runtime. On
//!   timeout the task is abandoned and keeps running in the background.
//!
//! One strategy is active per process. [`install`] selects it at start-up;
//! otherwise [`active`] resolves it once from the environment.

pub mod interrupting;
pub mod racing;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::context::ExecutionContext;
use crate::core::arbiter::Race;
use crate::invoker::Invoker;
use crate::io::config::{TimeboxConfig, apply_env_overrides};

pub use interrupting::InterruptingExecutor;
pub use racing::RacingExecutor;

/// Which bounded executor runs tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Shared worker pool; overrunning tasks are abandoned.
    #[default]
    Racing,
    /// Dedicated thread per test; overrunning threads are interrupted.
    Interrupting,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown strategy `{0}` (expected `racing` or `interrupting`)")]
pub struct UnknownStrategy(pub String);

impl FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "racing" => Ok(Strategy::Racing),
            "interrupting" => Ok(Strategy::Interrupting),
            _ => Err(UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Racing => f.write_str("racing"),
            Strategy::Interrupting => f.write_str("interrupting"),
        }
    }
}

impl Strategy {
    /// Build the executor for this strategy from `config`.
    pub fn executor(self, config: &TimeboxConfig) -> Result<Arc<dyn BoundedExecutor>> {
        let executor: Arc<dyn BoundedExecutor> = match self {
            Strategy::Racing => Arc::new(RacingExecutor::new(config.pool_max_workers)?),
            Strategy::Interrupting => Arc::new(interrupting_executor(config)),
        };
        Ok(executor)
    }
}

/// Runs an [`Invoker`] on an independent thread of control and waits for it
/// with a bounded wait.
pub trait BoundedExecutor: Send + Sync + fmt::Debug {
    fn strategy(&self) -> Strategy;

    /// Hand `invoker` a worker view of `ctx` on another thread, wait up to
    /// `timeout` for it, and report which side of the race won. Writing the
    /// final result is left to the caller.
    fn run(&self, invoker: Invoker, ctx: &ExecutionContext, timeout: Duration) -> Race;
}

fn interrupting_executor(config: &TimeboxConfig) -> InterruptingExecutor {
    InterruptingExecutor::new(Duration::from_millis(config.interrupt_grace_ms))
}

static ACTIVE: OnceLock<Arc<dyn BoundedExecutor>> = OnceLock::new();

/// Select the process-wide executor. Fails if one is already active.
pub fn install(config: &TimeboxConfig) -> Result<Arc<dyn BoundedExecutor>> {
    let executor = config.strategy.executor(config)?;
    ACTIVE
        .set(Arc::clone(&executor))
        .map_err(|_| anyhow!("bounded executor already installed"))?;
    info!(strategy = %config.strategy, "installed bounded executor");
    Ok(executor)
}

/// The process-wide executor, resolved from the environment on first use
/// when [`install`] was never called.
pub fn active() -> Arc<dyn BoundedExecutor> {
    let executor = ACTIVE.get_or_init(|| {
        let config = match apply_env_overrides(TimeboxConfig::default()) {
            Ok(config) => config,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "ignoring invalid environment overrides");
                TimeboxConfig::default()
            }
        };
        config.strategy.executor(&config).unwrap_or_else(|err| -> Arc<dyn BoundedExecutor> {
            error!(err = %format!("{err:#}"), "failed to start executor; using interrupting");
            Arc::new(interrupting_executor(&config))
        })
    });
    Arc::clone(executor)
}
