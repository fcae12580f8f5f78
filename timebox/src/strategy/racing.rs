//! Pool-based execution raced against the deadline.
//!
//! The test runs on the blocking pool of a private tokio runtime and the
//! caller waits for it with [`tokio::time::timeout`]. On timeout the
//! cooperative interrupt signal is raised but the task is not stopped: it
//! keeps running on its worker, and its eventual write is rejected because
//! the slot lease has been revoked. A task still queued when its deadline
//! passes never runs the test body.

use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tokio::runtime::{self, Handle, Runtime};
use tracing::{error, instrument, warn};

use super::{BoundedExecutor, Strategy};
use crate::context::ExecutionContext;
use crate::core::arbiter::Race;
use crate::deadline::DeadlineGuard;
use crate::invoker::Invoker;

/// Idle pool threads exit after this long.
const KEEP_ALIVE: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct RacingExecutor {
    // `None` only while dropping.
    runtime: Option<Runtime>,
}

impl RacingExecutor {
    /// Start a runtime whose blocking pool holds at most `max_workers` threads.
    pub fn new(max_workers: usize) -> Result<Self> {
        ensure!(max_workers > 0, "racing pool needs at least one worker");
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_workers)
            .thread_keep_alive(KEEP_ALIVE)
            .thread_name("timebox-pool")
            .enable_time()
            .build()
            .context("build racing runtime")?;
        Ok(Self {
            runtime: Some(runtime),
        })
    }
}

impl Drop for RacingExecutor {
    fn drop(&mut self) {
        // Abandoned tasks stay detached; dropping must not wait for them.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl BoundedExecutor for RacingExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::Racing
    }

    #[instrument(skip_all, fields(test = %ctx.test().name, timeout_ms = timeout.as_millis() as u64))]
    fn run(&self, invoker: Invoker, ctx: &ExecutionContext, timeout: Duration) -> Race {
        let Some(runtime) = self.runtime.as_ref() else {
            return Race::Abandoned {
                reason: "racing runtime is shut down".to_string(),
            };
        };
        if Handle::try_current().is_ok() {
            error!("racing executor called from inside an async runtime");
            return Race::Abandoned {
                reason: "cannot wait for a test from inside an async runtime".to_string(),
            };
        }

        let worker_ctx = ctx.for_worker();
        let interrupt = worker_ctx.interrupt().clone();

        // Time spent queued behind a saturated pool counts against the test.
        let deadline = DeadlineGuard::start(timeout);
        let task = runtime.spawn_blocking(move || invoker.invoke(&worker_ctx));
        match runtime.block_on(tokio::time::timeout(deadline.remaining(), task)) {
            Ok(Ok(_)) => Race::Completed,
            Ok(Err(err)) => {
                error!(err = %err, "test task did not complete");
                Race::Abandoned {
                    reason: format!("test task did not complete: {err}"),
                }
            }
            Err(_) => {
                interrupt.raise();
                warn!("test task abandoned after timeout; it keeps running in the background");
                Race::Expired {
                    elapsed: deadline.elapsed(),
                }
            }
        }
    }
}
