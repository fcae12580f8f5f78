//! Dedicated-thread execution with interruption on timeout.
//!
//! Rust has no safe way to stop a thread from the outside. "Interrupting"
//! therefore means: raise the worker's [`InterruptSignal`], unpark the
//! thread so `park`-based waits return, and wait a grace period for it to
//! unwind. Bodies that honour the signal (`ExecutionContext::sleep`, process
//! tests that kill their child) stop promptly; bodies that ignore it are
//! detached and left to finish on their own. Nothing they hold is cleaned up.
//!
//! [`InterruptSignal`]: crate::context::InterruptSignal

use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, instrument, warn};

use super::{BoundedExecutor, Strategy};
use crate::context::ExecutionContext;
use crate::core::arbiter::Race;
use crate::deadline::DeadlineGuard;
use crate::invoker::Invoker;

#[derive(Debug, Clone)]
pub struct InterruptingExecutor {
    grace: Duration,
}

impl InterruptingExecutor {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Give an interrupted thread `grace` to finish before detaching it.
    fn await_unwind(&self, handle: JoinHandle<()>, done: &Receiver<()>) {
        match done.recv_timeout(self.grace) {
            Ok(()) => {
                debug!("interrupted test thread stopped");
                let _ = handle.join();
            }
            Err(_) => {
                warn!(
                    grace_ms = self.grace.as_millis() as u64,
                    thread = ?handle.thread().name(),
                    "test thread ignored interrupt; detaching"
                );
            }
        }
    }
}

impl BoundedExecutor for InterruptingExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::Interrupting
    }

    #[instrument(skip_all, fields(test = %ctx.test().name, timeout_ms = timeout.as_millis() as u64))]
    fn run(&self, invoker: Invoker, ctx: &ExecutionContext, timeout: Duration) -> Race {
        let worker_ctx = ctx.for_worker();
        let interrupt = worker_ctx.interrupt().clone();
        let (done_tx, done_rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name(format!("timebox-{}", ctx.test().id.replace('\0', "")))
            .spawn(move || {
                invoker.invoke(&worker_ctx);
                let _ = done_tx.send(());
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                error!(err = %err, "failed to spawn test thread");
                return Race::Abandoned {
                    reason: format!("spawn test thread: {err}"),
                };
            }
        };
        let target = handle.thread().clone();

        let deadline = DeadlineGuard::start(timeout);
        let race = deadline.race_with(&done_rx, || {
            interrupt.raise();
            target.unpark();
        });

        match &race {
            Race::Expired { .. } => self.await_unwind(handle, &done_rx),
            Race::Completed | Race::Abandoned { .. } => {
                let _ = handle.join();
            }
        }
        race
    }
}
