//! Bounded wait on an invoker's completion signal.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::core::arbiter::Race;

/// Clock for one invocation, started when the test is handed to its worker.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineGuard {
    started: Instant,
    timeout: Duration,
}

impl DeadlineGuard {
    pub fn start(timeout: Duration) -> Self {
        Self {
            started: Instant::now(),
            timeout,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.started.elapsed())
    }

    /// Wait for `done` until the deadline, running `on_expire` once if and
    /// only if the deadline elapses first.
    pub fn race_with<F: FnOnce()>(&self, done: &Receiver<()>, on_expire: F) -> Race {
        match done.recv_timeout(self.remaining()) {
            Ok(()) => Race::Completed,
            Err(RecvTimeoutError::Timeout) => {
                on_expire();
                Race::Expired {
                    elapsed: self.elapsed(),
                }
            }
            Err(RecvTimeoutError::Disconnected) => Race::Abandoned {
                reason: "test worker exited without reporting an outcome".to_string(),
            },
        }
    }
}
