//! Single decision point between "test finished" and "deadline elapsed".

use std::time::Duration;

use tracing::debug;

use crate::core::slot::ResultSlot;
use crate::core::types::{FailureSite, TestResult};

/// Which signal a bounded wait observed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Race {
    /// The invoker recorded its outcome before the deadline.
    Completed,
    /// The deadline elapsed first.
    Expired { elapsed: Duration },
    /// The worker went away without reporting (spawn failure, lost task).
    Abandoned { reason: String },
}

impl Race {
    pub fn is_expired(&self) -> bool {
        matches!(self, Race::Expired { .. })
    }
}

/// Resolves a [`Race`] into exactly one final write to a [`ResultSlot`].
#[derive(Debug, Clone, Copy)]
pub struct OutcomeArbiter {
    timeout: Duration,
}

impl OutcomeArbiter {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Finalize `slot` according to `race` and return the visible result.
    ///
    /// Finalizing revokes the worker's lease, so whatever the losing side
    /// tries to write afterwards is discarded.
    pub fn resolve(&self, slot: &ResultSlot, race: Race) -> TestResult {
        match race {
            Race::Completed => {
                let result = slot.finalize(None);
                debug!(status = ?result.status, "test completed within timeout");
                result
            }
            Race::Expired { elapsed } => {
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "deadline elapsed before completion"
                );
                slot.finalize(Some(
                    TestResult::timed_out(self.timeout).with_duration(elapsed),
                ))
            }
            Race::Abandoned { reason } => {
                debug!(%reason, "worker abandoned the invocation");
                slot.finalize(Some(TestResult::error(FailureSite::Test, reason)))
            }
        }
    }
}
