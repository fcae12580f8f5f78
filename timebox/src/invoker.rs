//! Runs the wrapped command to completion on the current thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::command::TestCommand;
use crate::context::ExecutionContext;
use crate::core::failure::classify_panic;
use crate::core::types::FailureSite;

/// Executes an inner command and records its outcome into the context's
/// result slot. Cheap to clone; each bounded executor moves one onto the
/// worker thread.
#[derive(Clone)]
pub struct Invoker {
    command: Arc<dyn TestCommand>,
}

impl Invoker {
    pub fn new(command: Arc<dyn TestCommand>) -> Self {
        Self { command }
    }

    /// Run the command and record its result. Returns `false` when the slot
    /// had already been finalized and the result was discarded.
    ///
    /// A worker that only gets to the task after its deadline (queued behind
    /// a saturated pool) returns without running the command.
    pub fn invoke(&self, ctx: &ExecutionContext) -> bool {
        if ctx.interrupt().is_raised() || ctx.result().is_revoked() {
            debug!(test = %ctx.test().name, "skipping test whose deadline already passed");
            return false;
        }
        let started = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.command.execute(ctx))) {
            Ok(result) => result,
            Err(payload) => {
                classify_panic(FailureSite::Test, payload.as_ref()).with_duration(started.elapsed())
            }
        };

        let accepted = ctx.result().record(result);
        if !accepted {
            debug!(
                test = %ctx.test().name,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "discarding late outcome; result already finalized"
            );
        }
        accepted
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("test", self.command.test())
            .finish()
    }
}
