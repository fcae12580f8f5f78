//! Per-invocation execution state.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::core::failure::Interrupted;
use crate::core::slot::ResultSlot;
use crate::core::types::TestDescriptor;

/// Cooperative cancellation flag for one invocation.
///
/// Raising is one-way. Waiters blocked in [`InterruptSignal::wait_timeout`]
/// wake immediately.
#[derive(Debug, Clone, Default)]
pub struct InterruptSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl InterruptSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_raised(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout`. Returns `true` if the signal was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |raised| !*raised)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// State carried through one test invocation.
///
/// Clones share the result slot and interrupt signal. The thread that runs
/// the test body gets its own view from [`ExecutionContext::for_worker`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    test: TestDescriptor,
    result: ResultSlot,
    interrupt: InterruptSignal,
    started_at: Instant,
}

impl ExecutionContext {
    pub fn new(test: TestDescriptor) -> Self {
        Self {
            test,
            result: ResultSlot::new(),
            interrupt: InterruptSignal::new(),
            started_at: Instant::now(),
        }
    }

    /// Context for the worker running the test: a leased view of the same
    /// slot, and an interrupt signal that only this worker observes.
    pub fn for_worker(&self) -> Self {
        Self {
            test: self.test.clone(),
            result: self.result.lease(),
            interrupt: InterruptSignal::new(),
            started_at: self.started_at,
        }
    }

    pub fn test(&self) -> &TestDescriptor {
        &self.test
    }

    pub fn result(&self) -> &ResultSlot {
        &self.result
    }

    pub fn interrupt(&self) -> &InterruptSignal {
        &self.interrupt
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn check_interrupt(&self) -> Result<(), Interrupted> {
        if self.interrupt.is_raised() {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep that returns early with [`Interrupted`] once the invocation is
    /// interrupted. Test bodies should prefer this over `thread::sleep`.
    pub fn sleep(&self, duration: Duration) -> Result<(), Interrupted> {
        if self.interrupt.wait_timeout(duration) {
            Err(Interrupted)
        } else {
            Ok(())
        }
    }
}
