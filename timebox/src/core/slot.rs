//! Shared result holder for one test invocation.
//!
//! A [`ResultSlot`] is created before the test starts and shared between the
//! caller and the thread running the test. Handles come in two flavours:
//!
//! - **Owner** handles (from [`ResultSlot::new`] or cloning an owner) may
//!   always write.
//! - **Leased** handles (from [`ResultSlot::lease`]) may write only until the
//!   slot is finalized. [`ResultSlot::finalize`] revokes every outstanding
//!   lease under the same lock that applies the final value, so a write from
//!   an abandoned worker either lands before finalization or is rejected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::types::TestResult;

#[derive(Debug, Default)]
struct SlotState {
    result: TestResult,
    /// Bumped by every finalization; leases carry the value they were issued at.
    generation: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ResultSlot {
    state: Arc<Mutex<SlotState>>,
    lease: Option<u64>,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a handle whose writes stop taking effect at the next finalization.
    pub fn lease(&self) -> ResultSlot {
        let generation = self.lock().generation;
        ResultSlot {
            state: Arc::clone(&self.state),
            lease: Some(generation),
        }
    }

    /// Write `result`. Returns `false` (and leaves the slot untouched) when
    /// this handle's lease has been revoked.
    pub fn record(&self, result: TestResult) -> bool {
        let mut state = self.lock();
        if self.lease.is_some_and(|generation| generation != state.generation) {
            return false;
        }
        state.result = result;
        true
    }

    /// Revoke outstanding leases and, if given, write `replacement` as the
    /// final value. Returns the value the slot holds afterwards.
    pub fn finalize(&self, replacement: Option<TestResult>) -> TestResult {
        let mut state = self.lock();
        state.generation += 1;
        if let Some(result) = replacement {
            state.result = result;
        }
        state.result.clone()
    }

    /// Whether writes through this handle would be rejected.
    pub fn is_revoked(&self) -> bool {
        let state = self.lock();
        self.lease
            .is_some_and(|generation| generation != state.generation)
    }

    pub fn snapshot(&self) -> TestResult {
        self.lock().result.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Writers replace the whole value, so a poisoned lock still holds a
        // complete result.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
