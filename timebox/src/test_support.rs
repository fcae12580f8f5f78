//! Test-only commands and executors with deterministic behavior.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::anyhow;

use crate::command::{TestCommand, TestMethodCommand};
use crate::context::ExecutionContext;
use crate::core::failure::AssertionFailure;
use crate::core::types::{TestDescriptor, TestResult};
use crate::strategy::{BoundedExecutor, InterruptingExecutor, RacingExecutor};

/// One executor per strategy, for tests that must hold under both.
pub fn executors() -> Vec<Arc<dyn BoundedExecutor>> {
    vec![
        Arc::new(RacingExecutor::new(8).expect("racing runtime")),
        Arc::new(InterruptingExecutor::new(Duration::from_millis(100))),
    ]
}

/// Passes after blocking the thread for `delay`, ignoring interrupts.
pub fn sleeping(name: &str, delay: Duration) -> Arc<dyn TestCommand> {
    Arc::new(TestMethodCommand::new(name, move |_| {
        thread::sleep(delay);
        Ok(())
    }))
}

/// Passes after `delay` unless interrupted first.
pub fn cooperative(name: &str, delay: Duration) -> Arc<dyn TestCommand> {
    Arc::new(TestMethodCommand::new(name, move |ctx| {
        ctx.sleep(delay)?;
        Ok(())
    }))
}

/// Fails an assertion immediately.
pub fn failing(name: &str, message: &str) -> Arc<dyn TestCommand> {
    let message = message.to_string();
    Arc::new(TestMethodCommand::new(name, move |_| {
        Err(AssertionFailure::new(message.clone()).into())
    }))
}

/// Returns an unexpected error immediately.
pub fn erroring(name: &str, message: &str) -> Arc<dyn TestCommand> {
    let message = message.to_string();
    Arc::new(TestMethodCommand::new(name, move |_| Err(anyhow!("{message}"))))
}

/// Panics immediately.
pub fn panicking(name: &str, message: &str) -> Arc<dyn TestCommand> {
    let message = message.to_string();
    Arc::new(TestMethodCommand::new(name, move |_| panic!("{message}")))
}

/// A composite command; never a valid timeout target.
pub struct SuiteStub {
    test: TestDescriptor,
}

impl SuiteStub {
    pub fn new(name: &str) -> Self {
        Self {
            test: TestDescriptor::suite(name),
        }
    }
}

impl TestCommand for SuiteStub {
    fn test(&self) -> &TestDescriptor {
        &self.test
    }

    fn execute(&self, _ctx: &ExecutionContext) -> TestResult {
        TestResult::passed()
    }
}

/// Returns a fixed result after a delay and records what happened, so tests
/// can observe work that outlives the caller.
pub struct Recorder {
    test: TestDescriptor,
    delay: Duration,
    result: TestResult,
    started: AtomicUsize,
    finished: AtomicBool,
}

impl Recorder {
    pub fn new(name: &str, delay: Duration, result: TestResult) -> Arc<Self> {
        Arc::new(Self {
            test: TestDescriptor::method(name),
            delay,
            result,
            started: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        })
    }

    pub fn runs(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Poll until the recorder finishes or `limit` elapses.
    pub fn wait_finished(&self, limit: Duration) -> bool {
        let step = Duration::from_millis(5);
        let mut waited = Duration::ZERO;
        while !self.finished() && waited < limit {
            thread::sleep(step);
            waited += step;
        }
        self.finished()
    }
}

impl TestCommand for Recorder {
    fn test(&self) -> &TestDescriptor {
        &self.test
    }

    fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        self.started.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        // Write directly as well, the way a body populating its context would.
        ctx.result().record(self.result.clone());
        self.finished.store(true, Ordering::SeqCst);
        self.result.clone()
    }
}
