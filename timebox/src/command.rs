//! The test-command contract and the leaf test method.
//!
//! Every runnable unit, including decorators such as
//! [`TimeoutCommand`](crate::timeout::TimeoutCommand), implements
//! [`TestCommand`], so decorators stack without callers noticing.

use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use tracing::{debug, instrument};

use crate::context::ExecutionContext;
use crate::core::failure::{classify_error, classify_panic};
use crate::core::types::{FailureSite, TestDescriptor, TestResult};

/// A runnable test invocation.
pub trait TestCommand: Send + Sync {
    /// The test this command runs.
    fn test(&self) -> &TestDescriptor;

    /// Run the test and return its outcome. Implementations report failures
    /// as data in the returned result.
    fn execute(&self, ctx: &ExecutionContext) -> TestResult;

    /// Timeout already applied by this command, if any.
    fn timeout(&self) -> Option<Duration> {
        None
    }
}

type Phase = Box<dyn Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync>;

/// A single test method with optional set-up and tear-down phases.
pub struct TestMethodCommand {
    test: TestDescriptor,
    setup: Option<Phase>,
    body: Phase,
    teardown: Option<Phase>,
}

impl TestMethodCommand {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            test: TestDescriptor::method(name),
            setup: None,
            body: Box::new(body),
            teardown: None,
        }
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn with_teardown<F>(mut self, teardown: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.teardown = Some(Box::new(teardown));
        self
    }

    fn run_phases(&self, ctx: &ExecutionContext) -> TestResult {
        if let Some(setup) = &self.setup
            && let Err(result) = run_phase(FailureSite::SetUp, setup, ctx)
        {
            return result;
        }

        let outcome = match run_phase(FailureSite::Test, &self.body, ctx) {
            Ok(()) => TestResult::passed(),
            Err(result) => result,
        };

        let Some(teardown) = &self.teardown else {
            return outcome;
        };
        match run_phase(FailureSite::TearDown, teardown, ctx) {
            Ok(()) => outcome,
            Err(teardown_result) if outcome.is_passed() => teardown_result,
            Err(teardown_result) => {
                let mut combined = outcome;
                let body_message = combined.message.take().unwrap_or_default();
                let teardown_message = teardown_result.message.unwrap_or_default();
                combined.message = Some(format!("{body_message}\nTearDown : {teardown_message}"));
                combined
            }
        }
    }
}

impl TestCommand for TestMethodCommand {
    fn test(&self) -> &TestDescriptor {
        &self.test
    }

    #[instrument(skip_all, fields(test = %self.test.name))]
    fn execute(&self, ctx: &ExecutionContext) -> TestResult {
        let started = Instant::now();
        let result = self.run_phases(ctx).with_duration(started.elapsed());
        debug!(status = ?result.status, site = ?result.site, "test method finished");
        result
    }
}

fn run_phase(site: FailureSite, phase: &Phase, ctx: &ExecutionContext) -> Result<(), TestResult> {
    match panic::catch_unwind(AssertUnwindSafe(|| phase(ctx))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(classify_error(site, &err)),
        Err(payload) => Err(classify_panic(site, payload.as_ref())),
    }
}
