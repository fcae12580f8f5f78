//! Conversion of test-body errors and panics into [`TestResult`]s.
//!
//! Test bodies return `anyhow::Result<()>`. The error types below let a body
//! say *how* it failed; anything else is an unexpected error.

use std::any::Any;

use thiserror::Error;

use crate::core::types::{FailureSite, TestResult};

/// A failed expectation. Classified as `Failed`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AssertionFailure {
    pub message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The test could not decide pass or fail. Classified as `Inconclusive`.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct Inconclusive {
    pub reason: String,
}

impl Inconclusive {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Returned by cooperative helpers once the invocation has been interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("test was interrupted")]
pub struct Interrupted;

/// Classify an error returned from the given phase.
pub fn classify_error(site: FailureSite, err: &anyhow::Error) -> TestResult {
    let message = format!("{err:#}");
    if err.downcast_ref::<AssertionFailure>().is_some() {
        TestResult::failed(site, message)
    } else if err.downcast_ref::<Inconclusive>().is_some() {
        TestResult::inconclusive(site, message)
    } else {
        TestResult::error(site, message)
    }
}

/// Classify a panic caught while running the given phase.
///
/// Rust's assertion macros report through panics, so a panic is a failure
/// rather than an error.
pub fn classify_panic(site: FailureSite, payload: &(dyn Any + Send)) -> TestResult {
    TestResult::failed(site, format!("panicked: {}", panic_message(payload)))
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TestStatus;
    use anyhow::anyhow;

    #[test]
    fn assertion_failures_are_failed() {
        let err = anyhow::Error::new(AssertionFailure::new("expected 2, got 3"));
        let result = classify_error(FailureSite::Test, &err);
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.message.as_deref(), Some("expected 2, got 3"));
    }

    #[test]
    fn inconclusive_keeps_its_site() {
        let err = anyhow::Error::new(Inconclusive::new("no fixture data"));
        let result = classify_error(FailureSite::SetUp, &err);
        assert_eq!(result.status, TestStatus::Inconclusive);
        assert_eq!(result.site, FailureSite::SetUp);
    }

    #[test]
    fn other_errors_are_errors_with_context_chain() {
        let err = anyhow!("connection refused").context("open database");
        let result = classify_error(FailureSite::Test, &err);
        assert_eq!(result.status, TestStatus::Error);
        assert_eq!(
            result.message.as_deref(),
            Some("open database: connection refused")
        );
    }

    #[test]
    fn panics_carry_payload_text() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        let result = classify_panic(FailureSite::TearDown, payload.as_ref());
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.site, FailureSite::TearDown);
        assert_eq!(
            result.message.as_deref(),
            Some("panicked: index out of bounds")
        );
    }

    #[test]
    fn static_str_payloads_are_read() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42_u32);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
