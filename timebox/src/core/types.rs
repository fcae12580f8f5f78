//! Shared deterministic types for test outcomes.
//!
//! These types define the stable contract between a test command, the
//! decorators wrapping it, and whoever reports the result downstream.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Final status of a single test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
    Inconclusive,
}

/// Phase of the invocation a failure originated in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureSite {
    SetUp,
    #[default]
    Test,
    TearDown,
}

/// Whether a command represents a single test method or a group of tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    Method,
    Suite,
}

/// Identity of the test a command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDescriptor {
    pub id: String,
    pub name: String,
    pub kind: TestKind,
}

impl TestDescriptor {
    /// Descriptor for a leaf test method; the id defaults to the name.
    pub fn method(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            kind: TestKind::Method,
        }
    }

    pub fn suite(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            kind: TestKind::Suite,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == TestKind::Method
    }
}

/// Outcome of one test invocation.
///
/// The default value is `Inconclusive` with no message: the state of a slot
/// whose test has not reported anything yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub site: FailureSite,
    pub duration_ms: u64,
}

impl Default for TestResult {
    fn default() -> Self {
        Self {
            status: TestStatus::Inconclusive,
            message: None,
            site: FailureSite::Test,
            duration_ms: 0,
        }
    }
}

impl TestResult {
    pub fn passed() -> Self {
        Self {
            status: TestStatus::Passed,
            ..Self::default()
        }
    }

    pub fn failed(site: FailureSite, message: impl Into<String>) -> Self {
        Self::with_status(TestStatus::Failed, site, message)
    }

    pub fn error(site: FailureSite, message: impl Into<String>) -> Self {
        Self::with_status(TestStatus::Error, site, message)
    }

    pub fn inconclusive(site: FailureSite, message: impl Into<String>) -> Self {
        Self::with_status(TestStatus::Inconclusive, site, message)
    }

    /// The failure recorded when an invocation overruns its timeout.
    pub fn timed_out(timeout: Duration) -> Self {
        Self::failed(FailureSite::Test, timeout_message(timeout))
    }

    fn with_status(status: TestStatus, site: FailureSite, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
            site,
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Message recorded for a timed-out invocation.
///
/// Downstream reporting matches on this exact format.
pub fn timeout_message(timeout: Duration) -> String {
    format!("Test exceeded Timeout value of {}ms.", timeout.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_configured_value() {
        assert_eq!(
            timeout_message(Duration::from_millis(50)),
            "Test exceeded Timeout value of 50ms."
        );
    }

    #[test]
    fn timed_out_is_a_test_site_failure() {
        let result = TestResult::timed_out(Duration::from_millis(250));
        assert_eq!(result.status, TestStatus::Failed);
        assert_eq!(result.site, FailureSite::Test);
        assert_eq!(
            result.message.as_deref(),
            Some("Test exceeded Timeout value of 250ms.")
        );
    }

    #[test]
    fn default_result_is_inconclusive_without_message() {
        let result = TestResult::default();
        assert_eq!(result.status, TestStatus::Inconclusive);
        assert!(result.message.is_none());
    }

    #[test]
    fn serializes_with_lowercase_enums() {
        let result = TestResult::failed(FailureSite::TearDown, "boom");
        let json = serde_json::to_value(&result).expect("serialize");
        assert_eq!(json["status"], "failed");
        assert_eq!(json["site"], "teardown");
        assert_eq!(json["message"], "boom");
    }
}
