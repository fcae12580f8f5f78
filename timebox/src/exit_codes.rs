//! Stable exit codes for `timebox run`.

use crate::core::types::TestStatus;

/// The test passed.
pub const PASSED: i32 = 0;
/// The test failed, including by exceeding its timeout.
pub const FAILED: i32 = 1;
/// The test errored (unexpected error, spawn failure, interrupted).
pub const ERROR: i32 = 2;
/// The test could not decide pass or fail.
pub const INCONCLUSIVE: i32 = 3;
/// Invalid configuration or arguments; the test never ran.
pub const INVALID: i32 = 4;

pub fn for_status(status: TestStatus) -> i32 {
    match status {
        TestStatus::Passed => PASSED,
        TestStatus::Failed => FAILED,
        TestStatus::Error => ERROR,
        TestStatus::Inconclusive => INCONCLUSIVE,
    }
}
