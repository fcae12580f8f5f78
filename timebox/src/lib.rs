//! Wall-clock timeouts for single test invocations.
//!
//! [`timeout::TimeoutCommand`] wraps any [`command::TestCommand`], runs it on
//! another thread of control, and replaces its outcome with a fixed timeout
//! failure if it overruns. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Outcome types, the shared result slot, and race
//!   resolution. No threads, no I/O.
//! - **[`strategy`]**: Bounded executors that give the test its own thread
//!   (dedicated and interrupted, or pooled and abandoned).
//! - **[`io`]**: Configuration files and child-process tests.
//!
//! [`invoker`], [`deadline`] and [`timeout`] wire these together.

pub mod command;
pub mod context;
pub mod core;
pub mod deadline;
pub mod exit_codes;
pub mod invoker;
pub mod io;
pub mod logging;
pub mod strategy;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod timeout;
