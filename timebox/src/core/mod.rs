//! Deterministic logic shared by the timeout machinery.
//!
//! Core modules spawn no threads and touch no files. They define outcome
//! types, the shared result slot, and the race resolution rules.

pub mod arbiter;
pub mod failure;
pub mod slot;
pub mod types;
