//! Side-effecting helpers: configuration files and child processes.

pub mod command_test;
pub mod config;
pub mod process;
