//! qx CLI library
//!
//! This module exports the CLI components for use in the `qx` binary and in
//! integration tests.

pub mod commands;
pub mod exit_code;
pub mod output;
