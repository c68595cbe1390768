//! yfi Core Library
//!
//! This library provides the collection and report-synthesis engine:
//! - Command execution, fact extraction and the bounded catalog pool
//! - The background capture state machine
//! - Host discovery and capability checks
//! - Report synthesis (narrative, highlights, score, JSON, Markdown)
//! - Run sessions, logging and exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod capabilities;
pub mod capture;
pub mod collect;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod report;
pub mod run;
pub mod session;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod mock_runner;
