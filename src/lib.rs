//! Branch Manager - browse and tidy the local branches of a git repository
//!
//! The library holds everything the `branch-manager` binary serves, so the
//! HTTP router and the branch service can be exercised directly in tests.

pub mod branches;
pub mod cache;
pub mod config;
pub mod git;
pub mod logging;
pub mod rest;
