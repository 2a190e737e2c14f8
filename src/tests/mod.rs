//! Integration-level tests for the routing engine
//!
//! This module contains property-based tests using proptest alongside
//! scenario tests that exercise whole router flows end to end.

#[cfg(test)]
pub mod pipeline_tests;
