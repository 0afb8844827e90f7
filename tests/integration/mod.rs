//! Integration tests for the loader.

pub mod live_test;
pub mod load_test;
