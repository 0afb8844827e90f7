//! embucket-loader - runs SQL load scripts against Embucket, one statement at a time.
//!
//! This library exposes the core modules for the binary and integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod loader;
pub mod logging;
pub mod script;
pub mod staging;
