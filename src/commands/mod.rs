//! Command implementations for the CLI
//!
//! - start: Start the log service
//! - test: Test configuration validity
//! - config: Configuration display and validation
//! - logs: Query stored log records
//! - purge: Delete old log records

pub mod config;
pub mod logs;
pub mod purge;
pub mod start;
pub mod test;
