//! Threshold agent
//!
//! Configuration loading and the HTTP API of the `threshold-agent` binary.

pub mod api;
pub mod config;
