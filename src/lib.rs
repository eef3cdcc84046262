//! FARMBOT: opportunistic liquidity-farm agent
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod commands;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod exchange;
pub mod telegram;
pub mod types;
