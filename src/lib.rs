//! ALPHA COUNCIL: council-of-agents trading bot for prediction markets.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod state;
pub mod llm;
pub mod agents;
pub mod council;
pub mod platforms;
pub mod strategy;
pub mod engine;
pub mod storage;
pub mod dashboard;
