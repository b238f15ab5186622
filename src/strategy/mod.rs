//! Trading strategies that feed signals into the execution gate.

pub mod correlation;
pub mod whale;

pub use correlation::{AlphaPolicy, CorrelationAlpha};
pub use whale::{default_whales, CopyPolicy, WhaleProfile, WhaleWatcher};
