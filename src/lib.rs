//! Safe Commenter Library
//!
//! Auto-commenter for messaging channels, throttled by a dual-window
//! admission controller so replies stay under hourly and daily caps.

pub mod bot;
pub mod config;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
