//! Rate Limiting Module
//!
//! Dual-window admission control for rate-limited actions. Every action must
//! fit inside both a short window (one hour by default) and a long window
//! (one day by default).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Admission Controller                       │
//! │      request_admission / rollback / status, shutdown         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────┐   │
//! │  │                  Window Ledger                       │   │
//! │  │   ┌──────────────────┐    ┌──────────────────┐      │   │
//! │  │   │  Short window    │    │  Long window     │      │   │
//! │  │   │  (sliding log)   │    │  (sliding log)   │      │   │
//! │  │   └──────────────────┘    └──────────────────┘      │   │
//! │  └─────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod ledger;
pub mod window;

pub use config::AdmissionConfig;
pub use controller::{Admission, AdmissionController, AdmissionStatus};
pub use error::{AdmissionError, ConfigurationError};
pub use ledger::{Decision, WindowCounts, WindowLedger};
pub use window::{AdmissionTicket, SlidingWindow, WindowEntry, WindowKind, WindowStatus};
