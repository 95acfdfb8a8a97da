//! # Observability Infrastructure
//!
//! Structured logging for the key store. Resolution decisions are logged at
//! `debug`, backend registration and reconfiguration at `info`. Key material
//! never reaches a log line; identifiers and secrets redact themselves.

pub mod logging;

pub use logging::{init_logging, log_config_info};
