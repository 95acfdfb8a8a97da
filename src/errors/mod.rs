//! # Error Handling
//!
//! Every failure is wrapped with local context where it crosses a component
//! boundary (backend → manager → caller) and returned. Nothing in this crate
//! logs an error and swallows it.

pub mod types;

pub use types::{ErrorKind, KeyplaneError, Result};
