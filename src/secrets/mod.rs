//! Redacting wrappers for sensitive values.
//!
//! Secrets are never logged or exposed in error messages; the only way to
//! read one is an explicit `expose_secret()` call.

pub mod types;

pub use types::{SecretBytes, SecretString};
