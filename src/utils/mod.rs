//! Utility functions and helpers

pub mod addr;

pub use addr::{extract_host, extract_host_port, extract_port, split_host_port, SplitHostPortError};
