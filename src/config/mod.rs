//! # Configuration Management
//!
//! Settings are read from `KEYPLANE_*` environment variables (optionally
//! loaded from a `.env` file by the binary) and validated before use.

pub mod settings;

pub use settings::{
    AppConfig, AwsKmsConfig, GcpKmsConfig, KeyStoreConfig, ObservabilityConfig, Pkcs11Config,
    RawKeyStoreConfig,
};
