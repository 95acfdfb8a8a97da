//! # Keyplane
//!
//! Pluggable key storage for a certificate authority. Keyplane owns,
//! resolves and exposes the private keys used to sign SSH certificates, TLS
//! certificates and JWTs, wherever those keys live: in the CA record itself,
//! in a hardware security module, or in a cloud KMS.
//!
//! ## Architecture
//!
//! ```text
//! caller → KeyStoreManager ─┬─ RawKeyStore (PEM keys in the CA record)
//!                           └─ ExternalKeyStore → KeyService (PKCS#11, GCP KMS, AWS KMS)
//! ```
//!
//! A CA can hold keys of several backend types at once while it migrates
//! between backends. New keys are created in the active backend; existing
//! keys resolve through the first entry whose type a configured backend
//! services.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use keyplane::config::KeyStoreConfig;
//! use keyplane::domain::CertAuthorityRecord;
//! use keyplane::keystore::{BackendServices, KeyStoreManager};
//!
//! fn main() -> keyplane::Result<()> {
//!     let manager = KeyStoreManager::from_config(&KeyStoreConfig::from_env()?, &BackendServices::default())?;
//!     let ca: CertAuthorityRecord = serde_json::from_str(&std::fs::read_to_string("ca.json")?)?;
//!     let signer = manager.get_jwt_signer(&ca)?;
//!     let token = signer.sign_claims(&serde_json::json!({"sub": "alice"}), None)?;
//!     println!("{token}");
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod keystore;
pub mod observability;
pub mod secrets;
pub mod utils;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use domain::{CertAuthority, CertAuthorityRecord, KeyIdentifier, KeyPair, PrivateKeyType, Protocol};
pub use errors::{KeyplaneError, Result};
pub use keystore::{KeyStore, KeyStoreManager, Signer};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
