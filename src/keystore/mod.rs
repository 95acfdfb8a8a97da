//! # Key store
//!
//! Owns, resolves and exposes the private keys that back a certificate
//! authority's SSH, TLS and JWT signing.
//!
//! - [`KeyStore`]: the uniform backend contract, with per-call [`CallOptions`]
//! - [`RawKeyStore`]: software keys stored in the CA record
//! - [`ExternalKeyStore`]: keys behind a [`KeyService`] (PKCS#11, GCP KMS, AWS KMS)
//! - [`KeyStoreManager`]: routes generation to the active backend and
//!   resolution to whichever backend owns a CA's key

pub mod backend;
pub mod external;
pub mod generator;
pub mod jwt;
pub mod manager;
pub mod pem;
pub mod raw;
pub mod signer;
pub mod ssh;

pub use backend::{CallOptions, KeyStore, TlsCertAndSigner};
pub use external::{ExternalKeyStore, KeyService};
pub use generator::{generate_rsa_key_pair, rsa_key_pair_source, GeneratedKeyPair, RsaKeyPairSource};
pub use jwt::JwtSigner;
pub use manager::{BackendServices, KeyStoreManager};
pub use pem::parse_private_key_pem;
pub use raw::{RawConfig, RawKeyStore};
pub use signer::{KeyAlgorithm, LocalSigner, SignatureScheme, Signer};
pub use ssh::{SshSignature, SshSigner};
