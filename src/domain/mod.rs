//! Domain layer
//!
//! Certificate authority records and the key pair entries they hold. These
//! types have no dependency on any key backend.

pub mod cert_authority;
pub mod key;

pub use cert_authority::{
    ActiveKeys, CertAuthority, CertAuthorityRecord, Protocol, SshSigningAlgorithm,
};
pub use key::{KeyIdentifier, KeyPair, PrivateKeyType};
