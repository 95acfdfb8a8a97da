//! Certificate authority records as seen by the key store.
//!
//! The CA subsystem owns these records; the key store only reads them. The
//! boundary is the [`CertAuthority`] trait so callers can hand in their own
//! record type. [`CertAuthorityRecord`] is the serde implementation used by
//! the CLI and the tests.

use super::key::KeyPair;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signing protocol a key pair is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Ssh,
    Tls,
    Jwt,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Ssh, Protocol::Tls, Protocol::Jwt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ssh => "ssh",
            Self::Tls => "tls",
            Self::Jwt => "jwt",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SSH signature algorithm configured on a CA.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SshSigningAlgorithm {
    /// No explicit choice; resolves to `rsa-sha2-512`
    #[default]
    Unspecified,
    /// `ssh-rsa` (SHA-1)
    RsaSha1,
    /// `rsa-sha2-256`
    RsaSha256,
    /// `rsa-sha2-512`
    RsaSha512,
}

impl SshSigningAlgorithm {
    /// SSH wire name of the algorithm, with `Unspecified` resolved.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "ssh-rsa",
            Self::RsaSha256 => "rsa-sha2-256",
            Self::Unspecified | Self::RsaSha512 => "rsa-sha2-512",
        }
    }

    /// `Unspecified` replaced by the default algorithm.
    pub fn resolved(self) -> Self {
        match self {
            Self::Unspecified => Self::RsaSha512,
            other => other,
        }
    }
}

/// Ordered key pairs per protocol. Insertion order is the resolution tie-break.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveKeys {
    #[serde(default)]
    pub ssh: Vec<KeyPair>,
    #[serde(default)]
    pub tls: Vec<KeyPair>,
    #[serde(default)]
    pub jwt: Vec<KeyPair>,
}

impl ActiveKeys {
    pub fn get(&self, protocol: Protocol) -> &[KeyPair] {
        match protocol {
            Protocol::Ssh => &self.ssh,
            Protocol::Tls => &self.tls,
            Protocol::Jwt => &self.jwt,
        }
    }

    pub fn push(&mut self, protocol: Protocol, key_pair: KeyPair) {
        match protocol {
            Protocol::Ssh => self.ssh.push(key_pair),
            Protocol::Tls => self.tls.push(key_pair),
            Protocol::Jwt => self.jwt.push(key_pair),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ssh.is_empty() && self.tls.is_empty() && self.jwt.is_empty()
    }
}

/// Read-only view of a certificate authority.
pub trait CertAuthority: Send + Sync {
    /// Immutable cluster name, used for error attribution.
    fn cluster_name(&self) -> &str;

    /// Key pairs for `protocol`, in stored order.
    fn active_keys(&self, protocol: Protocol) -> &[KeyPair];

    /// Algorithm SSH signers of this CA are tagged with.
    fn ssh_signing_alg(&self) -> SshSigningAlgorithm;
}

/// Serializable certificate authority record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertAuthorityRecord {
    pub cluster_name: String,

    #[serde(default)]
    pub signing_alg: SshSigningAlgorithm,

    #[serde(default)]
    pub active_keys: ActiveKeys,
}

impl CertAuthorityRecord {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            signing_alg: SshSigningAlgorithm::default(),
            active_keys: ActiveKeys::default(),
        }
    }

    pub fn with_signing_alg(mut self, signing_alg: SshSigningAlgorithm) -> Self {
        self.signing_alg = signing_alg;
        self
    }

    /// Append a key pair for `protocol` after any existing ones.
    pub fn with_key(mut self, protocol: Protocol, key_pair: KeyPair) -> Self {
        self.active_keys.push(protocol, key_pair);
        self
    }
}

impl CertAuthority for CertAuthorityRecord {
    fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    fn active_keys(&self, protocol: Protocol) -> &[KeyPair] {
        self.active_keys.get(protocol)
    }

    fn ssh_signing_alg(&self) -> SshSigningAlgorithm {
        self.signing_alg
    }
}
