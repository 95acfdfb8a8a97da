//! Key store trait and types
//!
//! Defines the uniform interface every private key backend implements.

use super::jwt::JwtSigner;
use super::signer::Signer;
use super::ssh::SshSigner;
use crate::domain::{CertAuthority, KeyIdentifier, KeyPair, PrivateKeyType, Protocol};
use crate::errors::{KeyplaneError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Per-call settings for key store operations.
///
/// Backends that reach an external service bound every request by
/// `timeout`; software keys ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// `None` uses the backend's configured request timeout.
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }

    /// Caller's timeout, or `default` when none was given.
    pub fn timeout_or(&self, default: Duration) -> Result<Duration> {
        match self.timeout {
            Some(timeout) if timeout.is_zero() => {
                Err(KeyplaneError::bad_parameter("request timeout must be greater than zero"))
            }
            Some(timeout) => Ok(timeout),
            None => Ok(default),
        }
    }
}

/// TLS certificate of a CA with its signer, when the private key is held here.
#[derive(Clone)]
pub struct TlsCertAndSigner {
    /// PEM certificate, always present
    pub cert: Vec<u8>,
    /// `None` when the CA only holds verification material for this key
    pub signer: Option<Arc<dyn Signer>>,
}

impl fmt::Debug for TlsCertAndSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCertAndSigner")
            .field("cert_len", &self.cert.len())
            .field("signer", &self.signer.as_ref().map(|s| s.algorithm()))
            .finish()
    }
}

/// Trait for private key backends
///
/// Implementations must be Send + Sync; every operation may be called
/// concurrently from many threads. Implementors provide the `*_with`
/// methods; the plain forms run with default [`CallOptions`].
pub trait KeyStore: Send + Sync + fmt::Debug {
    /// Key type this backend services
    fn key_type(&self) -> PrivateKeyType;

    /// Create a new RSA key
    ///
    /// # Returns
    /// The identifier to store in the CA record and a signer for the new key.
    fn generate_rsa_with(&self, options: &CallOptions) -> Result<(KeyIdentifier, Arc<dyn Signer>)>;

    /// Resolve an identifier previously returned by key generation
    fn get_signer_with(&self, id: &KeyIdentifier, options: &CallOptions) -> Result<Arc<dyn Signer>>;

    /// Certificate and signer of the first TLS key pair of this backend's type
    fn get_tls_cert_and_signer_with(
        &self,
        ca: &dyn CertAuthority,
        options: &CallOptions,
    ) -> Result<TlsCertAndSigner>;

    /// SSH signer of the first SSH key pair of this backend's type, tagged
    /// with the CA's signing algorithm
    fn get_ssh_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<SshSigner>;

    /// JWT signer of the first JWT key pair of this backend's type
    fn get_jwt_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<JwtSigner>;

    /// Delete a key. Deleting a key that does not exist succeeds.
    fn delete_key_with(&self, id: &KeyIdentifier, options: &CallOptions) -> Result<()>;

    fn generate_rsa(&self) -> Result<(KeyIdentifier, Arc<dyn Signer>)> {
        self.generate_rsa_with(&CallOptions::default())
    }

    fn get_signer(&self, id: &KeyIdentifier) -> Result<Arc<dyn Signer>> {
        self.get_signer_with(id, &CallOptions::default())
    }

    fn get_tls_cert_and_signer(&self, ca: &dyn CertAuthority) -> Result<TlsCertAndSigner> {
        self.get_tls_cert_and_signer_with(ca, &CallOptions::default())
    }

    fn get_ssh_signer(&self, ca: &dyn CertAuthority) -> Result<SshSigner> {
        self.get_ssh_signer_with(ca, &CallOptions::default())
    }

    fn get_jwt_signer(&self, ca: &dyn CertAuthority) -> Result<JwtSigner> {
        self.get_jwt_signer_with(ca, &CallOptions::default())
    }

    fn delete_key(&self, id: &KeyIdentifier) -> Result<()> {
        self.delete_key_with(id, &CallOptions::default())
    }
}

/// First key pair of `key_type` for `protocol`, in stored order.
pub fn first_key_pair<'a>(
    ca: &'a dyn CertAuthority,
    protocol: Protocol,
    key_type: PrivateKeyType,
) -> Result<&'a KeyPair> {
    ca.active_keys(protocol).iter().find(|pair| pair.key_type == key_type).ok_or_else(|| {
        KeyplaneError::not_found(format!(
            "no matching {} key pairs found in CA for {:?}",
            protocol.as_str().to_uppercase(),
            ca.cluster_name()
        ))
    })
}

/// Private key identifier of a key pair, required for SSH and JWT signing.
pub fn required_key<'a>(
    pair: &'a KeyPair,
    protocol: Protocol,
    cluster: &str,
) -> Result<&'a KeyIdentifier> {
    pair.key.as_ref().filter(|key| !key.is_empty()).ok_or_else(|| {
        KeyplaneError::bad_parameter(format!(
            "{} key pair for {:?} has no private key",
            protocol.as_str().to_uppercase(),
            cluster
        ))
    })
}
