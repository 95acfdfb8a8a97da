//! Key stores backed by an external key service
//!
//! Hardware security modules and cloud KMS offerings keep the private key
//! out of process. The CA record only stores an opaque `<prefix>:<handle>`
//! reference; all key operations go through a [`KeyService`] client.

use super::backend::{first_key_pair, required_key, CallOptions, KeyStore, TlsCertAndSigner};
use super::jwt::JwtSigner;
use super::signer::Signer;
use super::ssh::SshSigner;
use crate::domain::{CertAuthority, KeyIdentifier, PrivateKeyType, Protocol};
use crate::errors::{KeyplaneError, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Client for an external key service (PKCS#11 module, GCP KMS, AWS KMS).
///
/// Handles are the service's own key names. Every call receives the
/// caller's timeout, or the configured request timeout when the caller set
/// none; the client is expected to enforce it.
pub trait KeyService: Send + Sync + fmt::Debug {
    /// Create an RSA key named `label` and return its handle.
    fn create_rsa_key(&self, label: &str, timeout: Duration) -> Result<String>;

    /// Signer that forwards to the service for `handle`.
    fn signer(&self, handle: &str, timeout: Duration) -> Result<Arc<dyn Signer>>;

    /// Delete `handle`. A handle that no longer exists is not an error.
    fn delete_key(&self, handle: &str, timeout: Duration) -> Result<()>;
}

/// Key store for any backend whose keys live behind a [`KeyService`].
#[derive(Debug)]
pub struct ExternalKeyStore {
    key_type: PrivateKeyType,
    prefix: &'static str,
    service: Arc<dyn KeyService>,
    request_timeout: Duration,
}

impl ExternalKeyStore {
    pub fn new(
        key_type: PrivateKeyType,
        service: Arc<dyn KeyService>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let prefix = key_type.reference_prefix().ok_or_else(|| {
            KeyplaneError::config(format!("{} keys are not held by an external service", key_type))
        })?;
        info!(key_type = %key_type, timeout_secs = request_timeout.as_secs(), "Created external key store");
        Ok(Self { key_type, prefix, service, request_timeout })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    fn handle<'a>(&self, id: &'a KeyIdentifier) -> Result<&'a str> {
        match id.reference_parts() {
            Some((prefix, handle)) if prefix == self.prefix => Ok(handle),
            Some((prefix, _)) => Err(KeyplaneError::bad_parameter(format!(
                "key reference with prefix {:?} cannot be used by the {} key store",
                prefix, self.key_type
            ))),
            None => Err(KeyplaneError::bad_parameter(format!(
                "malformed {} key reference",
                self.key_type
            ))),
        }
    }
}

impl KeyStore for ExternalKeyStore {
    fn key_type(&self) -> PrivateKeyType {
        self.key_type
    }

    fn generate_rsa_with(&self, options: &CallOptions) -> Result<(KeyIdentifier, Arc<dyn Signer>)> {
        let timeout = options.timeout_or(self.request_timeout)?;
        let label = format!("keyplane-{}", Uuid::new_v4());
        let handle = self.service.create_rsa_key(&label, timeout).map_err(|e| {
            KeyplaneError::generation_with_source(
                format!("{} service failed to create key", self.key_type),
                Box::new(e),
            )
        })?;
        let signer = self.service.signer(&handle, timeout)?;
        debug!(key_type = %self.key_type, label = %label, timeout = ?timeout, "Created external RSA key");
        Ok((KeyIdentifier::from_reference(self.prefix, &handle), signer))
    }

    fn get_signer_with(&self, id: &KeyIdentifier, options: &CallOptions) -> Result<Arc<dyn Signer>> {
        let handle = self.handle(id)?;
        self.service.signer(handle, options.timeout_or(self.request_timeout)?)
    }

    fn get_tls_cert_and_signer_with(
        &self,
        ca: &dyn CertAuthority,
        options: &CallOptions,
    ) -> Result<TlsCertAndSigner> {
        let pair = first_key_pair(ca, Protocol::Tls, self.key_type)?;
        let signer = match pair.key.as_ref().filter(|key| !key.is_empty()) {
            Some(key) => Some(self.get_signer_with(key, options)?),
            None => None,
        };
        Ok(TlsCertAndSigner { cert: pair.cert.clone(), signer })
    }

    fn get_ssh_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<SshSigner> {
        let pair = first_key_pair(ca, Protocol::Ssh, self.key_type)?;
        let key = required_key(pair, Protocol::Ssh, ca.cluster_name())?;
        Ok(SshSigner::new(self.get_signer_with(key, options)?).with_algorithm(ca.ssh_signing_alg()))
    }

    fn get_jwt_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<JwtSigner> {
        let pair = first_key_pair(ca, Protocol::Jwt, self.key_type)?;
        let key = required_key(pair, Protocol::Jwt, ca.cluster_name())?;
        Ok(JwtSigner::new(self.get_signer_with(key, options)?))
    }

    fn delete_key_with(&self, id: &KeyIdentifier, options: &CallOptions) -> Result<()> {
        let handle = self.handle(id)?;
        self.service.delete_key(handle, options.timeout_or(self.request_timeout)?)
    }
}
