//! Software key store
//!
//! Keys are PEM-encoded private keys stored directly in the CA record. The
//! identifier *is* the key, so this backend never holds state of its own.

use super::backend::{first_key_pair, required_key, CallOptions, KeyStore, TlsCertAndSigner};
use super::generator::{rsa_key_pair_source, RsaKeyPairSource};
use super::jwt::JwtSigner;
use super::pem::parse_private_key_pem;
use super::signer::Signer;
use super::ssh::SshSigner;
use crate::config::RawKeyStoreConfig;
use crate::domain::{CertAuthority, KeyIdentifier, PrivateKeyType, Protocol};
use crate::errors::{KeyplaneError, Result};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Construction parameters of the software key store.
#[derive(Clone)]
pub struct RawConfig {
    pub rsa_key_pair_source: Arc<dyn RsaKeyPairSource>,
}

impl RawConfig {
    pub fn new(rsa_key_pair_source: Arc<dyn RsaKeyPairSource>) -> Self {
        Self { rsa_key_pair_source }
    }

    /// Production generator with the configured modulus size.
    pub fn from_settings(settings: &RawKeyStoreConfig) -> Self {
        Self::new(rsa_key_pair_source(settings.rsa_key_bits))
    }
}

pub struct RawKeyStore {
    rsa_key_pair_source: Arc<dyn RsaKeyPairSource>,
}

impl fmt::Debug for RawKeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawKeyStore").finish_non_exhaustive()
    }
}

impl RawKeyStore {
    pub fn new(config: RawConfig) -> Self {
        Self { rsa_key_pair_source: config.rsa_key_pair_source }
    }

    fn parse(&self, id: &KeyIdentifier) -> Result<Arc<dyn Signer>> {
        let signer = parse_private_key_pem(id.expose_secret())?;
        Ok(Arc::new(signer))
    }
}

impl KeyStore for RawKeyStore {
    fn key_type(&self) -> PrivateKeyType {
        PrivateKeyType::Raw
    }

    fn generate_rsa_with(&self, _options: &CallOptions) -> Result<(KeyIdentifier, Arc<dyn Signer>)> {
        let generated = self.rsa_key_pair_source.generate("")?;
        let id = KeyIdentifier::from(generated.private_key);
        let signer = self.parse(&id).map_err(|e| {
            KeyplaneError::generation_with_source("generated private key is unusable", Box::new(e))
        })?;
        Ok((id, signer))
    }

    fn get_signer_with(&self, id: &KeyIdentifier, _options: &CallOptions) -> Result<Arc<dyn Signer>> {
        self.parse(id)
    }

    fn get_tls_cert_and_signer_with(
        &self,
        ca: &dyn CertAuthority,
        _options: &CallOptions,
    ) -> Result<TlsCertAndSigner> {
        let pair = first_key_pair(ca, Protocol::Tls, PrivateKeyType::Raw)?;
        let signer = match pair.key.as_ref().filter(|key| !key.is_empty()) {
            Some(key) => Some(self.parse(key)?),
            None => {
                debug!(cluster = %ca.cluster_name(), "TLS key pair has no private key, returning certificate only");
                None
            }
        };
        Ok(TlsCertAndSigner { cert: pair.cert.clone(), signer })
    }

    fn get_ssh_signer_with(&self, ca: &dyn CertAuthority, _options: &CallOptions) -> Result<SshSigner> {
        let pair = first_key_pair(ca, Protocol::Ssh, PrivateKeyType::Raw)?;
        let key = required_key(pair, Protocol::Ssh, ca.cluster_name())?;
        let signer = SshSigner::new(self.parse(key)?).with_algorithm(ca.ssh_signing_alg());
        debug!(cluster = %ca.cluster_name(), algorithm = signer.algorithm_name(), "Resolved raw SSH signer");
        Ok(signer)
    }

    fn get_jwt_signer_with(&self, ca: &dyn CertAuthority, _options: &CallOptions) -> Result<JwtSigner> {
        let pair = first_key_pair(ca, Protocol::Jwt, PrivateKeyType::Raw)?;
        let key = required_key(pair, Protocol::Jwt, ca.cluster_name())?;
        Ok(JwtSigner::new(self.parse(key)?))
    }

    fn delete_key_with(&self, _id: &KeyIdentifier, _options: &CallOptions) -> Result<()> {
        // Raw keys live only in the CA record; there is nothing to delete.
        Ok(())
    }
}
