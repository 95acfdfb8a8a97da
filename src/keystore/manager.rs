//! Key store manager
//!
//! Multiplexes signing requests across every configured backend. New keys
//! are always created in the active backend; existing keys are resolved by
//! the first entry in a CA's key list whose type a configured backend
//! services, so keys of a previous backend keep working during a migration.

use super::backend::{CallOptions, KeyStore, TlsCertAndSigner};
use super::external::{ExternalKeyStore, KeyService};
use super::jwt::JwtSigner;
use super::raw::{RawConfig, RawKeyStore};
use super::signer::{KeyAlgorithm, SignatureScheme, Signer};
use super::ssh::{authorized_key, SshSigner};
use crate::config::KeyStoreConfig;
use crate::domain::{CertAuthority, KeyIdentifier, KeyPair, PrivateKeyType, Protocol};
use crate::errors::{KeyplaneError, Result};
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyUsagePurpose,
    RemoteKeyPair, SignatureAlgorithm,
};
use std::fmt;
use std::sync::{Arc, RwLock};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

/// Validity of CA certificates created by [`KeyStoreManager::new_tls_key_pair`]
pub const CA_CERT_VALIDITY_DAYS: i64 = 3650;

/// Clients for the external key services, injected by the embedding process.
#[derive(Debug, Clone, Default)]
pub struct BackendServices {
    pub pkcs11: Option<Arc<dyn KeyService>>,
    pub gcp_kms: Option<Arc<dyn KeyService>>,
    pub aws_kms: Option<Arc<dyn KeyService>>,
}

impl BackendServices {
    fn get(&self, key_type: PrivateKeyType) -> Option<Arc<dyn KeyService>> {
        match key_type {
            PrivateKeyType::Raw => None,
            PrivateKeyType::Pkcs11 => self.pkcs11.clone(),
            PrivateKeyType::GcpKms => self.gcp_kms.clone(),
            PrivateKeyType::AwsKms => self.aws_kms.clone(),
        }
    }
}

/// Immutable set of backends; replaced as a whole on reconfiguration.
struct BackendSet {
    active: Arc<dyn KeyStore>,
    /// Active backend first, then the others in configured order
    backends: Vec<Arc<dyn KeyStore>>,
}

impl BackendSet {
    fn new(active: Arc<dyn KeyStore>, others: Vec<Arc<dyn KeyStore>>) -> Result<Self> {
        let mut backends = Vec::with_capacity(others.len() + 1);
        backends.push(active.clone());
        for backend in others {
            if backends.iter().any(|b| b.key_type() == backend.key_type()) {
                return Err(KeyplaneError::config(format!(
                    "key store backend {} is configured more than once",
                    backend.key_type()
                )));
            }
            backends.push(backend);
        }
        Ok(Self { active, backends })
    }

    fn backend(&self, key_type: PrivateKeyType) -> Option<&Arc<dyn KeyStore>> {
        self.backends.iter().find(|b| b.key_type() == key_type)
    }

    /// First key pair for `protocol` whose type has a backend, with that backend.
    fn resolve<'a>(
        &self,
        ca: &'a dyn CertAuthority,
        protocol: Protocol,
    ) -> Result<(&'a KeyPair, Arc<dyn KeyStore>)> {
        ca.active_keys(protocol)
            .iter()
            .find_map(|pair| self.backend(pair.key_type).map(|b| (pair, b.clone())))
            .ok_or_else(|| {
                KeyplaneError::not_found(format!(
                    "no {} key pairs of a configured type found in CA for {:?}",
                    protocol.as_str().to_uppercase(),
                    ca.cluster_name()
                ))
            })
    }
}

/// Routes key operations to the backend that owns each key.
pub struct KeyStoreManager {
    state: RwLock<Arc<BackendSet>>,
}

impl fmt::Debug for KeyStoreManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        f.debug_struct("KeyStoreManager")
            .field("active", &state.active.key_type())
            .field("backends", &state.backends.iter().map(|b| b.key_type()).collect::<Vec<_>>())
            .finish()
    }
}

impl KeyStoreManager {
    /// Create a manager from an active backend and any additional backends.
    pub fn new(active: Arc<dyn KeyStore>, others: Vec<Arc<dyn KeyStore>>) -> Result<Self> {
        let state = BackendSet::new(active, others)?;
        log_backends(&state, "Initialized key store manager");
        Ok(Self { state: RwLock::new(Arc::new(state)) })
    }

    /// Build every configured backend.
    ///
    /// The raw backend is always registered so keys created before a
    /// migration to an external backend stay resolvable.
    pub fn from_config(config: &KeyStoreConfig, services: &BackendServices) -> Result<Self> {
        let raw: Arc<dyn KeyStore> = Arc::new(RawKeyStore::new(RawConfig::from_settings(&config.raw)));
        let mut external: Vec<Arc<dyn KeyStore>> = Vec::new();

        for key_type in [PrivateKeyType::Pkcs11, PrivateKeyType::GcpKms, PrivateKeyType::AwsKms] {
            if !config.section_configured(key_type) {
                continue;
            }
            if !backend_compiled_in(key_type) {
                return Err(KeyplaneError::config(format!(
                    "{} key store support is not compiled into this build",
                    key_type
                )));
            }
            let service = services.get(key_type).ok_or_else(|| {
                KeyplaneError::config(format!(
                    "{} key store is configured but no key service client was provided",
                    key_type
                ))
            })?;
            info!(key_type = %key_type, "Registering external key store");
            external.push(Arc::new(ExternalKeyStore::new(key_type, service, config.request_timeout())?));
        }

        let mut backends = vec![raw];
        backends.extend(external);
        let index = backends
            .iter()
            .position(|b| b.key_type() == config.active_backend)
            .ok_or_else(|| {
                KeyplaneError::config(format!(
                    "active key store backend {} is not configured",
                    config.active_backend
                ))
            })?;
        let active = backends.remove(index);
        Self::new(active, backends)
    }

    /// Atomically replace the backend set.
    ///
    /// Operations already in flight finish against the old set.
    pub fn reconfigure(&self, active: Arc<dyn KeyStore>, others: Vec<Arc<dyn KeyStore>>) -> Result<()> {
        let state = Arc::new(BackendSet::new(active, others)?);
        log_backends(&state, "Reconfigured key store manager");
        let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
        *guard = state;
        Ok(())
    }

    fn snapshot(&self) -> Arc<BackendSet> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Key type new keys are created with
    pub fn active_key_type(&self) -> PrivateKeyType {
        self.snapshot().active.key_type()
    }

    /// Registered key types, active first
    pub fn registered_backends(&self) -> Vec<PrivateKeyType> {
        self.snapshot().backends.iter().map(|b| b.key_type()).collect()
    }

    pub fn has_backend(&self, key_type: PrivateKeyType) -> bool {
        self.snapshot().backend(key_type).is_some()
    }

    /// Create an RSA key in the active backend.
    pub fn generate_rsa(&self) -> Result<(PrivateKeyType, KeyIdentifier, Arc<dyn Signer>)> {
        self.generate_rsa_with(&CallOptions::default())
    }

    pub fn generate_rsa_with(
        &self,
        options: &CallOptions,
    ) -> Result<(PrivateKeyType, KeyIdentifier, Arc<dyn Signer>)> {
        let _span = crate::keystore_span!("generate_rsa").entered();
        let active = self.snapshot().active.clone();
        let key_type = active.key_type();
        let (id, signer) = active
            .generate_rsa_with(options)
            .map_err(|e| e.in_backend(key_type, "generate_rsa", None))?;
        debug!(key_type = %key_type, "Generated RSA key");
        Ok((key_type, id, signer))
    }

    /// New SSH CA key pair; `cert` holds the `authorized_keys` line.
    pub fn new_ssh_key_pair(&self) -> Result<KeyPair> {
        self.new_ssh_key_pair_with(&CallOptions::default())
    }

    pub fn new_ssh_key_pair_with(&self, options: &CallOptions) -> Result<KeyPair> {
        let (key_type, id, signer) = self.generate_rsa_with(options)?;
        let public = authorized_key(signer.as_ref())?;
        Ok(KeyPair::new(key_type, public.into_bytes(), id))
    }

    /// New TLS CA key pair with a self-signed CA certificate for `cluster_name`.
    pub fn new_tls_key_pair(&self, cluster_name: &str) -> Result<KeyPair> {
        self.new_tls_key_pair_with(cluster_name, &CallOptions::default())
    }

    pub fn new_tls_key_pair_with(&self, cluster_name: &str, options: &CallOptions) -> Result<KeyPair> {
        let (key_type, id, signer) = self.generate_rsa_with(options)?;
        let key_pair = remote_key_pair(signer)?;

        let mut params = CertificateParams::default();
        let mut name = DistinguishedName::new();
        name.push(DnType::CommonName, cluster_name);
        name.push(DnType::OrganizationName, cluster_name);
        params.distinguished_name = name;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let now = OffsetDateTime::now_utc();
        params.not_before = now - Duration::minutes(1);
        params.not_after = now + Duration::days(CA_CERT_VALIDITY_DAYS);

        let cert = params.self_signed(&key_pair).map_err(|e| {
            KeyplaneError::generation_with_source("failed to self-sign CA certificate", Box::new(e))
        })?;
        info!(key_type = %key_type, cluster = %cluster_name, "Created TLS CA certificate");
        Ok(KeyPair::new(key_type, cert.pem().into_bytes(), id))
    }

    /// New JWT key pair; `cert` holds the PEM public key.
    pub fn new_jwt_key_pair(&self) -> Result<KeyPair> {
        self.new_jwt_key_pair_with(&CallOptions::default())
    }

    pub fn new_jwt_key_pair_with(&self, options: &CallOptions) -> Result<KeyPair> {
        let (key_type, id, signer) = self.generate_rsa_with(options)?;
        let public = remote_key_pair(signer)?.public_key_pem();
        Ok(KeyPair::new(key_type, public.into_bytes(), id))
    }

    /// Resolve an identifier in the backend for `key_type`.
    pub fn get_signer(&self, key_type: PrivateKeyType, id: &KeyIdentifier) -> Result<Arc<dyn Signer>> {
        self.get_signer_with(key_type, id, &CallOptions::default())
    }

    pub fn get_signer_with(
        &self,
        key_type: PrivateKeyType,
        id: &KeyIdentifier,
        options: &CallOptions,
    ) -> Result<Arc<dyn Signer>> {
        let backend = self.backend_for(key_type)?;
        backend.get_signer_with(id, options).map_err(|e| e.in_backend(key_type, "get_signer", None))
    }

    pub fn get_tls_cert_and_signer(&self, ca: &dyn CertAuthority) -> Result<TlsCertAndSigner> {
        self.get_tls_cert_and_signer_with(ca, &CallOptions::default())
    }

    pub fn get_tls_cert_and_signer_with(
        &self,
        ca: &dyn CertAuthority,
        options: &CallOptions,
    ) -> Result<TlsCertAndSigner> {
        let _span = crate::keystore_span!("get_tls_cert_and_signer", ca.cluster_name()).entered();
        let (pair, backend) = self.snapshot().resolve(ca, Protocol::Tls)?;
        debug!(cluster = %ca.cluster_name(), key_type = %pair.key_type, "Resolving TLS signer");
        backend
            .get_tls_cert_and_signer_with(ca, options)
            .map_err(|e| e.in_backend(pair.key_type, "get_tls_cert_and_signer", Some(ca.cluster_name())))
    }

    pub fn get_ssh_signer(&self, ca: &dyn CertAuthority) -> Result<SshSigner> {
        self.get_ssh_signer_with(ca, &CallOptions::default())
    }

    pub fn get_ssh_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<SshSigner> {
        let _span = crate::keystore_span!("get_ssh_signer", ca.cluster_name()).entered();
        let (pair, backend) = self.snapshot().resolve(ca, Protocol::Ssh)?;
        debug!(cluster = %ca.cluster_name(), key_type = %pair.key_type, "Resolving SSH signer");
        backend
            .get_ssh_signer_with(ca, options)
            .map_err(|e| e.in_backend(pair.key_type, "get_ssh_signer", Some(ca.cluster_name())))
    }

    pub fn get_jwt_signer(&self, ca: &dyn CertAuthority) -> Result<JwtSigner> {
        self.get_jwt_signer_with(ca, &CallOptions::default())
    }

    pub fn get_jwt_signer_with(&self, ca: &dyn CertAuthority, options: &CallOptions) -> Result<JwtSigner> {
        let _span = crate::keystore_span!("get_jwt_signer", ca.cluster_name()).entered();
        let (pair, backend) = self.snapshot().resolve(ca, Protocol::Jwt)?;
        debug!(cluster = %ca.cluster_name(), key_type = %pair.key_type, "Resolving JWT signer");
        backend
            .get_jwt_signer_with(ca, options)
            .map_err(|e| e.in_backend(pair.key_type, "get_jwt_signer", Some(ca.cluster_name())))
    }

    /// Delete a key from the backend for `key_type`.
    pub fn delete_key(&self, key_type: PrivateKeyType, id: &KeyIdentifier) -> Result<()> {
        self.delete_key_with(key_type, id, &CallOptions::default())
    }

    pub fn delete_key_with(
        &self,
        key_type: PrivateKeyType,
        id: &KeyIdentifier,
        options: &CallOptions,
    ) -> Result<()> {
        let backend = self.backend_for(key_type)?;
        backend.delete_key_with(id, options).map_err(|e| e.in_backend(key_type, "delete_key", None))
    }

    /// Whether any protocol of `ca` holds a private key this manager can use.
    pub fn has_usable_active_keys(&self, ca: &dyn CertAuthority) -> bool {
        let state = self.snapshot();
        Protocol::ALL.iter().any(|protocol| {
            ca.active_keys(*protocol)
                .iter()
                .any(|pair| pair.has_private_key() && state.backend(pair.key_type).is_some())
        })
    }

    fn backend_for(&self, key_type: PrivateKeyType) -> Result<Arc<dyn KeyStore>> {
        self.snapshot().backend(key_type).cloned().ok_or_else(|| {
            KeyplaneError::not_found(format!("no {} key store is configured", key_type))
        })
    }
}

fn log_backends(state: &BackendSet, message: &str) {
    let backends: Vec<&str> = state.backends.iter().map(|b| b.key_type().as_str()).collect();
    info!(active = %state.active.key_type(), backends = ?backends, "{}", message);
}

fn backend_compiled_in(key_type: PrivateKeyType) -> bool {
    match key_type {
        PrivateKeyType::Raw => true,
        PrivateKeyType::Pkcs11 => cfg!(feature = "pkcs11"),
        PrivateKeyType::GcpKms => cfg!(feature = "gcp-kms"),
        PrivateKeyType::AwsKms => cfg!(feature = "aws-kms"),
    }
}

/// Presents a [`Signer`] to rcgen so certificates can be signed by any backend.
struct SignerKeyPair {
    signer: Arc<dyn Signer>,
    scheme: SignatureScheme,
    algorithm: &'static SignatureAlgorithm,
}

impl RemoteKeyPair for SignerKeyPair {
    fn public_key(&self) -> &[u8] {
        self.signer.public_key()
    }

    fn sign(&self, msg: &[u8]) -> std::result::Result<Vec<u8>, rcgen::Error> {
        self.signer.sign(self.scheme, msg).map_err(|_| rcgen::Error::RemoteKeyError)
    }

    fn algorithm(&self) -> &'static SignatureAlgorithm {
        self.algorithm
    }
}

fn remote_key_pair(signer: Arc<dyn Signer>) -> Result<rcgen::KeyPair> {
    let (scheme, algorithm) = match signer.algorithm() {
        KeyAlgorithm::Rsa => (SignatureScheme::RsaPkcs1Sha256, &rcgen::PKCS_RSA_SHA256),
        KeyAlgorithm::EcdsaP256 => (SignatureScheme::EcdsaP256Sha256Asn1, &rcgen::PKCS_ECDSA_P256_SHA256),
        KeyAlgorithm::EcdsaP384 => (SignatureScheme::EcdsaP384Sha384Asn1, &rcgen::PKCS_ECDSA_P384_SHA384),
        KeyAlgorithm::Ed25519 => (SignatureScheme::Ed25519, &rcgen::PKCS_ED25519),
    };
    rcgen::KeyPair::from_remote(Box::new(SignerKeyPair { signer, scheme, algorithm }))
        .map_err(|e| KeyplaneError::generation_with_source("failed to load signing key", Box::new(e)))
}
