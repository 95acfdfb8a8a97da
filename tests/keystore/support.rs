//! Shared fixtures for key store tests.

use keyplane::domain::{KeyIdentifier, KeyPair, PrivateKeyType};
use keyplane::errors::{KeyplaneError, Result};
use keyplane::keystore::{
    parse_private_key_pem, GeneratedKeyPair, KeyService, RawConfig, RawKeyStore, Signer,
};
use keyplane::secrets::SecretBytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RSA_A_PEM: &[u8] = include_bytes!("../fixtures/rsa_a.pem");
pub const RSA_A_PUB: &[u8] = include_bytes!("../fixtures/rsa_a.pub.pem");
pub const RSA_A_CERT: &[u8] = include_bytes!("../fixtures/rsa_a.crt");
pub const RSA_B_PEM: &[u8] = include_bytes!("../fixtures/rsa_b.pem");
pub const RSA_B_PKCS1_PEM: &[u8] = include_bytes!("../fixtures/rsa_b_pkcs1.pem");
pub const RSA_B_PUB: &[u8] = include_bytes!("../fixtures/rsa_b.pub.pem");
pub const RSA_B_CERT: &[u8] = include_bytes!("../fixtures/rsa_b.crt");
pub const EC_P256_PEM: &[u8] = include_bytes!("../fixtures/ec_p256.pem");
pub const EC_P256_PUB: &[u8] = include_bytes!("../fixtures/ec_p256.pub.pem");
pub const ED25519_PEM: &[u8] = include_bytes!("../fixtures/ed25519.pem");

/// Software key store whose generator always returns `pem`.
pub fn fixed_raw_store(pem: &'static [u8]) -> RawKeyStore {
    RawKeyStore::new(RawConfig::new(Arc::new(move |_: &str| -> Result<GeneratedKeyPair> {
        Ok(GeneratedKeyPair { private_key: SecretBytes::new(pem), public_key: Vec::new() })
    })))
}

/// Software key store with a generator that counts calls and cycles through keys.
pub fn cycling_raw_store(keys: &'static [&'static [u8]], calls: Arc<AtomicUsize>) -> RawKeyStore {
    RawKeyStore::new(RawConfig::new(Arc::new(move |_: &str| -> Result<GeneratedKeyPair> {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedKeyPair { private_key: SecretBytes::new(keys[n % keys.len()]), public_key: Vec::new() })
    })))
}

pub fn raw_pair(cert: &[u8], pem: &[u8]) -> KeyPair {
    KeyPair::new(PrivateKeyType::Raw, cert, KeyIdentifier::new(pem))
}

pub fn external_pair(key_type: PrivateKeyType, cert: &[u8], handle: &str) -> KeyPair {
    let prefix = key_type.reference_prefix().expect("external key type");
    KeyPair::new(key_type, cert, KeyIdentifier::from_reference(prefix, handle))
}

pub fn public_key_of(pem: &[u8]) -> Vec<u8> {
    parse_private_key_pem(pem).unwrap().public_key().to_vec()
}

/// In-memory stand-in for an HSM or cloud KMS client.
#[derive(Debug, Default)]
pub struct FakeKeyService {
    keys: Mutex<HashMap<String, &'static [u8]>>,
    pub requests: AtomicUsize,
    pub last_timeout: Mutex<Option<Duration>>,
}

impl FakeKeyService {
    pub fn with_keys(keys: &[(&str, &'static [u8])]) -> Self {
        let service = Self::default();
        for (handle, pem) in keys {
            service.keys.lock().unwrap().insert(handle.to_string(), *pem);
        }
        service
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.keys.lock().unwrap().contains_key(handle)
    }

    fn record(&self, timeout: Duration) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_timeout.lock().unwrap() = Some(timeout);
    }
}

impl KeyService for FakeKeyService {
    fn create_rsa_key(&self, label: &str, timeout: Duration) -> Result<String> {
        self.record(timeout);
        let handle = format!("slot-0/{}", label);
        self.keys.lock().unwrap().insert(handle.clone(), RSA_B_PEM);
        Ok(handle)
    }

    fn signer(&self, handle: &str, timeout: Duration) -> Result<Arc<dyn Signer>> {
        self.record(timeout);
        let pem = self
            .keys
            .lock()
            .unwrap()
            .get(handle)
            .copied()
            .ok_or_else(|| KeyplaneError::not_found(format!("key {} does not exist", handle)))?;
        Ok(Arc::new(parse_private_key_pem(pem)?))
    }

    fn delete_key(&self, handle: &str, timeout: Duration) -> Result<()> {
        self.record(timeout);
        self.keys.lock().unwrap().remove(handle);
        Ok(())
    }
}
