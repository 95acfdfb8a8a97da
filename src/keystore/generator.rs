//! RSA key pair generation strategies.

use crate::errors::{KeyplaneError, Result};
use crate::secrets::SecretBytes;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// A freshly generated key pair: PKCS#8 PEM private key and SPKI PEM public key.
#[derive(Debug, Clone)]
pub struct GeneratedKeyPair {
    pub private_key: SecretBytes,
    pub public_key: Vec<u8>,
}

/// Strategy that produces RSA key pairs for a label.
///
/// Any `Fn(&str) -> Result<GeneratedKeyPair>` closure is a source, which is
/// how tests inject deterministic keys or failures.
pub trait RsaKeyPairSource: Send + Sync {
    fn generate(&self, label: &str) -> Result<GeneratedKeyPair>;
}

impl<F> RsaKeyPairSource for F
where
    F: Fn(&str) -> Result<GeneratedKeyPair> + Send + Sync,
{
    fn generate(&self, label: &str) -> Result<GeneratedKeyPair> {
        self(label)
    }
}

/// Generate an RSA key pair of `bits` with the operating system RNG.
pub fn generate_rsa_key_pair(bits: usize) -> Result<GeneratedKeyPair> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, bits).map_err(|e| {
        KeyplaneError::generation_with_source(format!("failed to generate {}-bit RSA key", bits), Box::new(e))
    })?;

    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| KeyplaneError::generation(format!("failed to encode RSA private key: {}", e)))?;
    let public_pem = RsaPublicKey::from(&private_key)
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| KeyplaneError::generation(format!("failed to encode RSA public key: {}", e)))?;

    debug!(bits, "Generated RSA key pair");
    Ok(GeneratedKeyPair {
        private_key: SecretBytes::new(private_pem.as_bytes()),
        public_key: public_pem.into_bytes(),
    })
}

/// Production source generating `bits`-sized keys. The label is ignored.
pub fn rsa_key_pair_source(bits: usize) -> Arc<dyn RsaKeyPairSource> {
    Arc::new(move |_label: &str| generate_rsa_key_pair(bits))
}
