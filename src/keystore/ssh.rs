//! SSH public key encoding and algorithm-tagged signing.

use super::signer::{KeyAlgorithm, SignatureScheme, Signer};
use crate::domain::SshSigningAlgorithm;
use crate::errors::{KeyplaneError, Result};
use rsa::pkcs1;
use ssh_encoding::Encode;
use ssh_key::public::{EcdsaPublicKey, Ed25519PublicKey, KeyData, RsaPublicKey};
use ssh_key::{Algorithm, EcdsaCurve, HashAlg, Mpint, PublicKey, Signature};
use std::fmt;
use std::sync::Arc;

/// Signature in SSH wire terms: algorithm name plus raw signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSignature {
    pub format: String,
    pub blob: Vec<u8>,
}

impl SshSignature {
    fn from_ssh_key(signature: &Signature) -> Self {
        Self { format: signature.algorithm().as_str().to_string(), blob: signature.as_bytes().to_vec() }
    }

    /// `string format || string blob`, as embedded in certificates.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let algorithm = Algorithm::new(&self.format).map_err(wire_error)?;
        encode_vec(&Signature::new(algorithm, self.blob.clone()).map_err(wire_error)?)
    }
}

/// SSH signer for a CA key.
///
/// RSA keys carry the CA's configured signing algorithm; ECDSA and Ed25519
/// keys always sign in their native format.
#[derive(Clone)]
pub struct SshSigner {
    signer: Arc<dyn Signer>,
    algorithm: Option<SshSigningAlgorithm>,
}

impl fmt::Debug for SshSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshSigner")
            .field("algorithm", &self.algorithm_name())
            .field("signer", &self.signer)
            .finish()
    }
}

impl SshSigner {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer, algorithm: None }
    }

    /// Tag the signer with a CA signing algorithm. Ignored for non-RSA keys.
    pub fn with_algorithm(mut self, algorithm: SshSigningAlgorithm) -> Self {
        if self.signer.algorithm() == KeyAlgorithm::Rsa {
            self.algorithm = Some(algorithm.resolved());
        }
        self
    }

    /// Configured RSA algorithm, if this is a tagged RSA signer.
    pub fn signing_algorithm(&self) -> Option<SshSigningAlgorithm> {
        self.algorithm
    }

    pub fn inner(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Signature algorithm name used on the wire.
    pub fn algorithm_name(&self) -> &'static str {
        match self.signer.algorithm() {
            KeyAlgorithm::Rsa => self.algorithm.unwrap_or_default().wire_name(),
            KeyAlgorithm::EcdsaP256 => "ecdsa-sha2-nistp256",
            KeyAlgorithm::EcdsaP384 => "ecdsa-sha2-nistp384",
            KeyAlgorithm::Ed25519 => "ssh-ed25519",
        }
    }

    /// Public key in SSH wire format.
    pub fn public_key_blob(&self) -> Result<Vec<u8>> {
        ssh_public_key_blob(self.signer.as_ref())
    }

    /// `authorized_keys` line for the public key, without a comment.
    pub fn authorized_key(&self) -> Result<String> {
        authorized_key(self.signer.as_ref())
    }

    pub fn sign(&self, data: &[u8]) -> Result<SshSignature> {
        let (algorithm, blob) = match self.signer.algorithm() {
            KeyAlgorithm::Rsa => {
                let (hash, scheme) = match self.algorithm.unwrap_or_default().resolved() {
                    SshSigningAlgorithm::RsaSha256 => (HashAlg::Sha256, SignatureScheme::RsaPkcs1Sha256),
                    SshSigningAlgorithm::Unspecified | SshSigningAlgorithm::RsaSha512 => {
                        (HashAlg::Sha512, SignatureScheme::RsaPkcs1Sha512)
                    }
                    SshSigningAlgorithm::RsaSha1 => {
                        return Err(KeyplaneError::bad_parameter(
                            "ssh-rsa (SHA-1) signatures are not supported",
                        ))
                    }
                };
                (Algorithm::Rsa { hash: Some(hash) }, self.signer.sign(scheme, data)?)
            }
            KeyAlgorithm::EcdsaP256 => (
                Algorithm::Ecdsa { curve: EcdsaCurve::NistP256 },
                fixed_to_ssh(&self.signer.sign(SignatureScheme::EcdsaP256Sha256Fixed, data)?)?,
            ),
            KeyAlgorithm::EcdsaP384 => (
                Algorithm::Ecdsa { curve: EcdsaCurve::NistP384 },
                fixed_to_ssh(&self.signer.sign(SignatureScheme::EcdsaP384Sha384Fixed, data)?)?,
            ),
            KeyAlgorithm::Ed25519 => {
                (Algorithm::Ed25519, self.signer.sign(SignatureScheme::Ed25519, data)?)
            }
        };
        let signature = Signature::new(algorithm, blob).map_err(wire_error)?;
        Ok(SshSignature::from_ssh_key(&signature))
    }
}

/// `authorized_keys` line for a signer's public key.
pub fn authorized_key(signer: &dyn Signer) -> Result<String> {
    PublicKey::from(ssh_key_data(signer)?).to_openssh().map_err(wire_error)
}

/// SSH wire encoding of a signer's public key.
pub fn ssh_public_key_blob(signer: &dyn Signer) -> Result<Vec<u8>> {
    encode_vec(&ssh_key_data(signer)?)
}

fn ssh_key_data(signer: &dyn Signer) -> Result<KeyData> {
    let public_key = signer.public_key();
    match signer.algorithm() {
        KeyAlgorithm::Rsa => {
            let key = pkcs1::RsaPublicKey::try_from(public_key)
                .map_err(|e| KeyplaneError::internal(format!("invalid RSA public key: {}", e)))?;
            Ok(KeyData::Rsa(RsaPublicKey {
                e: Mpint::from_positive_bytes(key.public_exponent.as_bytes()).map_err(wire_error)?,
                n: Mpint::from_positive_bytes(key.modulus.as_bytes()).map_err(wire_error)?,
            }))
        }
        KeyAlgorithm::EcdsaP256 | KeyAlgorithm::EcdsaP384 => {
            Ok(KeyData::Ecdsa(EcdsaPublicKey::from_sec1_bytes(public_key).map_err(wire_error)?))
        }
        KeyAlgorithm::Ed25519 => {
            let bytes = <[u8; 32]>::try_from(public_key)
                .map_err(|_| KeyplaneError::internal("Ed25519 public key must be 32 bytes"))?;
            Ok(KeyData::Ed25519(Ed25519PublicKey(bytes)))
        }
    }
}

/// Fixed-width `r || s` to the SSH `mpint r || mpint s` blob.
fn fixed_to_ssh(fixed: &[u8]) -> Result<Vec<u8>> {
    let (r, s) = fixed.split_at(fixed.len() / 2);
    let mut blob = Vec::with_capacity(fixed.len() + 10);
    for half in [r, s] {
        Mpint::from_positive_bytes(half)
            .map_err(wire_error)?
            .encode(&mut blob)
            .map_err(wire_error)?;
    }
    Ok(blob)
}

/// SSH wire encoding of any `Encode` value (ssh-encoding 0.2 has no `encode_vec`).
fn encode_vec(value: &impl Encode) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(value.encoded_len().map_err(wire_error)?);
    value.encode(&mut out).map_err(wire_error)?;
    Ok(out)
}

fn wire_error(err: impl fmt::Display) -> KeyplaneError {
    KeyplaneError::internal(format!("SSH encoding failed: {}", err))
}
