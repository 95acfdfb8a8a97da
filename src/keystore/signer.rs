//! Signers: objects that produce signatures without exposing key material.

use crate::errors::{KeyplaneError, Result};
use ring::rand::SystemRandom;
use ring::signature::{
    self, EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair, KeyPair as _, RsaEncoding,
    RsaKeyPair,
};
use rsa::pkcs1;
use rsa::pkcs8::PrivateKeyInfo;
use std::fmt;

/// Algorithm family of a signing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyAlgorithm {
    Rsa,
    EcdsaP256,
    EcdsaP384,
    Ed25519,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::EcdsaP256 => "ecdsa-p256",
            Self::EcdsaP384 => "ecdsa-p384",
            Self::Ed25519 => "ed25519",
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature scheme requested from a [`Signer`].
///
/// ECDSA comes in two encodings: ASN.1 DER (X.509, TLS) and fixed-width
/// `r || s` (JWS, SSH).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureScheme {
    RsaPkcs1Sha256,
    RsaPkcs1Sha384,
    RsaPkcs1Sha512,
    RsaPssSha256,
    EcdsaP256Sha256Asn1,
    EcdsaP256Sha256Fixed,
    EcdsaP384Sha384Asn1,
    EcdsaP384Sha384Fixed,
    Ed25519,
}

impl SignatureScheme {
    /// Key algorithm this scheme requires.
    pub fn key_algorithm(&self) -> KeyAlgorithm {
        match self {
            Self::RsaPkcs1Sha256 | Self::RsaPkcs1Sha384 | Self::RsaPkcs1Sha512 | Self::RsaPssSha256 => {
                KeyAlgorithm::Rsa
            }
            Self::EcdsaP256Sha256Asn1 | Self::EcdsaP256Sha256Fixed => KeyAlgorithm::EcdsaP256,
            Self::EcdsaP384Sha384Asn1 | Self::EcdsaP384Sha384Fixed => KeyAlgorithm::EcdsaP384,
            Self::Ed25519 => KeyAlgorithm::Ed25519,
        }
    }

    fn rsa_encoding(&self) -> Option<&'static dyn RsaEncoding> {
        match self {
            Self::RsaPkcs1Sha256 => Some(&signature::RSA_PKCS1_SHA256),
            Self::RsaPkcs1Sha384 => Some(&signature::RSA_PKCS1_SHA384),
            Self::RsaPkcs1Sha512 => Some(&signature::RSA_PKCS1_SHA512),
            Self::RsaPssSha256 => Some(&signature::RSA_PSS_SHA256),
            _ => None,
        }
    }

    fn is_fixed_ecdsa(&self) -> bool {
        matches!(self, Self::EcdsaP256Sha256Fixed | Self::EcdsaP384Sha384Fixed)
    }
}

/// Anything capable of signing with a private key it does not reveal.
///
/// Local keys sign in-process; hardware and cloud backends hand out signers
/// that forward to their service. Implementations must be safe to share
/// across threads.
pub trait Signer: Send + Sync + fmt::Debug {
    /// Algorithm family of the underlying key.
    fn algorithm(&self) -> KeyAlgorithm;

    /// Public key: PKCS#1 `RSAPublicKey` DER for RSA, the uncompressed point
    /// for ECDSA, the 32 raw bytes for Ed25519.
    fn public_key(&self) -> &[u8];

    /// Sign `message` (not a digest) with `scheme`.
    fn sign(&self, scheme: SignatureScheme, message: &[u8]) -> Result<Vec<u8>>;
}

pub(crate) fn ensure_scheme(algorithm: KeyAlgorithm, scheme: SignatureScheme) -> Result<()> {
    if scheme.key_algorithm() == algorithm {
        Ok(())
    } else {
        Err(KeyplaneError::bad_parameter(format!(
            "signature scheme {:?} cannot be used with a {} key",
            scheme, algorithm
        )))
    }
}

enum LocalKey {
    Rsa(RsaKeyPair),
    Ecdsa { curve: KeyAlgorithm, asn1: EcdsaKeyPair, fixed: EcdsaKeyPair },
    Ed25519(Ed25519KeyPair),
}

/// In-process signer over a parsed private key.
pub struct LocalSigner {
    key: LocalKey,
    public_key: Vec<u8>,
    rng: SystemRandom,
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("algorithm", &self.algorithm())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl LocalSigner {
    /// RSA key from a PKCS#1 `RSAPrivateKey` DER document.
    pub fn from_rsa_pkcs1(der: &[u8]) -> Result<Self> {
        let key = RsaKeyPair::from_der(der).map_err(|e| {
            KeyplaneError::bad_parameter(format!("invalid PKCS#1 RSA private key: {}", e))
        })?;
        Ok(Self::rsa(key))
    }

    /// Any supported key from a PKCS#8 document: RSA, ECDSA P-256/P-384, Ed25519.
    pub fn from_pkcs8(der: &[u8]) -> Result<Self> {
        if is_rsa_pkcs8(der) {
            let key = RsaKeyPair::from_pkcs8(der).map_err(|e| {
                KeyplaneError::bad_parameter(format!("invalid PKCS#8 RSA private key: {}", e))
            })?;
            return Ok(Self::rsa(key));
        }
        for (curve, asn1, fixed) in [
            (
                KeyAlgorithm::EcdsaP256,
                &signature::ECDSA_P256_SHA256_ASN1_SIGNING,
                &signature::ECDSA_P256_SHA256_FIXED_SIGNING,
            ),
            (
                KeyAlgorithm::EcdsaP384,
                &signature::ECDSA_P384_SHA384_ASN1_SIGNING,
                &signature::ECDSA_P384_SHA384_FIXED_SIGNING,
            ),
        ] {
            if let Ok(signer) = Self::ecdsa(curve, asn1, fixed, der) {
                return Ok(signer);
            }
        }
        if let Ok(key) = Ed25519KeyPair::from_pkcs8_maybe_unchecked(der) {
            let public_key = key.public_key().as_ref().to_vec();
            return Ok(Self { key: LocalKey::Ed25519(key), public_key, rng: SystemRandom::new() });
        }
        Err(KeyplaneError::bad_parameter(
            "PKCS#8 private key is not a supported RSA, ECDSA P-256/P-384 or Ed25519 key",
        ))
    }

    fn rsa(key: RsaKeyPair) -> Self {
        let public_key = key.public_key().as_ref().to_vec();
        Self { key: LocalKey::Rsa(key), public_key, rng: SystemRandom::new() }
    }

    fn ecdsa(
        curve: KeyAlgorithm,
        asn1_alg: &'static EcdsaSigningAlgorithm,
        fixed_alg: &'static EcdsaSigningAlgorithm,
        der: &[u8],
    ) -> Result<Self> {
        let rng = SystemRandom::new();
        let reject = |e: ring::error::KeyRejected| {
            KeyplaneError::bad_parameter(format!("invalid {} private key: {}", curve, e))
        };
        let asn1 = EcdsaKeyPair::from_pkcs8(asn1_alg, der, &rng).map_err(reject)?;
        let fixed = EcdsaKeyPair::from_pkcs8(fixed_alg, der, &rng).map_err(reject)?;
        let public_key = asn1.public_key().as_ref().to_vec();
        Ok(Self { key: LocalKey::Ecdsa { curve, asn1, fixed }, public_key, rng })
    }
}

/// Whether a PKCS#8 document's algorithm identifier is `rsaEncryption`.
fn is_rsa_pkcs8(der: &[u8]) -> bool {
    PrivateKeyInfo::try_from(der).is_ok_and(|info| info.algorithm.oid == pkcs1::ALGORITHM_OID)
}

impl Signer for LocalSigner {
    fn algorithm(&self) -> KeyAlgorithm {
        match &self.key {
            LocalKey::Rsa(_) => KeyAlgorithm::Rsa,
            LocalKey::Ecdsa { curve, .. } => *curve,
            LocalKey::Ed25519(_) => KeyAlgorithm::Ed25519,
        }
    }

    fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    fn sign(&self, scheme: SignatureScheme, message: &[u8]) -> Result<Vec<u8>> {
        ensure_scheme(self.algorithm(), scheme)?;
        let failed = |_| KeyplaneError::internal(format!("{:?} signing failed", scheme));

        match &self.key {
            LocalKey::Rsa(key) => {
                let encoding = scheme.rsa_encoding().ok_or_else(|| {
                    KeyplaneError::bad_parameter(format!("{:?} is not an RSA scheme", scheme))
                })?;
                let mut signature = vec![0u8; key.public().modulus_len()];
                key.sign(encoding, &self.rng, message, &mut signature).map_err(failed)?;
                Ok(signature)
            }
            LocalKey::Ecdsa { asn1, fixed, .. } => {
                let key = if scheme.is_fixed_ecdsa() { fixed } else { asn1 };
                let signature = key.sign(&self.rng, message).map_err(failed)?;
                Ok(signature.as_ref().to_vec())
            }
            LocalKey::Ed25519(key) => Ok(key.sign(message).as_ref().to_vec()),
        }
    }
}
