//! Key pair entries held by a certificate authority.

use crate::secrets::SecretBytes;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Backend that owns a private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateKeyType {
    /// Software key: the PEM-encoded private key is stored in the CA record
    Raw,
    /// Hardware security module reached over PKCS#11
    Pkcs11,
    /// GCP Cloud KMS
    GcpKms,
    /// AWS KMS
    AwsKms,
}

impl PrivateKeyType {
    pub const ALL: [PrivateKeyType; 4] =
        [PrivateKeyType::Raw, PrivateKeyType::Pkcs11, PrivateKeyType::GcpKms, PrivateKeyType::AwsKms];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Pkcs11 => "pkcs11",
            Self::GcpKms => "gcp_kms",
            Self::AwsKms => "aws_kms",
        }
    }

    /// Prefix of identifiers issued by external backends (`<prefix>:<handle>`).
    ///
    /// Raw identifiers are the encoded key itself and carry no prefix.
    pub fn reference_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Raw => None,
            Self::Pkcs11 => Some("pkcs11"),
            Self::GcpKms => Some("gcpkms"),
            Self::AwsKms => Some("awskms"),
        }
    }
}

impl FromStr for PrivateKeyType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(Self::Raw),
            "pkcs11" => Ok(Self::Pkcs11),
            "gcp_kms" => Ok(Self::GcpKms),
            "aws_kms" => Ok(Self::AwsKms),
            _ => Err(format!("Unknown private key type: {}", s)),
        }
    }
}

impl fmt::Display for PrivateKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Backend-defined token that resolves to a signer.
///
/// For the raw backend the identifier *is* the encoded private key, so every
/// identifier is handled as secret material regardless of backend: it is
/// redacted in `Debug` and zeroized on drop. Serialization writes the bytes as
/// standard base64 so a CA record can be stored and read back.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct KeyIdentifier(SecretBytes);

impl KeyIdentifier {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(SecretBytes::new(bytes))
    }

    /// Identifier for a key held by an external backend.
    pub fn from_reference(prefix: &str, handle: &str) -> Self {
        Self::new(format!("{}:{}", prefix, handle).into_bytes())
    }

    /// Splits an external reference into `(prefix, handle)`.
    pub fn reference_parts(&self) -> Option<(&str, &str)> {
        let text = std::str::from_utf8(self.0.expose_secret()).ok()?;
        let (prefix, handle) = text.split_once(':')?;
        if prefix.is_empty() || handle.is_empty() {
            return None;
        }
        Some((prefix, handle))
    }

    /// Exposes the identifier bytes. Never log the result.
    pub fn expose_secret(&self) -> &[u8] {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<SecretBytes> for KeyIdentifier {
    fn from(bytes: SecretBytes) -> Self {
        Self(bytes)
    }
}

impl Serialize for KeyIdentifier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = Zeroizing::new(STANDARD.encode(self.0.expose_secret()));
        serializer.serialize_str(&encoded)
    }
}

impl fmt::Debug for KeyIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyIdentifier([REDACTED])")
    }
}

/// One key of a certificate authority for one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub key_type: PrivateKeyType,

    /// Public certificate or verification material; always present.
    #[serde(with = "base64_bytes")]
    pub cert: Vec<u8>,

    /// Private key identifier. Absent when this process can verify with the
    /// certificate but cannot sign.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<KeyIdentifier>,
}

impl KeyPair {
    pub fn new(key_type: PrivateKeyType, cert: impl Into<Vec<u8>>, key: KeyIdentifier) -> Self {
        Self { key_type, cert: cert.into(), key: Some(key) }
    }

    /// Key pair that carries only verification material.
    pub fn verify_only(key_type: PrivateKeyType, cert: impl Into<Vec<u8>>) -> Self {
        Self { key_type, cert: cert.into(), key: None }
    }

    /// Whether a private key identifier is present.
    pub fn has_private_key(&self) -> bool {
        self.key.as_ref().is_some_and(|key| !key.is_empty())
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
