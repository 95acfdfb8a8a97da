//! Compact JWS signing over a CA key.

use super::signer::{KeyAlgorithm, SignatureScheme, Signer};
use crate::errors::{KeyplaneError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct Header<'a> {
    alg: &'static str,
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    kid: Option<&'a str>,
}

/// Signs JSON Web Tokens with a CA key.
#[derive(Debug, Clone)]
pub struct JwtSigner {
    signer: Arc<dyn Signer>,
}

impl JwtSigner {
    pub fn new(signer: Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn inner(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// JWS `alg` header value for the key.
    pub fn algorithm(&self) -> &'static str {
        match self.signer.algorithm() {
            KeyAlgorithm::Rsa => "RS256",
            KeyAlgorithm::EcdsaP256 => "ES256",
            KeyAlgorithm::EcdsaP384 => "ES384",
            KeyAlgorithm::Ed25519 => "EdDSA",
        }
    }

    fn scheme(&self) -> SignatureScheme {
        match self.signer.algorithm() {
            KeyAlgorithm::Rsa => SignatureScheme::RsaPkcs1Sha256,
            KeyAlgorithm::EcdsaP256 => SignatureScheme::EcdsaP256Sha256Fixed,
            KeyAlgorithm::EcdsaP384 => SignatureScheme::EcdsaP384Sha384Fixed,
            KeyAlgorithm::Ed25519 => SignatureScheme::Ed25519,
        }
    }

    /// Serialize `claims` and sign them into a compact token.
    pub fn sign_claims<T: Serialize>(&self, claims: &T, key_id: Option<&str>) -> Result<String> {
        let header = Header { alg: self.algorithm(), typ: "JWT", kid: key_id };
        let header = serde_json::to_vec(&header).map_err(|e| KeyplaneError::Serialization {
            source: e,
            context: "Failed to serialize JWT header".to_string(),
        })?;
        let claims = serde_json::to_vec(claims).map_err(|e| KeyplaneError::Serialization {
            source: e,
            context: "Failed to serialize JWT claims".to_string(),
        })?;

        let mut token = URL_SAFE_NO_PAD.encode(header);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(claims));

        let signature = self.signer.sign(self.scheme(), token.as_bytes())?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));
        Ok(token)
    }
}
