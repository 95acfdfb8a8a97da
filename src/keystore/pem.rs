//! PEM private key parsing.

use super::signer::LocalSigner;
use crate::errors::{KeyplaneError, Result};
use rustls_pki_types::{pem::PemObject, PrivateKeyDer};

/// Parse a PEM-encoded private key into an in-process signer.
///
/// Accepts PKCS#1 RSA (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) holding
/// RSA, ECDSA P-256/P-384 or Ed25519 keys. SEC1 (`EC PRIVATE KEY`) documents
/// are rejected; ring only imports EC keys from PKCS#8.
pub fn parse_private_key_pem(pem: &[u8]) -> Result<LocalSigner> {
    let der = PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| KeyplaneError::bad_parameter(format!("failed to decode private key PEM: {:?}", e)))?;

    match der {
        PrivateKeyDer::Pkcs1(key) => LocalSigner::from_rsa_pkcs1(key.secret_pkcs1_der()),
        PrivateKeyDer::Pkcs8(key) => LocalSigner::from_pkcs8(key.secret_pkcs8_der()),
        PrivateKeyDer::Sec1(_) => Err(KeyplaneError::bad_parameter(
            "SEC1 EC private keys are not supported, encode the key as PKCS#8",
        )),
        _ => Err(KeyplaneError::bad_parameter("unsupported private key encoding")),
    }
}
