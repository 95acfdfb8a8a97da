//! Signer adapters driven through the public API.

use crate::keystore::support::*;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use keyplane::domain::SshSigningAlgorithm;
use keyplane::keystore::{parse_private_key_pem, JwtSigner, KeyAlgorithm, Signer, SshSigner};
use ring::signature::{
    RsaPublicKeyComponents, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED, ED25519,
    RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA512,
};
use serde::{Deserialize, Serialize};
use ssh_encoding::Decode;
use ssh_key::Mpint;
use ssh_key::{Algorithm as SshAlgorithm, EcdsaCurve, HashAlg, PublicKey, Signature};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Claims {
    sub: String,
    exp: u64,
}

fn claims() -> Claims {
    Claims { sub: "alice".to_string(), exp: 4_102_444_800 }
}

#[test]
fn test_rsa_jwt_verifies_with_public_key() {
    let signer = JwtSigner::new(Arc::new(parse_private_key_pem(RSA_A_PEM).unwrap()));
    let token = signer.sign_claims(&claims(), Some("ca-2024")).unwrap();

    let header = decode_header(&token).unwrap();
    assert_eq!(header.alg, Algorithm::RS256);
    assert_eq!(header.kid.as_deref(), Some("ca-2024"));

    let key = DecodingKey::from_rsa_pem(RSA_A_PUB).unwrap();
    let decoded = decode::<Claims>(&token, &key, &Validation::new(Algorithm::RS256)).unwrap();
    assert_eq!(decoded.claims, claims());

    let other = DecodingKey::from_rsa_pem(RSA_B_PUB).unwrap();
    assert!(decode::<Claims>(&token, &other, &Validation::new(Algorithm::RS256)).is_err());
}

#[test]
fn test_ecdsa_jwt_verifies_with_public_key() {
    let signer = JwtSigner::new(Arc::new(parse_private_key_pem(EC_P256_PEM).unwrap()));
    assert_eq!(signer.algorithm(), "ES256");
    let token = signer.sign_claims(&claims(), None).unwrap();

    let header = decode_header(&token).unwrap();
    assert!(header.kid.is_none());

    let key = DecodingKey::from_ec_pem(EC_P256_PUB).unwrap();
    let decoded = decode::<Claims>(&token, &key, &Validation::new(Algorithm::ES256)).unwrap();
    assert_eq!(decoded.claims.sub, "alice");
}

#[test]
fn test_ssh_rsa_signer_honors_ca_algorithm() {
    let key = Arc::new(parse_private_key_pem(RSA_B_PEM).unwrap());
    let public = key.public_key().to_vec();

    let sha256 = SshSigner::new(key.clone()).with_algorithm(SshSigningAlgorithm::RsaSha256);
    let signature = sha256.sign(b"cert-body").unwrap();
    assert_eq!(signature.format, "rsa-sha2-256");
    UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA256, &public)
        .verify(b"cert-body", &signature.blob)
        .unwrap();

    let default = SshSigner::new(key.clone()).with_algorithm(SshSigningAlgorithm::Unspecified);
    let signature = default.sign(b"cert-body").unwrap();
    assert_eq!(signature.format, "rsa-sha2-512");
    UnparsedPublicKey::new(&RSA_PKCS1_2048_8192_SHA512, &public)
        .verify(b"cert-body", &signature.blob)
        .unwrap();

    let sha1 = SshSigner::new(key).with_algorithm(SshSigningAlgorithm::RsaSha1);
    assert!(sha1.sign(b"cert-body").unwrap_err().is_bad_parameter());
}

#[test]
fn test_ssh_tag_is_ignored_for_non_rsa_keys() {
    let key = Arc::new(parse_private_key_pem(ED25519_PEM).unwrap());
    let signer = SshSigner::new(key).with_algorithm(SshSigningAlgorithm::RsaSha256);
    assert_eq!(signer.signing_algorithm(), None);
    assert_eq!(signer.inner().algorithm(), KeyAlgorithm::Ed25519);

    let signature = signer.sign(b"cert-body").unwrap();
    assert_eq!(signature.format, "ssh-ed25519");
    assert_eq!(signature.blob.len(), 64);
    assert!(signer.authorized_key().unwrap().starts_with("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5"));
}

/// Decode a signature the way an SSH peer would read it off a certificate.
fn decode_wire(signer: &SshSigner, message: &[u8]) -> Signature {
    let wire = signer.sign(message).unwrap().to_wire().unwrap();
    Signature::try_from(wire.as_slice()).unwrap()
}

/// Left-pad an mpint magnitude to a fixed field width.
fn field(n: &Mpint, width: usize) -> Vec<u8> {
    let bytes = n.as_positive_bytes().unwrap();
    let mut out = vec![0u8; width - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

#[test]
fn test_ssh_rsa_output_parses_as_openssh() {
    let signer = SshSigner::new(Arc::new(parse_private_key_pem(RSA_A_PEM).unwrap()))
        .with_algorithm(SshSigningAlgorithm::RsaSha256);

    let key = PublicKey::from_openssh(&signer.authorized_key().unwrap()).unwrap();
    assert_eq!(key.algorithm(), SshAlgorithm::Rsa { hash: None });
    let rsa = key.key_data().rsa().unwrap();

    let signature = decode_wire(&signer, b"cert-body");
    assert_eq!(signature.algorithm(), SshAlgorithm::Rsa { hash: Some(HashAlg::Sha256) });
    let components = RsaPublicKeyComponents {
        n: rsa.n.as_positive_bytes().unwrap(),
        e: rsa.e.as_positive_bytes().unwrap(),
    };
    components.verify(&RSA_PKCS1_2048_8192_SHA256, b"cert-body", signature.as_bytes()).unwrap();
    assert!(components
        .verify(&RSA_PKCS1_2048_8192_SHA256, b"other-body", signature.as_bytes())
        .is_err());
}

#[test]
fn test_ssh_ecdsa_output_parses_as_openssh() {
    let signer = SshSigner::new(Arc::new(parse_private_key_pem(EC_P256_PEM).unwrap()));

    let key = PublicKey::from_openssh(&signer.authorized_key().unwrap()).unwrap();
    let point = key.key_data().ecdsa().unwrap();
    assert_eq!(point.curve(), EcdsaCurve::NistP256);

    let signature = decode_wire(&signer, b"cert-body");
    assert_eq!(signature.algorithm(), SshAlgorithm::Ecdsa { curve: EcdsaCurve::NistP256 });
    let mut reader = signature.as_bytes();
    let r = Mpint::decode(&mut reader).unwrap();
    let s = Mpint::decode(&mut reader).unwrap();
    assert!(reader.is_empty());

    let fixed = [field(&r, 32), field(&s, 32)].concat();
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_FIXED, point.as_sec1_bytes())
        .verify(b"cert-body", &fixed)
        .unwrap();
}

#[test]
fn test_ssh_ed25519_output_parses_as_openssh() {
    let signer = SshSigner::new(Arc::new(parse_private_key_pem(ED25519_PEM).unwrap()));

    let key = PublicKey::from_openssh(&signer.authorized_key().unwrap()).unwrap();
    assert_eq!(key.algorithm(), SshAlgorithm::Ed25519);
    let public = key.key_data().ed25519().unwrap();
    assert_eq!(public.0.as_slice(), signer.inner().public_key());

    let signature = decode_wire(&signer, b"cert-body");
    assert_eq!(signature.algorithm(), SshAlgorithm::Ed25519);
    UnparsedPublicKey::new(&ED25519, public.0)
        .verify(b"cert-body", signature.as_bytes())
        .unwrap();
}

#[test]
fn test_pkcs1_and_pkcs8_encodings_yield_same_key() {
    assert_eq!(public_key_of(RSA_B_PEM), public_key_of(RSA_B_PKCS1_PEM));
    assert_ne!(public_key_of(RSA_A_PEM), public_key_of(RSA_B_PEM));
}
