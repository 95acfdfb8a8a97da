//! Manager behavior across raw and external backends.

use crate::keystore::support::*;
use keyplane::config::{GcpKmsConfig, KeyStoreConfig, Pkcs11Config};
use keyplane::domain::{
    CertAuthorityRecord, KeyPair, PrivateKeyType, Protocol, SshSigningAlgorithm,
};
use keyplane::errors::ErrorKind;
use keyplane::keystore::{
    BackendServices, CallOptions, ExternalKeyStore, KeyService, KeyStore, KeyStoreManager, Signer,
};
use keyplane::secrets::SecretString;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn pkcs11_config() -> Pkcs11Config {
    Pkcs11Config {
        module_path: "/usr/lib/softhsm/libsofthsm2.so".to_string(),
        slot: Some(0),
        token_label: None,
        pin: SecretString::new("1234"),
    }
}

fn migrated_manager(service: Arc<FakeKeyService>) -> KeyStoreManager {
    let config = KeyStoreConfig {
        active_backend: PrivateKeyType::Pkcs11,
        request_timeout_secs: 7,
        pkcs11: Some(pkcs11_config()),
        ..Default::default()
    };
    let services = BackendServices { pkcs11: Some(service), ..Default::default() };
    KeyStoreManager::from_config(&config, &services).unwrap()
}

#[test]
fn test_from_config_registers_raw_alongside_external() {
    let manager = migrated_manager(Arc::new(FakeKeyService::default()));
    assert_eq!(manager.active_key_type(), PrivateKeyType::Pkcs11);
    assert_eq!(manager.registered_backends(), vec![PrivateKeyType::Pkcs11, PrivateKeyType::Raw]);
    assert!(!manager.has_backend(PrivateKeyType::AwsKms));
}

#[test]
fn test_from_config_requires_service_client() {
    let config = KeyStoreConfig {
        active_backend: PrivateKeyType::GcpKms,
        gcp_kms: Some(GcpKmsConfig {
            key_ring: "projects/p/locations/global/keyRings/ca".to_string(),
            protection_level: "hsm".to_string(),
        }),
        ..Default::default()
    };
    let err = KeyStoreManager::from_config(&config, &BackendServices::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let unconfigured = KeyStoreConfig { active_backend: PrivateKeyType::AwsKms, ..Default::default() };
    let err = KeyStoreManager::from_config(&unconfigured, &BackendServices::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_new_keys_land_in_active_backend_with_timeout() {
    let service = Arc::new(FakeKeyService::default());
    let manager = migrated_manager(service.clone());

    let pair = manager.new_ssh_key_pair().unwrap();
    assert_eq!(pair.key_type, PrivateKeyType::Pkcs11);
    let (prefix, handle) = pair.key.as_ref().unwrap().reference_parts().unwrap();
    assert_eq!(prefix, "pkcs11");
    assert!(handle.starts_with("slot-0/keyplane-"));
    assert!(service.contains(handle));
    assert_eq!(*service.last_timeout.lock().unwrap(), Some(Duration::from_secs(7)));

    assert!(pair.cert.starts_with(b"ssh-rsa "));
}

#[test]
fn test_caller_timeout_reaches_key_service() {
    let service = Arc::new(FakeKeyService::default());
    let manager = migrated_manager(service.clone());
    let last_timeout = || *service.last_timeout.lock().unwrap();
    let short = CallOptions::with_timeout(Duration::from_millis(800));

    let pair = manager.new_jwt_key_pair_with(&short).unwrap();
    assert_eq!(last_timeout(), Some(Duration::from_millis(800)));

    let ca = CertAuthorityRecord::new("example.com").with_key(Protocol::Jwt, pair.clone());
    manager.get_jwt_signer_with(&ca, &CallOptions::with_timeout(Duration::from_secs(3))).unwrap();
    assert_eq!(last_timeout(), Some(Duration::from_secs(3)));

    manager.get_jwt_signer(&ca).unwrap();
    assert_eq!(last_timeout(), Some(Duration::from_secs(7)));

    let id = pair.key.unwrap();
    manager.delete_key_with(PrivateKeyType::Pkcs11, &id, &short).unwrap();
    assert_eq!(last_timeout(), Some(Duration::from_millis(800)));

    let requests = service.requests.load(Ordering::SeqCst);
    let err = manager.new_ssh_key_pair_with(&CallOptions::with_timeout(Duration::ZERO)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadParameter);
    assert_eq!(service.requests.load(Ordering::SeqCst), requests);
}

#[test]
fn test_stored_record_resolves_after_reload() {
    let service = Arc::new(FakeKeyService::default());
    let manager = migrated_manager(service);

    let ca = CertAuthorityRecord::new("example.com")
        .with_key(Protocol::Ssh, manager.new_ssh_key_pair().unwrap())
        .with_key(Protocol::Tls, raw_pair(RSA_A_CERT, RSA_A_PEM));
    let stored = serde_json::to_vec(&ca).unwrap();
    let reloaded: CertAuthorityRecord = serde_json::from_slice(&stored).unwrap();
    assert_eq!(reloaded, ca);

    let ssh = manager.get_ssh_signer(&reloaded).unwrap();
    assert_eq!(ssh.inner().public_key(), public_key_of(RSA_B_PEM).as_slice());
    let tls = manager.get_tls_cert_and_signer(&reloaded).unwrap();
    assert_eq!(tls.signer.unwrap().public_key(), public_key_of(RSA_A_PEM).as_slice());
}

#[test]
fn test_migration_keeps_old_raw_keys_resolvable() {
    let service = Arc::new(FakeKeyService::with_keys(&[("slot-0/new", RSA_B_PEM)]));
    let manager = migrated_manager(service.clone());

    let old = CertAuthorityRecord::new("example.com")
        .with_signing_alg(SshSigningAlgorithm::RsaSha256)
        .with_key(Protocol::Ssh, raw_pair(b"ssh-rsa AAAA", RSA_A_PEM));
    let signer = manager.get_ssh_signer(&old).unwrap();
    assert_eq!(signer.inner().public_key(), public_key_of(RSA_A_PEM).as_slice());
    assert_eq!(signer.algorithm_name(), "rsa-sha2-256");
    assert_eq!(service.requests.load(Ordering::SeqCst), 0);

    let rotated = CertAuthorityRecord::new("example.com")
        .with_key(Protocol::Ssh, external_pair(PrivateKeyType::Pkcs11, b"ssh-rsa BBBB", "slot-0/new"))
        .with_key(Protocol::Ssh, raw_pair(b"ssh-rsa AAAA", RSA_A_PEM));
    let signer = manager.get_ssh_signer(&rotated).unwrap();
    assert_eq!(signer.inner().public_key(), public_key_of(RSA_B_PEM).as_slice());
    assert_eq!(service.requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unknown_backend_entries_are_skipped() {
    let manager = migrated_manager(Arc::new(FakeKeyService::default()));
    let ca = CertAuthorityRecord::new("example.com")
        .with_key(Protocol::Jwt, external_pair(PrivateKeyType::AwsKms, RSA_B_PUB, "arn:aws:kms:k"))
        .with_key(Protocol::Jwt, raw_pair(RSA_A_PUB, RSA_A_PEM));

    let signer = manager.get_jwt_signer(&ca).unwrap();
    assert_eq!(signer.algorithm(), "RS256");

    let only_foreign = CertAuthorityRecord::new("example.com")
        .with_key(Protocol::Jwt, external_pair(PrivateKeyType::AwsKms, RSA_B_PUB, "arn:aws:kms:k"));
    let err = manager.get_jwt_signer(&only_foreign).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_external_failure_is_wrapped_with_context() {
    let manager = migrated_manager(Arc::new(FakeKeyService::default()));
    let ca = CertAuthorityRecord::new("prod.example.com")
        .with_key(Protocol::Tls, external_pair(PrivateKeyType::Pkcs11, RSA_B_CERT, "slot-0/gone"));

    let err = manager.get_tls_cert_and_signer(&ca).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.key_type(), Some(PrivateKeyType::Pkcs11));
    assert!(err.to_string().contains("pkcs11 keystore get_tls_cert_and_signer failed"));
    assert!(err.to_string().contains("prod.example.com"));
}

#[test]
fn test_tls_key_pair_is_self_signed_by_external_key() {
    let service = Arc::new(FakeKeyService::default());
    let manager = migrated_manager(service);

    let pair = manager.new_tls_key_pair("example.com").unwrap();
    assert!(pair.cert.starts_with(b"-----BEGIN CERTIFICATE-----"));

    let ca = CertAuthorityRecord::new("example.com").with_key(Protocol::Tls, pair);
    let resolved = manager.get_tls_cert_and_signer(&ca).unwrap();
    assert_eq!(resolved.signer.unwrap().public_key(), public_key_of(RSA_B_PEM).as_slice());
}

#[test]
fn test_delete_routes_by_key_type() {
    let service = Arc::new(FakeKeyService::with_keys(&[("slot-0/old", RSA_B_PEM)]));
    let manager = migrated_manager(service.clone());
    let pair = external_pair(PrivateKeyType::Pkcs11, RSA_B_CERT, "slot-0/old");
    let id = pair.key.clone().unwrap();

    manager.delete_key(PrivateKeyType::Pkcs11, &id).unwrap();
    assert!(!service.contains("slot-0/old"));

    let err = manager.delete_key(PrivateKeyType::GcpKms, &id).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_external_store_rejects_foreign_identifiers() {
    let service: Arc<dyn KeyService> = Arc::new(FakeKeyService::with_keys(&[("k", RSA_A_PEM)]));
    let store = ExternalKeyStore::new(PrivateKeyType::Pkcs11, service, Duration::from_secs(1)).unwrap();
    let gcp = external_pair(PrivateKeyType::GcpKms, b"", "k");
    assert!(store.get_signer(gcp.key.as_ref().unwrap()).unwrap_err().is_bad_parameter());

    let raw: KeyPair = raw_pair(b"", RSA_A_PEM);
    assert!(store.get_signer(raw.key.as_ref().unwrap()).unwrap_err().is_bad_parameter());
}
