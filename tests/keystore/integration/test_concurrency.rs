//! Concurrent resolution and reconfiguration.

use crate::keystore::support::*;
use keyplane::domain::{CertAuthorityRecord, PrivateKeyType, Protocol};
use keyplane::keystore::{ExternalKeyStore, KeyStore, KeyStoreManager, Signer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_parallel_resolution_returns_consistent_signers() {
    let manager = KeyStoreManager::new(Arc::new(fixed_raw_store(RSA_A_PEM)), vec![]).unwrap();
    let ca = CertAuthorityRecord::new("example.com").with_key(Protocol::Jwt, raw_pair(RSA_A_PUB, RSA_A_PEM));
    let expected = public_key_of(RSA_A_PEM);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..10 {
                    let signer = manager.get_jwt_signer(&ca).unwrap();
                    assert_eq!(signer.inner().public_key(), expected.as_slice());
                }
            });
        }
    });
}

#[test]
fn test_parallel_generation_counts_every_call() {
    static KEYS: [&[u8]; 2] = [RSA_A_PEM, RSA_B_PEM];
    let calls = Arc::new(AtomicUsize::new(0));
    let manager =
        KeyStoreManager::new(Arc::new(cycling_raw_store(&KEYS, calls.clone())), vec![]).unwrap();

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..3 {
                    let (key_type, id, _) = manager.generate_rsa().unwrap();
                    assert_eq!(key_type, PrivateKeyType::Raw);
                    assert!(!id.is_empty());
                }
            });
        }
    });
    assert_eq!(calls.load(Ordering::SeqCst), 12);
}

#[test]
fn test_reconfigure_while_resolving() {
    let manager = KeyStoreManager::new(Arc::new(fixed_raw_store(RSA_A_PEM)), vec![]).unwrap();
    let ca = CertAuthorityRecord::new("example.com").with_key(Protocol::Ssh, raw_pair(b"ssh-rsa AAAA", RSA_A_PEM));
    let service = Arc::new(FakeKeyService::default());

    std::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..20 {
                    // Raw stays registered in both backend sets.
                    assert!(manager.get_ssh_signer(&ca).is_ok());
                }
            });
        }
        s.spawn(|| {
            for i in 0..10 {
                let external: Arc<dyn KeyStore> = Arc::new(
                    ExternalKeyStore::new(PrivateKeyType::Pkcs11, service.clone(), Duration::from_secs(1))
                        .unwrap(),
                );
                let raw: Arc<dyn KeyStore> = Arc::new(fixed_raw_store(RSA_A_PEM));
                if i % 2 == 0 {
                    manager.reconfigure(external, vec![raw]).unwrap();
                } else {
                    manager.reconfigure(raw, vec![external]).unwrap();
                }
            }
        });
    });

    assert_eq!(manager.active_key_type(), PrivateKeyType::Raw);
    assert!(manager.has_backend(PrivateKeyType::Pkcs11));
}
