//! # Structured Logging
//!
//! Subscriber installation and span macros for key store operations.

use crate::config::{AppConfig, ObservabilityConfig};
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for a key store operation.
///
/// ```rust,ignore
/// let span = keystore_span!("get_tls_cert_and_signer", "example.com");
/// let span = keystore_span!("generate_rsa", "example.com", key_type = %PrivateKeyType::Raw);
/// ```
#[macro_export]
macro_rules! keystore_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "keystore_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            cluster = tracing::field::Empty
        )
    };
    ($operation:expr, $cluster:expr) => {
        tracing::debug_span!(
            "keystore_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            cluster = %$cluster
        )
    };
    ($operation:expr, $cluster:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "keystore_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            cluster = %$cluster,
            $($field)*
        )
    };
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. A subscriber that
/// is already installed (integration tests, embedding processes) is left in
/// place.
pub fn init_logging(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.json_logging {
        tracing::subscriber::set_global_default(fmt().json().with_env_filter(filter).finish())
    } else {
        tracing::subscriber::set_global_default(fmt().with_env_filter(filter).finish())
    };

    if result.is_err() {
        tracing::debug!("Global subscriber already installed; keeping it");
    }
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    let keystore = &config.keystore;
    tracing::info!(
        active_backend = %keystore.active_backend,
        rsa_key_bits = keystore.raw.rsa_key_bits,
        request_timeout_secs = keystore.request_timeout_secs,
        pkcs11 = keystore.pkcs11.is_some(),
        gcp_kms = keystore.gcp_kms.is_some(),
        aws_kms = keystore.aws_kms.is_some(),
        json_logging = config.observability.json_logging,
        "keyplane configuration"
    );
}
