//! # Configuration Settings
//!
//! Defines the configuration structure for the keyplane key store.

use crate::domain::PrivateKeyType;
use crate::errors::{KeyplaneError, Result};
use crate::secrets::SecretString;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
pub struct AppConfig {
    /// Key store configuration
    #[validate(nested)]
    pub keystore: KeyStoreConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load the whole configuration from `KEYPLANE_*` environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            keystore: KeyStoreConfig::from_env()?,
            observability: ObservabilityConfig::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(KeyplaneError::from)?;
        self.keystore.validate_custom()?;
        Ok(())
    }
}

/// Key store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct KeyStoreConfig {
    /// Backend new keys are created in
    pub active_backend: PrivateKeyType,

    /// Software backend settings; the software backend is always available
    #[validate(nested)]
    pub raw: RawKeyStoreConfig,

    /// Timeout handed to external key services for every request
    #[validate(range(min = 1, max = 600, message = "Key store timeout must be between 1 and 600 seconds"))]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub pkcs11: Option<Pkcs11Config>,

    #[serde(default)]
    pub gcp_kms: Option<GcpKmsConfig>,

    #[serde(default)]
    pub aws_kms: Option<AwsKmsConfig>,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            active_backend: PrivateKeyType::Raw,
            raw: RawKeyStoreConfig::default(),
            request_timeout_secs: 30,
            pkcs11: None,
            gcp_kms: None,
            aws_kms: None,
        }
    }
}

impl KeyStoreConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let active_backend = match env_var("KEYPLANE_KEYSTORE_BACKEND") {
            Some(value) => value.parse::<PrivateKeyType>().map_err(|e| {
                KeyplaneError::validation_field(e, "KEYPLANE_KEYSTORE_BACKEND")
            })?,
            None => defaults.active_backend,
        };

        Ok(Self {
            active_backend,
            raw: RawKeyStoreConfig::from_env()?,
            request_timeout_secs: parse_env("KEYPLANE_KEYSTORE_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            pkcs11: Pkcs11Config::from_env()?,
            gcp_kms: GcpKmsConfig::from_env(),
            aws_kms: AwsKmsConfig::from_env(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether the settings section for `key_type` is present
    pub fn section_configured(&self, key_type: PrivateKeyType) -> bool {
        match key_type {
            PrivateKeyType::Raw => true,
            PrivateKeyType::Pkcs11 => self.pkcs11.is_some(),
            PrivateKeyType::GcpKms => self.gcp_kms.is_some(),
            PrivateKeyType::AwsKms => self.aws_kms.is_some(),
        }
    }

    fn validate_custom(&self) -> Result<()> {
        if !self.section_configured(self.active_backend) {
            return Err(KeyplaneError::validation_field(
                format!("Active key store backend {} has no configuration section", self.active_backend),
                "active_backend",
            ));
        }

        if let Some(pkcs11) = &self.pkcs11 {
            Validate::validate(pkcs11).map_err(KeyplaneError::from)?;
        }
        if let Some(gcp_kms) = &self.gcp_kms {
            Validate::validate(gcp_kms).map_err(KeyplaneError::from)?;
        }
        if let Some(aws_kms) = &self.aws_kms {
            Validate::validate(aws_kms).map_err(KeyplaneError::from)?;
        }
        Ok(())
    }
}

/// Software key store configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawKeyStoreConfig {
    /// RSA modulus size for generated keys
    #[validate(range(min = 2048, max = 8192, message = "RSA key size must be between 2048 and 8192 bits"))]
    pub rsa_key_bits: usize,
}

impl Default for RawKeyStoreConfig {
    fn default() -> Self {
        Self { rsa_key_bits: 2048 }
    }
}

impl RawKeyStoreConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self { rsa_key_bits: parse_env("KEYPLANE_RSA_KEY_BITS", Self::default().rsa_key_bits)? })
    }
}

/// PKCS#11 hardware security module configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Pkcs11Config {
    /// Path of the PKCS#11 module shared library
    #[validate(length(min = 1, message = "PKCS#11 module path cannot be empty"))]
    pub module_path: String,

    pub slot: Option<u64>,

    pub token_label: Option<String>,

    /// User PIN; redacted when serialized
    pub pin: SecretString,
}

impl Pkcs11Config {
    /// `None` unless `KEYPLANE_PKCS11_MODULE_PATH` is set
    pub fn from_env() -> Result<Option<Self>> {
        let Some(module_path) = env_var("KEYPLANE_PKCS11_MODULE_PATH") else {
            return Ok(None);
        };
        let slot = match env_var("KEYPLANE_PKCS11_SLOT") {
            Some(value) => Some(value.parse::<u64>().map_err(|e| {
                KeyplaneError::validation_field(format!("Invalid PKCS#11 slot: {}", e), "KEYPLANE_PKCS11_SLOT")
            })?),
            None => None,
        };
        Ok(Some(Self {
            module_path,
            slot,
            token_label: env_var("KEYPLANE_PKCS11_TOKEN_LABEL"),
            pin: SecretString::new(std::env::var("KEYPLANE_PKCS11_PIN").unwrap_or_default()),
        }))
    }
}

/// GCP Cloud KMS configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GcpKmsConfig {
    /// Key ring resource name: `projects/<p>/locations/<l>/keyRings/<r>`
    #[validate(length(min = 1, message = "GCP KMS key ring cannot be empty"))]
    pub key_ring: String,

    /// `software` or `hsm`
    #[validate(length(min = 1, message = "GCP KMS protection level cannot be empty"))]
    pub protection_level: String,
}

impl GcpKmsConfig {
    pub fn from_env() -> Option<Self> {
        let key_ring = env_var("KEYPLANE_GCP_KMS_KEY_RING")?;
        Some(Self {
            key_ring,
            protection_level: env_var("KEYPLANE_GCP_KMS_PROTECTION_LEVEL")
                .unwrap_or_else(|| "hsm".to_string()),
        })
    }
}

/// AWS KMS configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AwsKmsConfig {
    #[validate(length(min = 1, message = "AWS account cannot be empty"))]
    pub account: String,

    #[validate(length(min = 1, message = "AWS region cannot be empty"))]
    pub region: String,
}

impl AwsKmsConfig {
    pub fn from_env() -> Option<Self> {
        Some(Self {
            account: env_var("KEYPLANE_AWS_KMS_ACCOUNT")?,
            region: env_var("KEYPLANE_AWS_KMS_REGION")?,
        })
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false }
    }
}

impl ObservabilityConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            log_level: env_var("KEYPLANE_LOG_LEVEL").unwrap_or(defaults.log_level),
            json_logging: parse_env("KEYPLANE_JSON_LOGGING", defaults.json_logging)?,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(name) {
        Some(value) => value
            .parse()
            .map_err(|e| KeyplaneError::validation_field(format!("Invalid {}: {}", name, e), name)),
        None => Ok(default),
    }
}
