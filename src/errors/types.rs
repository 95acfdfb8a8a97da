//! # Error Types
//!
//! Error taxonomy for the key store using `thiserror`.

use crate::domain::PrivateKeyType;
use std::fmt;

/// Custom result type for keyplane operations
pub type Result<T> = std::result::Result<T, KeyplaneError>;

/// Coarse classification of a [`KeyplaneError`], stable across context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadParameter,
    Generation,
    Config,
    Validation,
    Io,
    Serialization,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::BadParameter => write!(f, "bad_parameter"),
            ErrorKind::Generation => write!(f, "generation"),
            ErrorKind::Config => write!(f, "config"),
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Io => write!(f, "io"),
            ErrorKind::Serialization => write!(f, "serialization"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Main error type for keyplane
#[derive(thiserror::Error, Debug)]
pub enum KeyplaneError {
    /// No key pair of a recognizable type exists for the request
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Malformed input: address strings, unsupported schemes, key encodings
    #[error("Bad parameter: {message}")]
    BadParameter { message: String },

    /// The key source or an external key service failed to produce a key
    #[error("Key generation failed: {message}")]
    Generation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A failure that crossed a backend boundary, with the context of the crossing
    #[error("{key_type} keystore {operation} failed{}: {source}", cluster_suffix(.cluster))]
    Backend {
        key_type: PrivateKeyType,
        operation: &'static str,
        cluster: Option<String>,
        #[source]
        source: Box<KeyplaneError>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn cluster_suffix(cluster: &Option<String>) -> String {
    match cluster {
        Some(name) => format!(" for cluster {:?}", name),
        None => String::new(),
    }
}

impl KeyplaneError {
    /// Create a not found error
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Self::NotFound { message: message.into() }
    }

    /// Create a bad parameter error
    pub fn bad_parameter<S: Into<String>>(message: S) -> Self {
        Self::BadParameter { message: message.into() }
    }

    /// Create a generation error
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation { message: message.into(), source: None }
    }

    /// Create a generation error with source
    pub fn generation_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Generation { message: message.into(), source: Some(source) }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Wrap this error with the backend, operation and cluster it crossed.
    pub fn in_backend(
        self,
        key_type: PrivateKeyType,
        operation: &'static str,
        cluster: Option<&str>,
    ) -> Self {
        Self::Backend {
            key_type,
            operation,
            cluster: cluster.map(str::to_string),
            source: Box::new(self),
        }
    }

    /// Kind of the innermost error, looking through backend context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KeyplaneError::NotFound { .. } => ErrorKind::NotFound,
            KeyplaneError::BadParameter { .. } => ErrorKind::BadParameter,
            KeyplaneError::Generation { .. } => ErrorKind::Generation,
            KeyplaneError::Backend { source, .. } => source.kind(),
            KeyplaneError::Config { .. } => ErrorKind::Config,
            KeyplaneError::Validation { .. } => ErrorKind::Validation,
            KeyplaneError::Io { .. } => ErrorKind::Io,
            KeyplaneError::Serialization { .. } => ErrorKind::Serialization,
            KeyplaneError::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Backend that owned the failing key, if the error crossed a backend boundary.
    pub fn key_type(&self) -> Option<PrivateKeyType> {
        match self {
            KeyplaneError::Backend { key_type, .. } => Some(*key_type),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_bad_parameter(&self) -> bool {
        self.kind() == ErrorKind::BadParameter
    }

    pub fn is_generation(&self) -> bool {
        self.kind() == ErrorKind::Generation
    }
}

impl From<std::io::Error> for KeyplaneError {
    fn from(error: std::io::Error) -> Self {
        Self::Io { source: error, context: "I/O operation failed".to_string() }
    }
}

impl From<serde_json::Error> for KeyplaneError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<validator::ValidationErrors> for KeyplaneError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::validation(format!("Validation failed: {}", message))
    }
}
