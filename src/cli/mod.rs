//! # Command Line Interface
//!
//! Inspect how a certificate authority's keys resolve and exercise the
//! address helper.

use crate::config::AppConfig;
use crate::domain::{CertAuthorityRecord, PrivateKeyType, Protocol};
use crate::keystore::{BackendServices, KeyAlgorithm, KeyStoreManager, Signer};
use crate::observability::{init_logging, log_config_info};
use crate::utils::{extract_host, extract_host_port, extract_port};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "keyplane")]
#[command(about = "Certificate authority key store tooling")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the signer a CA record would use for a protocol
    Resolve {
        /// Path to a JSON certificate authority record
        #[arg(long)]
        ca: PathBuf,

        #[arg(long, value_enum, default_value_t = ProtocolArg::Tls)]
        protocol: ProtocolArg,
    },

    /// Extract host and port from an address
    Addr {
        address: String,

        /// Print only the host
        #[arg(long, conflicts_with = "port")]
        host: bool,

        /// Print only the port
        #[arg(long)]
        port: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    Ssh,
    Tls,
    Jwt,
}

impl From<ProtocolArg> for Protocol {
    fn from(arg: ProtocolArg) -> Self {
        match arg {
            ProtocolArg::Ssh => Protocol::Ssh,
            ProtocolArg::Tls => Protocol::Tls,
            ProtocolArg::Jwt => Protocol::Jwt,
        }
    }
}

/// Outcome of resolving a CA's key for one protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub cluster_name: String,
    pub protocol: Protocol,
    pub key_type: PrivateKeyType,
    pub algorithm: Option<KeyAlgorithm>,
    /// SHA-256 of the signer's public key, hex encoded
    pub fingerprint: Option<String>,
    /// SSH signature algorithm or JWS `alg`
    pub signature_algorithm: Option<String>,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "cluster:     {}", self.cluster_name)?;
        writeln!(f, "protocol:    {}", self.protocol)?;
        writeln!(f, "key type:    {}", self.key_type)?;
        match (&self.algorithm, &self.fingerprint) {
            (Some(algorithm), Some(fingerprint)) => {
                writeln!(f, "signer:      {}", algorithm)?;
                writeln!(f, "fingerprint: SHA256:{}", fingerprint)?;
            }
            _ => writeln!(f, "signer:      none (verification only)")?,
        }
        if let Some(signature_algorithm) = &self.signature_algorithm {
            writeln!(f, "signs with:  {}", signature_algorithm)?;
        }
        Ok(())
    }
}

/// Run CLI commands
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env().context("load configuration")?;
    if cli.verbose {
        config.observability.log_level = "debug".to_string();
    }
    init_logging(&config.observability);

    match cli.command {
        Commands::Resolve { ca, protocol } => {
            log_config_info(&config);
            let manager = KeyStoreManager::from_config(&config.keystore, &BackendServices::default())
                .context("build key store manager")?;
            let resolution = resolve(&manager, &ca, protocol.into())?;
            print!("{}", resolution);
        }
        Commands::Addr { address, host, port } => {
            println!("{}", addr(&address, host, port)?);
        }
    }
    Ok(())
}

/// Load a CA record from `path` and resolve its key for `protocol`.
pub fn resolve(manager: &KeyStoreManager, path: &Path, protocol: Protocol) -> anyhow::Result<Resolution> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read CA record {}", path.display()))?;
    let ca: CertAuthorityRecord =
        serde_json::from_str(&json).with_context(|| format!("parse CA record {}", path.display()))?;

    let key_type = ca
        .active_keys
        .get(protocol)
        .iter()
        .map(|pair| pair.key_type)
        .find(|key_type| manager.has_backend(*key_type));

    let (signer, signature_algorithm): (Option<std::sync::Arc<dyn Signer>>, Option<String>) = match protocol {
        Protocol::Tls => (manager.get_tls_cert_and_signer(&ca)?.signer, None),
        Protocol::Ssh => {
            let ssh = manager.get_ssh_signer(&ca)?;
            (Some(ssh.inner().clone()), Some(ssh.algorithm_name().to_string()))
        }
        Protocol::Jwt => {
            let jwt = manager.get_jwt_signer(&ca)?;
            (Some(jwt.inner().clone()), Some(jwt.algorithm().to_string()))
        }
    };

    Ok(Resolution {
        cluster_name: ca.cluster_name.clone(),
        protocol,
        key_type: key_type.context("resolved key has no configured backend")?,
        algorithm: signer.as_ref().map(|s| s.algorithm()),
        fingerprint: signer.as_ref().map(|s| hex::encode(Sha256::digest(s.public_key()))),
        signature_algorithm,
    })
}

fn addr(address: &str, host: bool, port: bool) -> anyhow::Result<String> {
    let result = if host {
        extract_host(address)
    } else if port {
        extract_port(address)
    } else {
        extract_host_port(address)
    };
    Ok(result?)
}
