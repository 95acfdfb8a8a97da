//! `host:port` extraction from URI-like address strings.

use crate::errors::{KeyplaneError, Result};
use url::Url;

const DEFAULT_SCHEME: &str = "tcp";
const SUPPORTED_SCHEMES: [&str; 3] = ["tcp", "http", "https"];

/// Reasons a `host:port` string cannot be split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SplitHostPortError {
    #[error("missing port in address")]
    MissingPort,
    #[error("too many colons in address")]
    TooManyColons,
    #[error("missing ']' in address")]
    MissingBracket,
    #[error("unexpected '{0}' in address")]
    UnexpectedBracket(char),
}

impl From<SplitHostPortError> for KeyplaneError {
    fn from(error: SplitHostPortError) -> Self {
        KeyplaneError::bad_parameter(error.to_string())
    }
}

/// Split `host:port`; IPv6 hosts must be bracketed (`[::1]:22`).
pub fn split_host_port(hostport: &str) -> std::result::Result<(&str, &str), SplitHostPortError> {
    let colon = hostport.rfind(':').ok_or(SplitHostPortError::MissingPort)?;

    let (host, host_start, host_end) = if hostport.starts_with('[') {
        let end = hostport.find(']').ok_or(SplitHostPortError::MissingBracket)?;
        if end + 1 == hostport.len() {
            return Err(SplitHostPortError::MissingPort);
        }
        if end + 1 != colon {
            return Err(if hostport.as_bytes()[end + 1] == b':' {
                SplitHostPortError::TooManyColons
            } else {
                SplitHostPortError::MissingPort
            });
        }
        (&hostport[1..end], 1, end + 1)
    } else {
        let host = &hostport[..colon];
        if host.contains(':') {
            return Err(SplitHostPortError::TooManyColons);
        }
        (host, 0, 0)
    };

    if hostport[host_start..].contains('[') {
        return Err(SplitHostPortError::UnexpectedBracket('['));
    }
    if hostport[host_end..].contains(']') {
        return Err(SplitHostPortError::UnexpectedBracket(']'));
    }
    Ok((host, &hostport[colon + 1..]))
}

/// Extract `host:port` from addresses like `tcp://host:port/path`.
///
/// Addresses without a scheme are treated as `tcp`. Only `tcp`, `http` and
/// `https` are accepted. Any user info is dropped.
pub fn extract_host_port(addr: &str) -> Result<String> {
    if addr.is_empty() {
        return Err(KeyplaneError::bad_parameter("missing parameter address"));
    }
    let addr = if addr.contains("://") { addr.to_string() } else { format!("{}://{}", DEFAULT_SCHEME, addr) };

    let url = Url::parse(&addr)
        .map_err(|e| KeyplaneError::bad_parameter(format!("failed to parse {:?}: {}", addr, e)))?;
    if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
        return Err(KeyplaneError::bad_parameter(format!(
            "'{}': unsupported scheme: '{}'",
            addr,
            url.scheme()
        )));
    }
    Ok(authority(&addr).to_string())
}

/// Authority of a `scheme://authority/...` string as written, without user info.
fn authority(addr: &str) -> &str {
    let rest = addr.split_once("://").map_or(addr, |(_, rest)| rest);
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..end];
    authority.rsplit_once('@').map_or(authority, |(_, host)| host)
}

/// Extract the host from addresses like `tcp://host:port/path`.
///
/// An address without a port is returned unchanged.
pub fn extract_host(addr: &str) -> Result<String> {
    let hostport = extract_host_port(addr)?;
    match split_host_port(&hostport) {
        Ok((host, _)) => Ok(host.to_string()),
        Err(SplitHostPortError::MissingPort) => Ok(addr.to_string()),
        Err(e) => Err(e.into()),
    }
}

/// Extract the port from addresses like `tcp://host:port/path`.
pub fn extract_port(addr: &str) -> Result<String> {
    let hostport = extract_host_port(addr)?;
    let (_, port) = split_host_port(&hostport)?;
    Ok(port.to_string())
}
