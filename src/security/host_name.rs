//! Remote host identity
//!
//! The name a client was resolved to before the request reached the access
//! filter. Resolution itself happens upstream; this type only classifies the
//! result.

use std::fmt;
use std::net::IpAddr;

/// Resolved identity of a remote client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostName {
    /// Literal IP address
    Ip(IpAddr),
    /// DNS hostname, e.g. `build01.example.com`
    Name(String),
    /// Something was resolved, but it is neither an address nor a hostname
    Unresolved(String),
}

impl HostName {
    /// Classify a resolved name
    pub fn new(resolved: impl Into<String>) -> Self {
        let resolved = resolved.into();
        let trimmed = resolved.trim();

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return HostName::Ip(ip);
        }
        if is_hostname(trimmed) {
            return HostName::Name(trimmed.to_string());
        }
        HostName::Unresolved(resolved)
    }

    /// Identity of a peer known only by its socket address
    pub fn from_ip(ip: IpAddr) -> Self {
        HostName::Ip(ip)
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, HostName::Ip(_))
    }

    /// Raw IP text or hostname
    pub fn name(&self) -> String {
        match self {
            HostName::Ip(ip) => ip.to_string(),
            HostName::Name(name) | HostName::Unresolved(name) => name.clone(),
        }
    }

    /// Leading label of the hostname
    ///
    /// `build01.example.com` yields `build01`. IP identities yield their full
    /// address text and unresolved identities yield an empty string.
    pub fn short_name(&self) -> String {
        match self {
            HostName::Ip(ip) => ip.to_string(),
            HostName::Name(name) => name.split('.').next().unwrap_or_default().to_string(),
            HostName::Unresolved(_) => String::new(),
        }
    }
}

impl fmt::Display for HostName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostName::Ip(ip) => write!(f, "{}", ip),
            HostName::Name(name) => f.write_str(name),
            HostName::Unresolved(raw) => write!(f, "unresolved({:?})", raw),
        }
    }
}

/// A top-level label is never all digits, so `10.0.0.256` or `1.2.3` are
/// broken addresses rather than hostnames.
fn is_hostname(candidate: &str) -> bool {
    let leading_label = candidate.split('.').next().unwrap_or_default();
    let top_label = candidate
        .rsplit('.')
        .find(|label| !label.is_empty())
        .unwrap_or_default();
    !leading_label.is_empty()
        && !top_label.chars().all(|c| c.is_ascii_digit())
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
