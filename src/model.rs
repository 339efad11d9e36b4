use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use serde::Serialize;

use crate::dns::absolute_name;

/// A zone to sweep. The root zone is stored as the empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    name: String,
}

impl Target {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.trim().trim_end_matches('.').to_lowercase(),
        }
    }

    pub fn root() -> Self {
        Self {
            name: String::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Relative form without trailing dot (`com`, empty for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute form used on the wire (`com.`, `.`)
    pub fn fqdn(&self) -> String {
        absolute_name(&self.name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Hostname of an authoritative server, kept in absolute form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameserverRecord {
    pub hostname: String,
}

impl NameserverRecord {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: absolute_name(&hostname.to_lowercase()),
        }
    }

    /// Hostname without the trailing dot, as used in file names
    pub fn relative(&self) -> &str {
        self.hostname.trim_end_matches('.')
    }
}

impl fmt::Display for NameserverRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.relative())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl From<&IpAddr> for AddressFamily {
    fn from(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }
}

/// One address of one nameserver, the unit a transfer is attempted against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub nameserver: NameserverRecord,
    pub ip: IpAddr,
    pub family: AddressFamily,
}

impl ResolvedEndpoint {
    pub fn new(nameserver: NameserverRecord, ip: IpAddr) -> Self {
        Self {
            family: AddressFamily::from(&ip),
            nameserver,
            ip,
        }
    }
}

impl fmt::Display for ResolvedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.nameserver, self.ip)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransferResult {
    Success { record_count: usize, path: PathBuf },
    Failure { reason: String },
}

impl TransferResult {
    pub fn failure(reason: impl Into<String>) -> Self {
        TransferResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }

    pub fn record_count(&self) -> usize {
        match self {
            TransferResult::Success { record_count, .. } => *record_count,
            TransferResult::Failure { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_forms() {
        let root = Target::new(".");
        assert!(root.is_root());
        assert_eq!(root.fqdn(), ".");
        assert_eq!(root.to_string(), ".");
        assert_eq!(root, Target::root());

        let tld = Target::new("COM.");
        assert_eq!(tld.name(), "com");
        assert_eq!(tld.fqdn(), "com.");
    }

    #[test]
    fn test_endpoint_family() {
        let ns = NameserverRecord::new("NS1.Example");
        assert_eq!(ns.hostname, "ns1.example.");
        let v6 = ResolvedEndpoint::new(ns.clone(), "2001:db8::1".parse().unwrap());
        assert_eq!(v6.family, AddressFamily::V6);
        let v4 = ResolvedEndpoint::new(ns, "10.0.0.1".parse().unwrap());
        assert_eq!(v4.to_string(), "ns1.example (10.0.0.1)");
    }
}
