use crate::client::DnsClient;
use crate::config::RootDiscovery;
use crate::dns::enums::DNSResourceType;
use crate::dns::rdata::RData;
use crate::error::Result;
use crate::model::{NameserverRecord, ResolvedEndpoint, Target};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{trace, warn};

/// The letter-named root servers, in letter order
pub const ROOT_SERVERS: [&str; 13] = [
    "a.root-servers.net.",
    "b.root-servers.net.",
    "c.root-servers.net.",
    "d.root-servers.net.",
    "e.root-servers.net.",
    "f.root-servers.net.",
    "g.root-servers.net.",
    "h.root-servers.net.",
    "i.root-servers.net.",
    "j.root-servers.net.",
    "k.root-servers.net.",
    "l.root-servers.net.",
    "m.root-servers.net.",
];

/// Finds the authoritative servers of a zone and their addresses
pub struct NameserverResolver {
    client: Arc<dyn DnsClient>,
    root_discovery: RootDiscovery,
}

impl NameserverResolver {
    pub fn new(client: Arc<dyn DnsClient>, root_discovery: RootDiscovery) -> Self {
        Self {
            client,
            root_discovery,
        }
    }

    /// NS hostnames of `zone` in answer order, duplicates removed
    pub async fn resolve_authoritative(&self, zone: &Target) -> Result<Vec<NameserverRecord>> {
        let records = self.client.resolve(&zone.fqdn(), DNSResourceType::NS).await?;

        let mut nameservers: Vec<NameserverRecord> = Vec::with_capacity(records.len());
        for record in records {
            if let RData::Name(host) = &record.rdata {
                let nameserver = NameserverRecord::new(host);
                if !nameservers.contains(&nameserver) {
                    nameservers.push(nameserver);
                }
            }
        }
        trace!("{} has {} nameservers", zone, nameservers.len());
        Ok(nameservers)
    }

    /// A then AAAA addresses of a hostname. A failed lookup of one family
    /// is logged and skipped; an empty result means no usable address.
    pub async fn resolve_addresses(&self, nameserver: &NameserverRecord) -> Vec<IpAddr> {
        let mut addresses = Vec::new();

        for rtype in [DNSResourceType::A, DNSResourceType::AAAA] {
            match self.client.resolve(&nameserver.hostname, rtype).await {
                Ok(records) => {
                    for record in records {
                        let ip = match record.rdata {
                            RData::A(v4) => IpAddr::V4(v4),
                            RData::Aaaa(v6) => IpAddr::V6(v6),
                            _ => continue,
                        };
                        if !addresses.contains(&ip) {
                            addresses.push(ip);
                        }
                    }
                }
                Err(e) => warn!("Failed to resolve {} {}: {}", rtype, nameserver, e),
            }
        }
        addresses
    }

    pub async fn endpoints_for(&self, nameserver: &NameserverRecord) -> Vec<ResolvedEndpoint> {
        self.resolve_addresses(nameserver)
            .await
            .into_iter()
            .map(|ip| ResolvedEndpoint::new(nameserver.clone(), ip))
            .collect()
    }

    /// Every endpoint of every nameserver of `zone`, grouped by nameserver
    /// in discovery order. Each hostname is resolved independently.
    pub async fn resolve_endpoints(&self, zone: &Target) -> Result<Vec<ResolvedEndpoint>> {
        let nameservers = self.resolve_authoritative(zone).await?;
        let mut endpoints = Vec::new();

        for nameserver in &nameservers {
            let resolved = self.endpoints_for(nameserver).await;
            if resolved.is_empty() {
                warn!("{} of {} has no reachable address", nameserver, zone);
            }
            endpoints.extend(resolved);
        }
        Ok(endpoints)
    }

    /// Root zone servers. Dynamic discovery is sorted so a run is
    /// deterministic; it falls back to the static set when it yields nothing.
    pub async fn root_nameservers(&self) -> Vec<NameserverRecord> {
        if self.root_discovery == RootDiscovery::Dynamic {
            match self.resolve_authoritative(&Target::root()).await {
                Ok(mut nameservers) if !nameservers.is_empty() => {
                    nameservers.sort();
                    return nameservers;
                }
                Ok(_) => warn!("Root NS query returned no servers, using the static root set"),
                Err(e) => warn!("Root NS query failed ({}), using the static root set", e),
            }
        }
        ROOT_SERVERS.iter().map(|host| NameserverRecord::new(host)).collect()
    }
}
