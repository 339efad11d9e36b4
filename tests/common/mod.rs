//! Common test utilities for zonesweep tests
//!
//! `StubClient` is a scripted `DnsClient`: lookups and transfers are answered
//! from tables, every call is logged, and in-flight calls are counted.

#![allow(dead_code)] // These functions are used by various test files

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zonesweep::{
    DNSPacket,
    client::{DnsClient, TransferStream},
    config::SweepConfig,
    dns::{absolute_name, enums::DNSResourceType, rdata::RData, resource::DNSResource},
    error::{DnsError, Result},
    output::TEMP_SUFFIX,
};

/// How a scripted server answers an AXFR
#[derive(Clone)]
pub enum StubTransfer {
    /// Each inner vector becomes one response message
    Messages(Vec<Vec<DNSResource>>),
    /// `zone_transfer` itself fails
    Refused(DnsError),
    /// Yields these messages, then the stream fails
    BreaksAfter(Vec<Vec<DNSResource>>, DnsError),
    /// Never yields a message
    Hangs,
}

#[derive(Default)]
pub struct StubClient {
    records: HashMap<(String, DNSResourceType), Vec<DNSResource>>,
    failures: HashMap<(String, DNSResourceType), DnsError>,
    transfers: HashMap<IpAddr, StubTransfer>,
    delay: Duration,
    pub transfer_log: Mutex<Vec<IpAddr>>,
    pub resolve_log: Mutex<Vec<(String, DNSResourceType)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ns(mut self, zone: &str, hosts: &[&str]) -> Self {
        let zone = absolute_name(zone);
        let records = hosts
            .iter()
            .map(|host| {
                DNSResource::new(&zone, DNSResourceType::NS, 3600, RData::Name(absolute_name(host)))
            })
            .collect();
        self.records.insert((zone, DNSResourceType::NS), records);
        self
    }

    pub fn with_addresses(mut self, host: &str, ips: &[&str]) -> Self {
        let host = absolute_name(host);
        for ip in ips {
            let (rtype, rdata) = match ip.parse::<IpAddr>().expect("valid test address") {
                IpAddr::V4(v4) => (DNSResourceType::A, RData::A(v4)),
                IpAddr::V6(v6) => (DNSResourceType::AAAA, RData::Aaaa(v6)),
            };
            self.records
                .entry((host.clone(), rtype))
                .or_default()
                .push(DNSResource::new(&host, rtype, 300, rdata));
        }
        self
    }

    pub fn with_resolve_error(mut self, name: &str, rtype: DNSResourceType, error: DnsError) -> Self {
        self.failures.insert((absolute_name(name), rtype), error);
        self
    }

    pub fn with_transfer(mut self, ip: &str, transfer: StubTransfer) -> Self {
        self.transfers
            .insert(ip.parse().expect("valid test address"), transfer);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn transfers_attempted(&self) -> Vec<IpAddr> {
        self.transfer_log.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DnsClient for StubClient {
    async fn resolve(&self, name: &str, rtype: DNSResourceType) -> Result<Vec<DNSResource>> {
        let key = (absolute_name(name), rtype);
        self.resolve_log.lock().unwrap().push(key.clone());

        self.enter().await;
        let result = match self.failures.get(&key) {
            Some(error) => Err(error.clone()),
            None => Ok(self.records.get(&key).cloned().unwrap_or_default()),
        };
        self.leave();
        result
    }

    async fn zone_transfer(&self, server: IpAddr, _zone: &str) -> Result<TransferStream> {
        self.transfer_log.lock().unwrap().push(server);

        self.enter().await;
        let transfer = self
            .transfers
            .get(&server)
            .cloned()
            .unwrap_or(StubTransfer::Refused(DnsError::ConnectionRefused(
                (server, 53).into(),
            )));
        self.leave();

        match transfer {
            StubTransfer::Refused(error) => Err(error),
            StubTransfer::Messages(messages) => {
                let items: Vec<Result<DNSPacket>> = messages.into_iter().map(|m| Ok(message(m))).collect();
                Ok(stream::iter(items).boxed())
            }
            StubTransfer::BreaksAfter(messages, error) => {
                let mut items: Vec<Result<DNSPacket>> =
                    messages.into_iter().map(|m| Ok(message(m))).collect();
                items.push(Err(error));
                Ok(stream::iter(items).boxed())
            }
            StubTransfer::Hangs => Ok(stream::pending().boxed()),
        }
    }
}

pub fn message(answers: Vec<DNSResource>) -> DNSPacket {
    let mut packet = DNSPacket::default();
    packet.header.qr = true;
    packet.header.aa = true;
    packet.header.ancount = answers.len() as u16;
    packet.answers = answers;
    packet
}

pub fn a_record(name: &str, ttl: u32, ip: [u8; 4]) -> DNSResource {
    DNSResource::new(name, DNSResourceType::A, ttl, RData::A(Ipv4Addr::from(ip)))
}

pub fn soa_record(zone: &str) -> DNSResource {
    DNSResource::new(
        zone,
        DNSResourceType::SOA,
        3600,
        RData::Soa {
            mname: absolute_name(&format!("ns1.{}", zone.trim_end_matches('.'))),
            rname: absolute_name(&format!("hostmaster.{}", zone.trim_end_matches('.'))),
            serial: 2024010101,
            refresh: 7200,
            retry: 900,
            expire: 1209600,
            minimum: 300,
        },
    )
}

/// Config pointing at a scratch output directory with short timeouts
pub fn test_config(output_dir: &Path) -> SweepConfig {
    SweepConfig {
        output_dir: output_dir.to_path_buf(),
        concurrency: 4,
        resolve_timeout: Duration::from_millis(200),
        transfer_timeout: Duration::from_millis(500),
        shuffle_tlds: false,
        ..Default::default()
    }
}

pub fn client(stub: StubClient) -> Arc<StubClient> {
    Arc::new(stub)
}

/// Every file under `dir`, recursively, sorted
pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}

pub fn temp_files_under(dir: &Path) -> Vec<PathBuf> {
    files_under(dir)
        .into_iter()
        .filter(|path| path.to_string_lossy().ends_with(TEMP_SUFFIX))
        .collect()
}
