//! DNS client capability used by the sweep: recursive lookups through the
//! configured upstreams and streaming AXFR against authoritative servers.

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, trace};

use crate::config::SweepConfig;
use crate::dns::DNSPacket;
use crate::dns::enums::{DNSResourceType, ResponseCode};
use crate::dns::resource::DNSResource;
use crate::error::{DnsError, Result};

/// Response messages of one zone transfer, in arrival order
pub type TransferStream = BoxStream<'static, Result<DNSPacket>>;

#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Recursive lookup; returns the answer records of type `rtype`
    async fn resolve(&self, name: &str, rtype: DNSResourceType) -> Result<Vec<DNSResource>>;

    /// Start an AXFR of `zone` against `server`. Every yielded message has
    /// passed rcode checks; the closing SOA is stripped.
    async fn zone_transfer(&self, server: IpAddr, zone: &str) -> Result<TransferStream>;
}

const UDP_BUFFER_SIZE: usize = 4096;

#[derive(Debug, Clone)]
pub struct NetworkClient {
    upstream_servers: Vec<SocketAddr>,
    resolve_timeout: Duration,
    max_retries: u8,
    dns_port: u16,
}

impl NetworkClient {
    pub fn new(config: &SweepConfig) -> Self {
        Self {
            upstream_servers: config.upstream_servers.clone(),
            resolve_timeout: config.resolve_timeout,
            max_retries: config.max_retries,
            dns_port: config.dns_port,
        }
    }

    /// Query one upstream, retrying transport failures with backoff
    async fn query_upstream(
        &self,
        query_bytes: &[u8],
        id: u16,
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(100)
            .max_delay(Duration::from_secs(2))
            .map(jitter)
            .take(self.max_retries as usize);

        Retry::spawn(strategy, || {
            self.send_query_with_timeout(query_bytes, id, upstream_addr)
        })
        .await
    }

    /// Send query with timeout (try UDP first, fallback to TCP if truncated)
    async fn send_query_with_timeout(
        &self,
        query_bytes: &[u8],
        id: u16,
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        let query_future = async {
            let response = self.send_udp_query(query_bytes, upstream_addr).await?;
            if response.header.tc {
                debug!("UDP response from {} truncated, retrying with TCP", upstream_addr);
                self.send_tcp_query(query_bytes, upstream_addr).await
            } else {
                Ok(response)
            }
        };

        let response = timeout(self.resolve_timeout, query_future)
            .await
            .map_err(|_| DnsError::Timeout)??;
        verify_response(&response, id)?;
        Ok(response)
    }

    async fn send_udp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        let bind_addr = if upstream_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(upstream_addr).await?;
        socket.send(query_bytes).await?;

        let mut response_buf = vec![0u8; UDP_BUFFER_SIZE];
        let response_len = socket.recv(&mut response_buf).await?;
        trace!(
            "Raw UDP response data ({} bytes): {:02x?}",
            response_len,
            &response_buf[..response_len.min(64)]
        );

        DNSPacket::parse(&response_buf[..response_len]).map_err(|e| {
            debug!("Failed to parse UDP response from {}: {}", upstream_addr, e);
            DnsError::from(e)
        })
    }

    async fn send_tcp_query(
        &self,
        query_bytes: &[u8],
        upstream_addr: SocketAddr,
    ) -> Result<DNSPacket> {
        let mut stream = TcpStream::connect(upstream_addr).await?;
        write_framed(&mut stream, query_bytes).await?;

        let response_buf = read_framed(&mut stream)
            .await?
            .ok_or_else(|| DnsError::Protocol("connection closed before response".into()))?;
        trace!("Raw TCP response data ({} bytes)", response_buf.len());

        DNSPacket::parse(&response_buf).map_err(|e| {
            debug!("Failed to parse TCP response from {}: {}", upstream_addr, e);
            DnsError::from(e)
        })
    }

    async fn connect_authoritative(&self, addr: SocketAddr) -> Result<TcpStream> {
        match timeout(self.resolve_timeout, TcpStream::connect(addr)).await {
            Err(_) => Err(DnsError::Timeout),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
                Err(DnsError::ConnectionRefused(addr))
            }
            Ok(Err(e)) => Err(e.into()),
            Ok(Ok(stream)) => Ok(stream),
        }
    }
}

#[async_trait]
impl DnsClient for NetworkClient {
    async fn resolve(&self, name: &str, rtype: DNSResourceType) -> Result<Vec<DNSResource>> {
        let query = DNSPacket::query(rand::random(), name, rtype, true);
        let query_bytes = query.serialize()?;
        let mut last_error = None;

        for upstream in &self.upstream_servers {
            match self.query_upstream(&query_bytes, query.header.id, *upstream).await {
                Ok(response) => match response.response_code() {
                    ResponseCode::NoError => {
                        return Ok(response
                            .answers
                            .into_iter()
                            .filter(|record| record.rtype == rtype)
                            .collect());
                    }
                    ResponseCode::NxDomain => return Err(DnsError::NxDomain(name.to_string())),
                    ResponseCode::ServFail => {
                        debug!("{} answered SERVFAIL for {} {}", upstream, name, rtype);
                        last_error = Some(DnsError::NoNameservers(name.to_string()));
                    }
                    rcode => {
                        debug!("{} answered {} for {} {}", upstream, rcode, name, rtype);
                        last_error = Some(DnsError::Rcode(rcode));
                    }
                },
                Err(e) => {
                    debug!("Upstream {} failed for {} {}: {}", upstream, name, rtype, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| DnsError::NoNameservers(name.to_string())))
    }

    async fn zone_transfer(&self, server: IpAddr, zone: &str) -> Result<TransferStream> {
        let addr = SocketAddr::new(server, self.dns_port);
        let mut connection = self.connect_authoritative(addr).await?;

        let query = DNSPacket::query(rand::random(), zone, DNSResourceType::AXFR, false);
        let query_bytes = query.serialize()?;
        timeout(self.resolve_timeout, write_framed(&mut connection, &query_bytes))
            .await
            .map_err(|_| DnsError::Timeout)??;
        trace!("Sent AXFR for {} to {}", zone, addr);

        let state = AxfrState {
            stream: connection,
            read_timeout: self.resolve_timeout,
            id: query.header.id,
            started: false,
            finished: false,
        };
        Ok(stream::try_unfold(state, AxfrState::next_message).boxed())
    }
}

/// Reader side of one AXFR connection
struct AxfrState {
    stream: TcpStream,
    read_timeout: Duration,
    id: u16,
    started: bool,
    finished: bool,
}

impl AxfrState {
    async fn next_message(mut self) -> Result<Option<(DNSPacket, Self)>> {
        if self.finished {
            return Ok(None);
        }

        let bytes = timeout(self.read_timeout, read_framed(&mut self.stream))
            .await
            .map_err(|_| DnsError::Timeout)??
            .ok_or_else(|| DnsError::Protocol("transfer truncated".into()))?;
        let mut message = DNSPacket::parse(&bytes)?;
        verify_response(&message, self.id)?;

        let rcode = message.response_code();
        if rcode != ResponseCode::NoError {
            return Err(DnsError::Rcode(rcode));
        }

        // The opening SOA is a zone record; the next SOA closes the transfer
        let search_from = if self.started {
            0
        } else {
            match message.answers.first() {
                Some(first) if first.rtype == DNSResourceType::SOA => {}
                Some(first) => {
                    return Err(DnsError::Protocol(format!(
                        "transfer starts with {} instead of SOA",
                        first.rtype
                    )));
                }
                None => return Err(DnsError::Protocol("empty first transfer message".into())),
            }
            self.started = true;
            1
        };

        if let Some(offset) = message.answers[search_from..]
            .iter()
            .position(|record| record.rtype == DNSResourceType::SOA)
        {
            message.answers.truncate(search_from + offset);
            self.finished = true;
        }
        message.header.ancount = message.answers.len() as u16;

        Ok(Some((message, self)))
    }
}

fn verify_response(response: &DNSPacket, id: u16) -> Result<()> {
    if !response.header.qr {
        return Err(DnsError::Protocol("message is not a response".into()));
    }
    if response.header.id != id {
        return Err(DnsError::Protocol(format!(
            "response id {} does not match query id {}",
            response.header.id, id
        )));
    }
    Ok(())
}

async fn write_framed(stream: &mut TcpStream, message: &[u8]) -> Result<()> {
    let length = u16::try_from(message.len())
        .map_err(|_| DnsError::Protocol("message exceeds 65535 octets".into()))?;
    stream.write_all(&length.to_be_bytes()).await?;
    stream.write_all(message).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed message; `None` on a clean EOF between messages
async fn read_framed(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    let mut length_buf = [0u8; 2];
    match stream.read_exact(&mut length_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let mut message = vec![0u8; u16::from_be_bytes(length_buf) as usize];
    stream
        .read_exact(&mut message)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => DnsError::Protocol("transfer truncated".into()),
            _ => DnsError::from(e),
        })?;
    Ok(Some(message))
}
