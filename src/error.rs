use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::dns::enums::ResponseCode;

/// Failures reported by a DNS client adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    #[error("Operation timed out")]
    Timeout,

    #[error("Name does not exist: {0}")]
    NxDomain(String),

    #[error("No nameserver could answer for {0}")]
    NoNameservers(String),

    #[error("Connection refused by {0}")]
    ConnectionRefused(SocketAddr),

    #[error("Server answered {0}")]
    Rcode(ResponseCode),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for DnsError {
    fn from(err: std::io::Error) -> Self {
        DnsError::Io(err.to_string())
    }
}

impl From<crate::dns::ParseError> for DnsError {
    fn from(err: crate::dns::ParseError) -> Self {
        DnsError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DnsError>;

/// Why a single transfer attempt against one endpoint failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error(transparent)]
    Dns(#[from] DnsError),

    #[error("Transfer did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Server returned no records")]
    EmptyTransfer,

    #[error("Output error: {0}")]
    Output(String),
}

impl From<std::io::Error> for TransferError {
    fn from(err: std::io::Error) -> Self {
        TransferError::Output(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),
    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("Invalid upstream server: {0}")]
    InvalidUpstreamServer(String),
    #[error("Invalid port: {0}")]
    InvalidPort(String),
    #[error("Invalid root discovery mode: {0}")]
    InvalidRootDiscovery(String),
    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Errors that abort a run before any transfer starts
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Failed to read input file {}: {source}", .path.display())]
    InputRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create output directory {}: {source}", .path.display())]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A target list that could not be obtained
#[derive(Error, Debug)]
pub enum ListError {
    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
