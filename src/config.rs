use crate::error::ConfigError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const IANA_TLD_LIST_URL: &str = "https://data.iana.org/TLD/tlds-alpha-by-domain.txt";
pub const PUBLIC_SUFFIX_LIST_URL: &str = "https://publicsuffix.org/list/public_suffix_list.dat";

/// How the root zone's nameservers are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootDiscovery {
    /// The thirteen `[a-m].root-servers.net` hosts
    #[default]
    Static,
    /// Ask the upstream resolvers for `. NS`, sorted for a stable order
    Dynamic,
}

impl FromStr for RootDiscovery {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(RootDiscovery::Static),
            "dynamic" => Ok(RootDiscovery::Dynamic),
            other => Err(ConfigError::InvalidRootDiscovery(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Directory receiving transferred zones
    pub output_dir: PathBuf,

    /// Maximum number of zone workflows in flight per phase
    pub concurrency: usize,

    /// Timeout for each resolution exchange and each AXFR read
    pub resolve_timeout: Duration,

    /// Deadline for one complete zone transfer from one endpoint
    pub transfer_timeout: Duration,

    /// Retries per upstream resolver before moving to the next one
    pub max_retries: u8,

    /// Recursive resolvers used for NS/A/AAAA lookups
    pub upstream_servers: Vec<SocketAddr>,

    /// Port zone transfers are requested on
    pub dns_port: u16,

    pub root_discovery: RootDiscovery,

    /// Randomise TLD order so one slow registry does not stall a batch
    pub shuffle_tlds: bool,

    pub tld_list_url: String,
    pub psl_url: String,

    /// Local copies of the lists, used instead of downloading
    pub tld_list_path: Option<PathBuf>,
    pub psl_path: Option<PathBuf>,

    /// Timeout for list downloads
    pub http_timeout: Duration,

    /// Where to write the JSON run report (None = no report)
    pub report_path: Option<PathBuf>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("axfrout"),
            concurrency: 30,
            resolve_timeout: Duration::from_secs(15),
            transfer_timeout: Duration::from_secs(90),
            max_retries: 2,
            upstream_servers: vec![
                "1.1.1.1:53".parse().expect("Cloudflare DNS is valid"),
                "8.8.8.8:53".parse().expect("Google DNS is valid"),
                "9.9.9.9:53".parse().expect("Quad9 DNS is valid"),
            ],
            dns_port: 53,
            root_discovery: RootDiscovery::Static,
            shuffle_tlds: true,
            tld_list_url: IANA_TLD_LIST_URL.to_string(),
            psl_url: PUBLIC_SUFFIX_LIST_URL.to_string(),
            tld_list_path: None,
            psl_path: None,
            http_timeout: Duration::from_secs(300),
            report_path: None,
        }
    }
}

impl SweepConfig {
    /// Create a SweepConfig from environment variables
    /// Returns Err if a variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(output_dir) = std::env::var("ZONESWEEP_OUTPUT_DIR") {
            if !output_dir.is_empty() {
                config.output_dir = PathBuf::from(output_dir);
            }
        }

        if let Ok(concurrency) = std::env::var("ZONESWEEP_CONCURRENCY") {
            config.concurrency = concurrency
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidConcurrency(concurrency.clone()))?;
        }

        if let Ok(timeout_str) = std::env::var("ZONESWEEP_RESOLVE_TIMEOUT") {
            config.resolve_timeout = parse_seconds(&timeout_str)?;
        }

        if let Ok(timeout_str) = std::env::var("ZONESWEEP_TRANSFER_TIMEOUT") {
            config.transfer_timeout = parse_seconds(&timeout_str)?;
        }

        if let Ok(max_retries) = std::env::var("ZONESWEEP_MAX_RETRIES") {
            config.max_retries = max_retries.parse::<u8>().map_err(|_| {
                ConfigError::ParseError(format!("Invalid max retries: {}", max_retries))
            })?;
        }

        if let Ok(upstream_servers) = std::env::var("ZONESWEEP_UPSTREAM_SERVERS") {
            config.upstream_servers = parse_upstream_servers(&upstream_servers)?;
        }

        if let Ok(port) = std::env::var("ZONESWEEP_DNS_PORT") {
            config.dns_port = port
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        if let Ok(discovery) = std::env::var("ZONESWEEP_ROOT_DISCOVERY") {
            config.root_discovery = discovery.parse()?;
        }

        if let Ok(shuffle) = std::env::var("ZONESWEEP_SHUFFLE_TLDS") {
            config.shuffle_tlds = parse_bool(&shuffle, true);
        }

        if let Ok(url) = std::env::var("ZONESWEEP_TLD_LIST_URL") {
            config.tld_list_url = url;
        }

        if let Ok(url) = std::env::var("ZONESWEEP_PSL_URL") {
            config.psl_url = url;
        }

        if let Ok(path) = std::env::var("ZONESWEEP_TLD_LIST_PATH") {
            if !path.is_empty() {
                config.tld_list_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(path) = std::env::var("ZONESWEEP_PSL_PATH") {
            if !path.is_empty() {
                config.psl_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(timeout_str) = std::env::var("ZONESWEEP_HTTP_TIMEOUT") {
            config.http_timeout = parse_seconds(&timeout_str)?;
        }

        if let Ok(path) = std::env::var("ZONESWEEP_REPORT_PATH") {
            if !path.is_empty() {
                config.report_path = Some(PathBuf::from(path));
            }
        }

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "Concurrency must be greater than 0".to_string(),
            ));
        }
        if self.concurrency > 10_000 {
            return Err(ConfigError::InvalidConcurrency(
                "Concurrency too large (max 10000)".to_string(),
            ));
        }

        if self.resolve_timeout.is_zero() || self.transfer_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        // Large zones take far longer than a lookup
        if self.transfer_timeout <= self.resolve_timeout {
            return Err(ConfigError::InvalidTimeout(format!(
                "Transfer timeout ({:?}) must exceed resolve timeout ({:?})",
                self.transfer_timeout, self.resolve_timeout
            )));
        }

        if self.max_retries > 10 {
            return Err(ConfigError::ParseError(
                "Max retries too large (max 10)".to_string(),
            ));
        }

        if self.upstream_servers.is_empty() {
            return Err(ConfigError::InvalidUpstreamServer(
                "No upstream servers configured".to_string(),
            ));
        }

        if self.dns_port == 0 {
            return Err(ConfigError::InvalidPort("0".to_string()));
        }

        Ok(())
    }
}

/// Parse a comma separated resolver list; a bare IP gets port 53
pub fn parse_upstream_servers(list: &str) -> Result<Vec<SocketAddr>, ConfigError> {
    let servers = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_upstream_server)
        .collect::<Result<Vec<_>, _>>()?;

    if servers.is_empty() {
        return Err(ConfigError::InvalidUpstreamServer(
            "No valid upstream servers provided".to_string(),
        ));
    }
    Ok(servers)
}

pub fn parse_upstream_server(s: &str) -> Result<SocketAddr, ConfigError> {
    if let Ok(addr) = s.parse::<SocketAddr>() {
        return Ok(addr);
    }
    s.parse::<std::net::IpAddr>()
        .map(|ip| SocketAddr::new(ip, 53))
        .map_err(|_| ConfigError::InvalidUpstreamServer(s.to_string()))
}

fn parse_seconds(s: &str) -> Result<Duration, ConfigError> {
    let secs = s
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidTimeout(s.to_string()))?;
    Ok(Duration::from_secs(secs))
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SweepConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 30);
        assert!(config.transfer_timeout > config.resolve_timeout);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = SweepConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConcurrency(_))
        ));
    }

    #[test]
    fn test_transfer_timeout_must_exceed_resolve_timeout() {
        let config = SweepConfig {
            resolve_timeout: Duration::from_secs(30),
            transfer_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout(_))));
    }

    #[test]
    fn test_empty_upstreams_rejected() {
        let config = SweepConfig {
            upstream_servers: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_upstream_servers() {
        let servers = parse_upstream_servers("1.1.1.1, 127.0.0.1:5353,,[::1]:53").unwrap();
        assert_eq!(servers.len(), 3);
        assert_eq!(servers[0].port(), 53);
        assert_eq!(servers[1].port(), 5353);
        assert!(servers[2].is_ipv6());

        assert!(parse_upstream_servers(" , ").is_err());
        assert!(parse_upstream_servers("not-an-ip").is_err());
    }

    #[test]
    fn test_root_discovery_from_str() {
        assert_eq!("Dynamic".parse::<RootDiscovery>().unwrap(), RootDiscovery::Dynamic);
        assert_eq!("static".parse::<RootDiscovery>().unwrap(), RootDiscovery::Static);
        assert!("sometimes".parse::<RootDiscovery>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true", false));
        assert!(parse_bool("YES", false));
        assert!(parse_bool("on", false));
        assert!(!parse_bool("0", true));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("invalid", true));
        assert!(!parse_bool("invalid", false));
    }
}
