//! Target lists: the IANA TLD list, the Public Suffix List, a previously
//! transferred root zone, and user-supplied domains.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tracing::{debug, info};

use crate::error::ListError;

/// TLDs from the IANA list. The first line is a version comment.
pub fn parse_tld_list(text: &str) -> Vec<String> {
    text.lines()
        .skip(1)
        .map(|line| line.trim().to_lowercase())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Plain suffixes from the Public Suffix List. Wildcard and exception
/// rules, single-label suffixes and non-ASCII entries are skipped.
pub fn parse_public_suffix_list(text: &str) -> Vec<String> {
    let mut domains = Vec::new();
    let mut skipped_unicode = 0usize;

    for line in text.lines() {
        // Rules end at the first whitespace
        let Some(rule) = line.split_whitespace().next() else {
            continue;
        };
        if rule.starts_with("//") || rule.contains('*') || rule.contains('!') {
            continue;
        }
        if !rule.contains('.') {
            continue;
        }
        if !rule.is_ascii() {
            skipped_unicode += 1;
            continue;
        }
        domains.push(rule.trim_end_matches('.').to_lowercase());
    }

    if skipped_unicode > 0 {
        debug!("Skipped {} non-ASCII public suffixes", skipped_unicode);
    }
    domains
}

/// Reduce a user-supplied line to a bare domain: scheme, path, port, a
/// leading `www.` and the trailing dot are removed. Blank lines, `#`
/// comments and names that are not plain ASCII hostnames yield `None`.
pub fn normalize_domain(line: &str) -> Option<String> {
    let mut domain = line.trim();
    if domain.is_empty() || domain.starts_with('#') {
        return None;
    }

    for scheme in ["http://", "https://"] {
        if domain.len() >= scheme.len()
            && domain.is_char_boundary(scheme.len())
            && domain[..scheme.len()].eq_ignore_ascii_case(scheme)
        {
            domain = &domain[scheme.len()..];
        }
    }
    if let Some(slash) = domain.find('/') {
        domain = &domain[..slash];
    }
    if let Some((host, port)) = domain.rsplit_once(':') {
        if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) {
            domain = host;
        }
    }

    let mut domain = domain.trim_end_matches('.').to_lowercase();
    if let Some(stripped) = domain.strip_prefix("www.") {
        domain = stripped.to_string();
    }

    if domain.is_empty() {
        return None;
    }
    if !is_hostname(&domain) {
        // Names go on the wire verbatim, there is no IDNA encoding
        debug!("Skipping {:?}: not an ASCII hostname", domain);
        return None;
    }
    Some(domain)
}

/// Letters, digits, `-` and `_` in non-empty labels of at most 63 octets
fn is_hostname(name: &str) -> bool {
    name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

pub fn parse_domain_list(text: &str) -> Vec<String> {
    text.lines().filter_map(normalize_domain).collect()
}

/// TLDs delegated in a dumped root zone: single-label owners whose data is
/// one absolute hostname (the NS lines). Sorted.
pub fn tlds_from_root_zone(text: &str) -> Vec<String> {
    let mut tlds: Vec<String> = text
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let owner = fields.next()?;
            let ttl = fields.next()?;
            let rdata = fields.next()?;
            if fields.next().is_some() || ttl.parse::<u32>().is_err() {
                return None;
            }
            if owner == "." || owner.contains('.') || !rdata.ends_with('.') || rdata == "." {
                return None;
            }
            Some(owner.to_lowercase())
        })
        .collect();
    tlds.sort();
    tlds.dedup();
    tlds
}

/// First (by name) root zone dump under `root_dir`
pub async fn find_root_zone_file(root_dir: &Path) -> Option<PathBuf> {
    let mut entries = fs::read_dir(root_dir).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let is_dump = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(".root-servers.net.txt"));
        if is_dump {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates.into_iter().next()
}

/// Drop repeated names, keeping the first occurrence
pub fn dedupe(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Downloads target lists, or reads them from a configured local copy
pub struct ListFetcher {
    client: reqwest::Client,
}

impl ListFetcher {
    pub fn new(http_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .user_agent(concat!("zonesweep/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub async fn fetch(&self, url: &str, local: Option<&Path>) -> Result<String, ListError> {
        if let Some(path) = local {
            debug!("Reading list from {}", path.display());
            return fs::read_to_string(path)
                .await
                .map_err(|source| ListError::Read {
                    path: path.to_path_buf(),
                    source,
                });
        }

        info!("Downloading {}", url);
        let download_error = |reason: String| ListError::Download {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_error(format!(
                "HTTP error {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response.text().await.map_err(|e| download_error(e.to_string()))
    }
}
