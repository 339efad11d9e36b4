use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::Serialize;
use tokio::fs;
use tracing::{error, info, warn};

use crate::client::DnsClient;
use crate::config::SweepConfig;
use crate::engine::TransferEngine;
use crate::error::SweepError;
use crate::model::{NameserverRecord, Target, TransferResult};
use crate::output::{write_atomic, zone_file_name};
use crate::resolver::NameserverResolver;
use crate::scheduler::{PhaseSummary, Scheduler};
use crate::sources::{
    ListFetcher, dedupe, find_root_zone_file, normalize_domain, parse_domain_list,
    parse_public_suffix_list, parse_tld_list, tlds_from_root_zone,
};

pub const ROOT_DIR: &str = "root";
pub const PSL_DIR: &str = "psl";

/// What a run sweeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepMode {
    Root,
    Tlds,
    Tld(String),
    Psl,
    Domain(String),
    Input(PathBuf),
    All,
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepMode::Root => write!(f, "root"),
            SweepMode::Tlds => write!(f, "tlds"),
            SweepMode::Tld(tld) => write!(f, "tld {}", tld),
            SweepMode::Psl => write!(f, "psl"),
            SweepMode::Domain(domain) => write!(f, "domain {}", domain),
            SweepMode::Input(path) => write!(f, "input {}", path.display()),
            SweepMode::All => write!(f, "all"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub phases: Vec<PhaseSummary>,
}

impl SweepReport {
    pub fn succeeded(&self) -> usize {
        self.phases.iter().map(|phase| phase.succeeded).sum()
    }
}

pub struct Sweeper {
    config: SweepConfig,
    resolver: Arc<NameserverResolver>,
    engine: Arc<TransferEngine>,
    scheduler: Scheduler,
    fetcher: ListFetcher,
}

impl Sweeper {
    pub fn new(config: SweepConfig, client: Arc<dyn DnsClient>) -> Self {
        let resolver = NameserverResolver::new(client.clone(), config.root_discovery);
        let engine = TransferEngine::new(client, config.transfer_timeout);
        Self {
            scheduler: Scheduler::new(config.concurrency),
            fetcher: ListFetcher::new(config.http_timeout),
            resolver: Arc::new(resolver),
            engine: Arc::new(engine),
            config,
        }
    }

    /// Run every phase of `mode` in order. Only startup problems are
    /// errors; per-zone failures end up in the report.
    pub async fn run(&self, mode: SweepMode) -> Result<SweepReport, SweepError> {
        self.config.validate()?;

        let user_domains = match &mode {
            SweepMode::Domain(domain) | SweepMode::Tld(domain) => Some(vec![
                normalize_domain(domain).ok_or_else(|| SweepError::InvalidDomain(domain.clone()))?,
            ]),
            SweepMode::Input(path) => Some(read_input(path).await?),
            _ => None,
        };
        self.prepare_directories(&mode).await?;

        let started_at = Utc::now();
        info!("Sweeping {} into {}", mode, self.config.output_dir.display());

        let mut phases = Vec::new();
        match &mode {
            SweepMode::Root => phases.push(self.sweep_root().await),
            SweepMode::Tlds => {
                phases.push(self.sweep_root().await);
                phases.extend(self.sweep_tlds().await);
            }
            SweepMode::Tld(_) => {
                let targets = user_domains
                    .unwrap_or_default()
                    .iter()
                    .map(|tld| Target::new(tld))
                    .collect();
                phases.push(self.sweep_zones("tld", targets, &self.config.output_dir).await);
            }
            SweepMode::Psl => phases.extend(self.sweep_psl().await),
            SweepMode::Domain(_) | SweepMode::Input(_) => {
                let targets = dedupe(user_domains.unwrap_or_default())
                    .iter()
                    .map(|domain| Target::new(domain))
                    .collect();
                phases.push(self.sweep_zones("domains", targets, &self.config.output_dir).await);
            }
            SweepMode::All => {
                phases.push(self.sweep_root().await);
                phases.extend(self.sweep_tlds().await);
                phases.extend(self.sweep_psl().await);
            }
        }

        let report = SweepReport {
            mode: mode.to_string(),
            started_at,
            finished_at: Utc::now(),
            phases,
        };
        info!(
            "Sweep finished: {} zones transferred across {} phases",
            report.succeeded(),
            report.phases.len()
        );

        if let Some(path) = &self.config.report_path {
            self.write_report(&report, path).await;
        }
        Ok(report)
    }

    async fn prepare_directories(&self, mode: &SweepMode) -> Result<(), SweepError> {
        let out = &self.config.output_dir;
        let mut dirs = vec![out.clone()];
        match mode {
            SweepMode::Root | SweepMode::Tlds => dirs.push(out.join(ROOT_DIR)),
            SweepMode::Psl => dirs.push(out.join(PSL_DIR)),
            SweepMode::All => {
                dirs.push(out.join(ROOT_DIR));
                dirs.push(out.join(PSL_DIR));
            }
            _ => {}
        }

        for dir in dirs {
            fs::create_dir_all(&dir)
                .await
                .map_err(|source| SweepError::OutputDir { path: dir, source })?;
        }
        Ok(())
    }

    /// One workflow per root server; each writes its own copy of the root zone
    pub async fn sweep_root(&self) -> PhaseSummary {
        let nameservers = self.resolver.root_nameservers().await;
        let root_dir = self.config.output_dir.join(ROOT_DIR);
        let resolver = self.resolver.clone();
        let engine = self.engine.clone();

        self.scheduler
            .run("root", nameservers, move |nameserver: NameserverRecord| {
                let resolver = resolver.clone();
                let engine = engine.clone();
                let destination = root_dir.join(zone_file_name(nameserver.relative()));
                async move {
                    let endpoints = resolver.endpoints_for(&nameserver).await;
                    if endpoints.is_empty() {
                        warn!("Root server {} has no reachable address", nameserver);
                    }
                    engine.attempt(&Target::root(), &endpoints, &destination).await
                }
            })
            .await
    }

    /// TLDs from a previously dumped root zone, else the IANA list
    pub async fn sweep_tlds(&self) -> Option<PhaseSummary> {
        let mut tlds = self.tlds_from_root_dump().await;
        if tlds.is_empty() {
            let text = match self
                .fetcher
                .fetch(&self.config.tld_list_url, self.config.tld_list_path.as_deref())
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    error!("Skipping TLD phase: {}", e);
                    return None;
                }
            };
            tlds = parse_tld_list(&text);
            info!("Loaded {} TLDs from the IANA list", tlds.len());
        }

        let mut tlds = dedupe(tlds);
        if self.config.shuffle_tlds {
            tlds.shuffle(&mut rand::rng());
        }
        let targets = tlds.iter().map(|tld| Target::new(tld)).collect();
        Some(self.sweep_zones("tlds", targets, &self.config.output_dir).await)
    }

    async fn tlds_from_root_dump(&self) -> Vec<String> {
        let root_dir = self.config.output_dir.join(ROOT_DIR);
        let Some(path) = find_root_zone_file(&root_dir).await else {
            return Vec::new();
        };
        match fs::read_to_string(&path).await {
            Ok(text) => {
                let tlds = tlds_from_root_zone(&text);
                info!("Found {} TLDs in {}", tlds.len(), path.display());
                tlds
            }
            Err(e) => {
                warn!("Failed to read root zone dump {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub async fn sweep_psl(&self) -> Option<PhaseSummary> {
        let text = match self
            .fetcher
            .fetch(&self.config.psl_url, self.config.psl_path.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                error!("Skipping PSL phase: {}", e);
                return None;
            }
        };
        let domains = dedupe(parse_public_suffix_list(&text));
        info!("Loaded {} public suffixes", domains.len());

        let targets = domains.iter().map(|domain| Target::new(domain)).collect();
        let psl_dir = self.config.output_dir.join(PSL_DIR);
        Some(self.sweep_zones("psl", targets, &psl_dir).await)
    }

    /// One workflow per zone, written to `<dir>/<zone>.txt`
    pub async fn sweep_zones(&self, phase: &str, targets: Vec<Target>, dir: &Path) -> PhaseSummary {
        let resolver = self.resolver.clone();
        let engine = self.engine.clone();
        let dir = dir.to_path_buf();

        self.scheduler
            .run(phase, targets, move |target: Target| {
                let resolver = resolver.clone();
                let engine = engine.clone();
                let destination = dir.join(zone_file_name(target.name()));
                async move {
                    let endpoints = match resolver.resolve_endpoints(&target).await {
                        Ok(endpoints) => endpoints,
                        Err(e) => {
                            warn!("Failed to resolve nameservers of {}: {}", target, e);
                            return TransferResult::failure(e.to_string());
                        }
                    };
                    engine.attempt(&target, &endpoints, &destination).await
                }
            })
            .await
    }

    async fn write_report(&self, report: &SweepReport, path: &Path) {
        let json = match serde_json::to_vec_pretty(report) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize run report: {}", e);
                return;
            }
        };
        match write_atomic(path, &json).await {
            Ok(()) => info!("Wrote run report to {}", path.display()),
            Err(e) => error!("Failed to write run report {}: {}", path.display(), e),
        }
    }
}

async fn read_input(path: &Path) -> Result<Vec<String>, SweepError> {
    match fs::read_to_string(path).await {
        Ok(text) => Ok(parse_domain_list(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SweepError::InputNotFound(path.to_path_buf()))
        }
        Err(source) => Err(SweepError::InputRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
