use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command, value_parser};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zonesweep::client::NetworkClient;
use zonesweep::config::{RootDiscovery, SweepConfig, parse_upstream_servers};
use zonesweep::sweep::{SweepMode, Sweeper};

fn cli() -> Command {
    Command::new("zonesweep")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Attempt AXFR zone transfers against the root, TLDs, public suffixes or chosen domains")
        .arg(
            Arg::new("root")
                .long("root")
                .help("Transfer the root zone from every root server")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tlds")
                .long("tlds")
                .help("Transfer the root zone, then every TLD")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tld")
                .long("tld")
                .value_name("TLD")
                .help("Transfer a single TLD"),
        )
        .arg(
            Arg::new("psl")
                .long("psl")
                .help("Transfer every domain on the Public Suffix List")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("domain")
                .short('d')
                .long("domain")
                .value_name("DOMAIN")
                .help("Transfer a single domain"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("Transfer every domain listed in FILE, one per line")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("all")
                .long("all")
                .help("Root, TLD and PSL phases in sequence")
                .action(ArgAction::SetTrue),
        )
        .group(
            ArgGroup::new("mode")
                .args(["root", "tlds", "tld", "psl", "domain", "input", "all"])
                .required(true),
        )
        .arg(
            Arg::new("concurrency")
                .short('c')
                .long("concurrency")
                .value_name("NUMBER")
                .help("Zones processed in parallel [default: 30]")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Timeout for each lookup and AXFR read [default: 15]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("transfer-timeout")
                .long("transfer-timeout")
                .value_name("SECONDS")
                .help("Deadline for one complete transfer [default: 90]")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory [default: axfrout]")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("resolver")
                .long("resolver")
                .value_name("ADDRESSES")
                .help("Comma-separated upstream resolvers, e.g. 1.1.1.1,9.9.9.9:53"),
        )
        .arg(
            Arg::new("dynamic-root")
                .long("dynamic-root")
                .help("Discover root servers with an NS query instead of the built-in list")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-shuffle")
                .long("no-shuffle")
                .help("Keep TLDs in list order")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("report")
                .long("report")
                .value_name("FILE")
                .help("Write a JSON run report to FILE")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count),
        )
}

fn mode_from(matches: &ArgMatches) -> SweepMode {
    if let Some(tld) = matches.get_one::<String>("tld") {
        SweepMode::Tld(tld.clone())
    } else if let Some(domain) = matches.get_one::<String>("domain") {
        SweepMode::Domain(domain.clone())
    } else if let Some(path) = matches.get_one::<PathBuf>("input") {
        SweepMode::Input(path.clone())
    } else if matches.get_flag("all") {
        SweepMode::All
    } else if matches.get_flag("tlds") {
        SweepMode::Tlds
    } else if matches.get_flag("psl") {
        SweepMode::Psl
    } else {
        SweepMode::Root
    }
}

/// Environment first, command line flags on top
fn config_from(matches: &ArgMatches) -> Result<SweepConfig, Box<dyn std::error::Error>> {
    let mut config = SweepConfig::from_env()?;

    if let Some(concurrency) = matches.get_one::<usize>("concurrency") {
        config.concurrency = *concurrency;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.resolve_timeout = Duration::from_secs(*secs);
    }
    if let Some(secs) = matches.get_one::<u64>("transfer-timeout") {
        config.transfer_timeout = Duration::from_secs(*secs);
    }
    if let Some(output) = matches.get_one::<PathBuf>("output") {
        config.output_dir = output.clone();
    }
    if let Some(resolvers) = matches.get_one::<String>("resolver") {
        config.upstream_servers = parse_upstream_servers(resolvers)?;
    }
    if matches.get_flag("dynamic-root") {
        config.root_discovery = RootDiscovery::Dynamic;
    }
    if matches.get_flag("no-shuffle") {
        config.shuffle_tlds = false;
    }
    if let Some(report) = matches.get_one::<PathBuf>("report") {
        config.report_path = Some(report.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = cli().get_matches();

    let default_level = match matches.get_count("verbose") {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config_from(&matches)?;
    let mode = mode_from(&matches);
    info!(
        "Using {} upstream resolvers, concurrency {}",
        config.upstream_servers.len(),
        config.concurrency
    );

    let client = Arc::new(NetworkClient::new(&config));
    let sweeper = Sweeper::new(config, client);
    sweeper.run(mode).await?;

    Ok(())
}
