//! filebeacon node: loads the registry, runs the first reconciliation pass
//! synchronously, then supervises the scan loop and the UDP query server
//! until interrupted.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use dialoguer::{Confirm, Input};
use filebeacon_registry::Registry;
use filebeacon_scanner::{FolderScanner, PublishDecider, PublishDecision, StaticDecider};
use filebeacon_server::{QueryServer, DEFAULT_BIND};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_TTL_SECONDS: u64 = 300;

/// Prompts a human for the publish/TTL decision of each newly discovered
/// file. Blocks the reconciliation pass until answered, which is the
/// intended behavior for interactive onboarding.
struct InteractiveDecider;

impl PublishDecider for InteractiveDecider {
    fn decide(&self, full_name: &str) -> PublishDecision {
        let publish = prompt_publish(full_name);
        let ttl = if publish {
            prompt_ttl()
        } else {
            DEFAULT_TTL_SECONDS
        };
        PublishDecision { publish, ttl }
    }
}

fn prompt_publish(full_name: &str) -> bool {
    match Confirm::new()
        .with_prompt(format!("Publish '{full_name}'?"))
        .interact()
    {
        Ok(answer) => answer,
        Err(err) => {
            warn!(file = %full_name, "prompt unavailable, leaving unpublished: {err}");
            false
        }
    }
}

/// Asks for a TTL in seconds; dialoguer re-prompts on anything that is not
/// a positive integer.
fn prompt_ttl() -> u64 {
    let result = Input::<u64>::new()
        .with_prompt("TTL in seconds")
        .default(DEFAULT_TTL_SECONDS)
        .validate_with(|value: &u64| {
            if *value > 0 {
                Ok(())
            } else {
                Err("TTL must be a positive integer")
            }
        })
        .interact_text();
    match result {
        Ok(ttl) => ttl,
        Err(err) => {
            warn!("prompt unavailable, using default TTL: {err}");
            DEFAULT_TTL_SECONDS
        }
    }
}

/// Resolve the watched folder: CLI argument first, then the folder stored
/// in the registry document, then an interactive prompt repeated until an
/// existing directory is given.
fn resolve_folder(arg: Option<&String>, stored: Option<PathBuf>) -> Result<PathBuf> {
    let mut candidate: Option<PathBuf> = arg.map(PathBuf::from).or(stored);
    loop {
        if let Some(path) = candidate.take() {
            if path.is_dir() {
                return path
                    .canonicalize()
                    .with_context(|| format!("cannot canonicalize {}", path.display()));
            }
            eprintln!("Not an existing directory: {}", path.display());
        }
        let answer: String = Input::new()
            .with_prompt("Absolute path of the folder to watch")
            .interact_text()
            .context("no watched folder given and prompting is unavailable")?;
        candidate = Some(PathBuf::from(answer.trim()));
    }
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("filebeacon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("UDP availability oracle for files in a watched folder")
        .arg(
            Arg::new("folder")
                .long("folder")
                .value_name("DIR")
                .help("Absolute path of the folder to watch"),
        )
        .arg(
            Arg::new("registry")
                .long("registry")
                .value_name("FILE")
                .default_value("registry.json")
                .help("Path of the persisted registry document"),
        )
        .arg(
            Arg::new("scan-interval")
                .long("scan-interval")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .default_value("300")
                .help("Seconds between reconciliation passes (floor 5)"),
        )
        .arg(
            Arg::new("bind")
                .long("bind")
                .value_name("ADDR")
                .default_value(DEFAULT_BIND)
                .help("UDP bind address of the query server"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info")
                .help("Log level (RUST_LOG overrides)"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .default_value("pretty")
                .help("Log output format"),
        )
        .arg(
            Arg::new("yes-all")
                .long("yes-all")
                .action(ArgAction::SetTrue)
                .help("Publish every newly discovered file without prompting"),
        )
        .arg(
            Arg::new("default-ttl")
                .long("default-ttl")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .default_value("300")
                .help("TTL applied to files onboarded with --yes-all"),
        )
        .get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    let format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("pretty");
    init_logging(level, format);

    let registry_path = matches
        .get_one::<String>("registry")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("registry.json"));
    let registry = Arc::new(Registry::new(registry_path));
    registry.load()?;

    let folder = resolve_folder(matches.get_one::<String>("folder"), registry.folder())?;
    registry.set_folder(&folder);

    let decider: Arc<dyn PublishDecider> = if matches.get_flag("yes-all") {
        let ttl = matches
            .get_one::<u64>("default-ttl")
            .copied()
            .unwrap_or(DEFAULT_TTL_SECONDS);
        Arc::new(StaticDecider::new(true, ttl))
    } else {
        Arc::new(InteractiveDecider)
    };

    // first pass runs synchronously so the query server never answers
    // against a never-synced registry
    let scanner = Arc::new(FolderScanner::new(Arc::clone(&registry), decider));
    let outcome = scanner
        .reconcile()
        .context("initial reconciliation failed")?;
    info!(
        added = outcome.added,
        removed = outcome.removed,
        entries = registry.len(),
        "initial reconciliation complete"
    );

    let scan_interval = Duration::from_secs(
        matches
            .get_one::<u64>("scan-interval")
            .copied()
            .unwrap_or(300),
    );
    let scan_handle = tokio::spawn(Arc::clone(&scanner).run(scan_interval));

    let bind: SocketAddr = matches
        .get_one::<String>("bind")
        .map(String::as_str)
        .unwrap_or(DEFAULT_BIND)
        .parse()
        .context("invalid bind address")?;
    let server = Arc::new(QueryServer::new(Arc::clone(&registry), bind));
    let server_handle = tokio::spawn(async move {
        if let Err(err) = server.run().await {
            error!("query server terminated: {err:#}");
        }
    });

    info!(
        addr = %bind,
        folder = %folder.display(),
        "filebeacon started, press ctrl-c to exit"
    );
    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    scan_handle.abort();
    server_handle.abort();
    registry.save()?;
    info!("shutdown complete");
    Ok(())
}
