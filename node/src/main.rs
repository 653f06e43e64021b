use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vnc_crypto::{KeyPair, Signer};

mod config;
mod devnet;
mod version;

use config::NodeConfig;
use devnet::Devnet;
use version::{git_commit_hash, VNC_VERSION};

fn cli() -> Command {
    Command::new("vnc-node")
        .version(VNC_VERSION)
        .about("VNC DPoS-BFT validator node")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (TOML)")
                .global(true),
        )
        .arg(
            Arg::new("validators")
                .short('n')
                .long("validators")
                .value_name("COUNT")
                .value_parser(value_parser!(usize))
                .help("Number of in-process validators")
                .global(true),
        )
        .arg(
            Arg::new("data-dir")
                .short('d')
                .long("data-dir")
                .value_name("DIR")
                .help("Data directory")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .arg(
            Arg::new("ephemeral")
                .long("ephemeral")
                .action(ArgAction::SetTrue)
                .help("Keep chain state in memory only")
                .global(true),
        )
        .arg(
            Arg::new("demo-load")
                .long("demo-load")
                .action(ArgAction::SetTrue)
                .help("Submit faucet transfers every block interval")
                .global(true),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .action(ArgAction::SetTrue)
                .help("Disable the Prometheus metrics endpoint")
                .global(true),
        )
        .subcommand(Command::new("run").about("Run a devnet of validator engines"))
        .subcommand(Command::new("keygen").about("Generate a validator key pair"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    if matches.subcommand_matches("keygen").is_some() {
        return keygen();
    }

    let run_matches = matches.subcommand_matches("run").unwrap_or(&matches);
    run(run_matches).await
}

fn keygen() -> Result<()> {
    let key = KeyPair::generate();
    let output = serde_json::json!({
        "address": key.address().as_str(),
        "public_key": hex::encode(key.public_key()),
        "secret_key": key.secret_hex(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = NodeConfig::load(config_path)?;
    config.apply_overrides(matches);
    config.validate()?;

    init_logging(&config)?;
    init_metrics(&config);

    info!("Starting VNC node {} (commit {})", VNC_VERSION, git_commit_hash());
    info!("Chain ID: {}", config.consensus.chain_id);
    info!(
        "Validators: {} ({:?} proposer, {} ms blocks)",
        config.validators, config.consensus.proposer_policy, config.consensus.block_interval_ms
    );
    if config.ephemeral {
        info!("Storage: in-memory");
    } else {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;
        info!("Storage: {}", config.data_dir.display());
    }

    let devnet = Devnet::spawn(&config)?;
    info!(
        "Devnet running with {} validators; faucet {}",
        devnet.handles().len(),
        devnet.faucet().address()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let engines = devnet.shutdown().await?;
    for engine in &engines {
        let tip = engine.chain_tip();
        info!(
            "{} stopped at height {} ({})",
            engine.address().short(),
            tip.height,
            vnc_types::short_hex(&tip.hash)
        );
    }
    Ok(())
}

fn init_metrics(config: &NodeConfig) {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return;
    }

    let addr: SocketAddr = match config.metrics_addr.parse() {
        Ok(addr) => addr,
        Err(err) => {
            warn!("Invalid metrics address {}: {}", config.metrics_addr, err);
            return;
        }
    };

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            info!("Prometheus metrics exporter listening on {}", addr);
            describe_gauge!("consensus_height", "Latest committed block height");
            describe_gauge!(
                "mempool_size",
                "Current number of transactions pending in the mempool"
            );
            describe_counter!("consensus_rounds_committed", "Rounds that reached quorum");
            describe_counter!("consensus_rounds_aborted", "Rounds aborted at their deadline");
            describe_counter!("consensus_votes_received", "Votes accepted from validators");
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
        }
    }
}

fn init_logging(config: &NodeConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
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

    Ok(())
}
