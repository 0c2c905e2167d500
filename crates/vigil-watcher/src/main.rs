mod config;

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use tracing::{info, warn};
use vigil_failover::{
    ControllerState, FailoverController, LogAlerter, NodeConnection, Reactor, RespTopologyStore,
    TokioReactor,
};

use crate::config::WatcherConfig;

#[derive(Parser)]
#[command(name = "vigil", about = "primary/replica failover watcher")]
struct Args {
    /// path to TOML configuration file
    #[arg(short = 'c', long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// print default configuration as TOML and exit
    #[arg(long)]
    config_template: bool,

    /// nodes to watch, comma separated host:port
    #[arg(long, env = "VIGIL_HOSTS", value_delimiter = ',')]
    hosts: Vec<String>,

    /// milliseconds between health checks
    #[arg(long, env = "VIGIL_CHECK_INTERVAL_MS")]
    check_interval_ms: Option<u64>,

    #[arg(long, env = "VIGIL_CONNECT_TIMEOUT_MS")]
    connect_timeout_ms: Option<u64>,

    #[arg(long, env = "VIGIL_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// shared secret for the watched nodes
    #[arg(long, env = "VIGIL_PASSWORD")]
    password: Option<String>,

    /// database index selected on every watched node
    #[arg(long, env = "VIGIL_DB")]
    db: Option<u32>,

    /// reply text handling: utf-8 or raw
    #[arg(long, env = "VIGIL_ENCODING")]
    encoding: Option<String>,

    /// channel operational events are published to
    #[arg(long, env = "VIGIL_LOG_CHANNEL")]
    log_channel: Option<String>,

    /// wipe the stored topology and start from --hosts
    #[arg(long, env = "VIGIL_FRESH_START")]
    fresh_start: bool,

    /// topology store host
    #[arg(long, env = "VIGIL_STORE_HOST")]
    store_host: Option<String>,

    /// topology store port
    #[arg(long, env = "VIGIL_STORE_PORT")]
    store_port: Option<u16>,

    #[arg(long, env = "VIGIL_STORE_DB")]
    store_db: Option<u32>,

    #[arg(long, env = "VIGIL_STORE_PASSWORD")]
    store_password: Option<String>,
}

fn apply_args(cfg: &mut WatcherConfig, args: &Args) {
    if !args.hosts.is_empty() {
        cfg.hosts = args.hosts.clone();
    }
    if let Some(v) = args.check_interval_ms {
        cfg.check_interval_ms = v;
    }
    if let Some(v) = args.connect_timeout_ms {
        cfg.connect_timeout_ms = v;
    }
    if let Some(v) = args.read_timeout_ms {
        cfg.read_timeout_ms = v;
    }
    if let Some(ref v) = args.password {
        cfg.password = v.clone();
    }
    if let Some(v) = args.db {
        cfg.db = v;
    }
    if let Some(ref v) = args.encoding {
        cfg.encoding = v.clone();
    }
    if let Some(ref v) = args.log_channel {
        cfg.log_channel = v.clone();
    }
    if args.fresh_start {
        cfg.fresh_start = true;
    }
    if let Some(ref v) = args.store_host {
        cfg.store.host = v.clone();
    }
    if let Some(v) = args.store_port {
        cfg.store.port = v;
    }
    if let Some(v) = args.store_db {
        cfg.store.db = v;
    }
    if let Some(ref v) = args.store_password {
        cfg.store.password = v.clone();
    }
}

/// Prints an error message and exits with status 1.
fn exit_err(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info".into()),
        )
        .init();

    let args = Args::parse();

    if args.config_template {
        match WatcherConfig::default().to_toml() {
            Ok(toml) => {
                println!("{toml}");
                std::process::exit(0);
            }
            Err(e) => exit_err(format!("failed to generate config template: {e}")),
        }
    }

    // defaults → TOML file → CLI/env overrides
    let mut cfg = match &args.config {
        Some(path) => WatcherConfig::from_file(path).unwrap_or_else(|e| exit_err(e)),
        None => WatcherConfig::default(),
    };
    apply_args(&mut cfg, &args);
    let resolved = cfg.resolve().unwrap_or_else(|e| exit_err(format!("error: {e}")));

    let reactor = match TokioReactor::new() {
        Ok(r) => Rc::new(r),
        Err(e) => exit_err(format!("failed to start event loop: {e}")),
    };

    let store_addr = resolved.store_addr.clone();
    let mut store = RespTopologyStore::new(NodeConnection::new(
        store_addr.clone(),
        resolved.store_connection.clone(),
    ));
    if let Err(e) = store.connect() {
        exit_err(format!("topology store {store_addr} is unreachable: {e}"));
    }

    info!(
        store = %store_addr,
        seeds = resolved.controller.seeds.len(),
        interval_ms = resolved.controller.check_interval.as_millis() as u64,
        "vigil starting..."
    );

    let controller = FailoverController::new(
        resolved.controller,
        reactor.clone(),
        Box::new(store),
        Box::new(LogAlerter),
    );

    match controller.start(resolved.fresh_start) {
        Ok(topology) if topology.is_empty() => {
            warn!("no reachable primary or replica found, nothing to watch yet")
        }
        Ok(topology) => info!(%topology, "watching"),
        Err(e) => exit_err(format!("failed to start: {e}")),
    }

    reactor.run();

    if controller.state() != ControllerState::Shutdown {
        controller.shutdown();
    }
}
