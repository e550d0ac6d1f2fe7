use std::path::PathBuf;

use clap::Parser;
use log::{error, info};

use udpcapd::capture::supervisor::ListenerSupervisor;
use udpcapd::configuration::config::{Config, DEFAULT_MAX_ROTATE, DEFAULT_MAX_SIZE};

#[derive(Parser)]
#[command(name = "udpcapd")]
#[command(version)]
#[command(about = "Captures incoming UDP datagrams to rotating per-peer pcap files")]
struct Args {
    /// Listen spec, host:port or a bare port; may be given multiple times
    #[arg(short, long)]
    listen: Vec<String>,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    directory: PathBuf,

    /// Max number of rotated files kept per peer
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_ROTATE)]
    max_rotate: u32,

    /// Max size per capture file, in bytes
    #[arg(short = 's', long, default_value_t = DEFAULT_MAX_SIZE)]
    max_size: u64,

    /// Read settings from a TOML file instead of the flags above
    #[arg(short, long)]
    config: Option<PathBuf>,
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                error!("Cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .init();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => Config::from_file(&path),
        None => Config::new(args.listen, args.directory, args.max_rotate, args.max_size),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let listeners = config.resolve_listeners().await;
    if listeners.is_empty() {
        error!("No listen spec could be resolved, exiting");
        std::process::exit(1);
    }

    let mut supervisor = ListenerSupervisor::new(config.policy);
    if supervisor.spawn_listeners(listeners) == 0 {
        error!("No listener could be started, exiting");
        std::process::exit(1);
    }

    shutdown_signal().await;
    info!("Shutdown requested");
    supervisor.shutdown();
    supervisor.wait().await;
    info!("All listeners stopped");
}
