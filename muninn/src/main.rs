#![forbid(unsafe_code)]

use clap::Parser;
use muninn_lib::{load_from_path, Core};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "muninn passive network intrusion-detection sensor")]
struct Cli {
    /// Path to configuration JSON file
    #[arg(short = 'f', long = "config", value_name = "FILE")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, path = %cli.config.display(), "failed to load configuration");
            std::process::exit(1);
        }
    };
    info!(
        interfaces = cfg.interface_info.len(),
        control = %cfg.control_socket_path,
        "configuration loaded"
    );

    let token = CancellationToken::new();
    let core = match Core::start(cfg, token.clone()).await {
        Ok(core) => core,
        Err(err) => {
            error!(%err, "sensor startup failed");
            std::process::exit(1);
        }
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => error!(%err, "failed to listen for shutdown signal"),
    }

    token.cancel();
    core.shutdown().await;
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}
