use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hostpanel::{App, Config};

/// Hostpanel - web control panel for this host
#[derive(Parser)]
#[command(name = "hostpanel", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "HOSTPANEL_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "HOSTPANEL_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref());
    let debug = config.as_ref().is_ok_and(|c| c.debug);

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match (cli.verbose, debug) {
        (0, false) => "info",
        (0 | 1, _) => "info,hostpanel=debug",
        (2, _) => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        plugins = ?config.plugins,
        users = config.users.len(),
        "starting hostpanel"
    );
    tracing::debug!(?config, "loaded configuration");

    if config.users.is_empty() {
        tracing::warn!("no users configured; nobody can log in");
    }

    App::new(config).run().await?;
    Ok(())
}
