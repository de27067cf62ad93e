use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;

use raven_config::config_file_path;

#[derive(Parser)]
#[command(name = "ravend")]
#[command(about = "Raven: extensible plugin platform daemon")]
#[command(version)]
struct Cli {
    /// Config file (default: $RAVEN_CONFIG or ./config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override `runtime.plugins_dir`
    #[arg(long, global = true)]
    plugins_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the platform and serve until interrupted (default)
    Serve,
    /// Load config and plugins, print what was found, and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = config_file_path(cli.config.as_deref());
    let config = raven_daemon::load_config(&path, cli.plugins_dir).await?;

    logging::init_logger(&config.logging.level, config.logging.dir.as_deref());

    let registry = match raven_daemon::discover(&config) {
        Ok(registry) => registry,
        Err(e) => {
            error!("{:#}", e);
            return Err(e);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            raven_daemon::serve(&config, registry, async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
            })
            .await?;
        }
        Commands::Check => {
            let report = raven_daemon::check_report(&registry);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
