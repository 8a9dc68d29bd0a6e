//! Repodex - artifact repository content index
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use repodex::cli::{commands, Cli, Commands};
use repodex::config::ConfigManager;
use repodex::error::RepodexResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> RepodexResult<()> {
    let cli = Cli::parse();

    // Completions need neither logging nor config
    if let Commands::Completions { shell } = cli.command {
        return commands::completions(shell);
    }

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Completions { .. } => unreachable!("Completions handled above"),
        Commands::Get(args) => commands::get(args, &config).await,
        Commands::Put(args) => commands::put(args, &config).await,
        Commands::Delete(args) => commands::delete(args, &config).await,
        Commands::Stores(args) => commands::stores(args, &config).await,
        Commands::Index(args) => commands::index(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
fn init_logging(verbose: u8, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("repodex=warn"),
        1 => EnvFilter::new("repodex=info"),
        _ => EnvFilter::new("repodex=debug"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
