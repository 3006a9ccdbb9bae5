//! Stencil - database template cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use stencil::cli::args::ConfigAction;
use stencil::cli::{Cli, Commands};
use stencil::config::{Config, ConfigManager};
use stencil::error::StencilResult;
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

async fn run() -> StencilResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Writing or locating the config must work even when the file is broken
    let skip_load = matches!(
        cli.command,
        Commands::Config(ref args)
            if matches!(args.action, Some(ConfigAction::Path | ConfigAction::Init { .. }))
    );
    let mut config = if skip_load {
        Config::default()
    } else {
        config_manager.load().await?
    };

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", config_manager.path().display());

    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }

    stencil::ui::init_theme();

    match cli.command {
        Commands::Init(args) => stencil::cli::commands::init(args, &config).await,
        Commands::Trim(args) => stencil::cli::commands::trim(args, &config).await,
        Commands::Purge(args) => stencil::cli::commands::purge(args, &config).await,
        Commands::List(args) => stencil::cli::commands::list(args, &config).await,
        Commands::Digest(args) => stencil::cli::commands::digest(args, &config).await,
        Commands::Config(args) => {
            stencil::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// 0 = warn (spinners only), 1 = info, 2+ = debug
fn init_logging(verbose: u8, log_format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("stencil=warn"),
        1 => EnvFilter::new("stencil=info"),
        _ => EnvFilter::new("stencil=debug"),
    };

    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .init();
    }
}
