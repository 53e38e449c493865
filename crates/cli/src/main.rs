//! `lens`: demangle foreign runtime symbols from the command line

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use commands::DemangleOptions;
use lens_core::{InspectorCache, InspectorConfig};
use lens_demangle::Demangler;
use std::io;

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lens=info")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => InspectorConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => InspectorConfig::default(),
    };

    match cli.command {
        Commands::Demangle {
            symbols,
            json,
            no_fallback,
            swiftui,
            stats,
        } => {
            let config = InspectorConfig {
                fallback_demangling: config.fallback_demangling && !no_fallback,
                ..config
            };
            let demangler = Demangler::new(InspectorCache::global(), config);
            let options = DemangleOptions { json, swiftui, stats };
            commands::demangle(&demangler, &symbols, io::stdin().lock(), io::stdout().lock(), &options)
        }
        Commands::Config { output } => {
            commands::write_config(&config, output.as_deref(), io::stdout().lock())
        }
    }
}
