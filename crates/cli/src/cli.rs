use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lens", about = "Inspect foreign runtime symbols and types", version)]
pub struct Cli {
    /// Inspector configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Demangle symbols given as arguments, or one per line on stdin
    Demangle {
        symbols: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Fail instead of recovering partial names
        #[arg(long)]
        no_fallback: bool,

        /// Print the innermost view type of framework names
        #[arg(long)]
        swiftui: bool,

        /// Print cache statistics at the end
        #[arg(long)]
        stats: bool,
    },

    /// Write the effective configuration as JSON
    Config {
        /// Destination file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
