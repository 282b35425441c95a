//! regionload CLI - command-line interface
//!
//! Loads parent regions through the regionload library and manages its
//! on-disk cache and configuration.

mod commands;
mod error;
mod progress;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use regionload::config::ConfigFile;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::load::LoadArgs;
use error::CliError;
use progress::BarWriter;

#[derive(Debug, Parser)]
#[command(name = "regionload", version, about = "Incremental, cache-aware region feature loader")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load all features of a parent region
    Load {
        /// Parent region identifier (e.g. a municipality code)
        parent: String,

        /// Write the merged GeoJSON FeatureCollection to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Partition name (overrides config)
        #[arg(long)]
        partition: Option<String>,

        /// Feature endpoint root (overrides config)
        #[arg(long)]
        base_url: Option<String>,

        /// Region resolver endpoint root (overrides config)
        #[arg(long)]
        resolver_url: Option<String>,

        /// Do not submit the merged result to the server cache
        #[arg(long)]
        no_writeback: bool,

        /// Number of regions loaded concurrently
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Manage the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Load {
            parent,
            output,
            partition,
            base_url,
            resolver_url,
            no_writeback,
            concurrency,
        } => {
            let config = ConfigFile::load()?;
            let bar = ProgressBar::hidden();
            let _guard = regionload::logging::init(
                Some(config.logging.directory.as_path()),
                BarWriter::new(bar.clone()),
            )?;
            tracing::info!(version = regionload::VERSION, parent = %parent, "Starting load");

            commands::load::run(
                LoadArgs {
                    parent,
                    output,
                    partition,
                    base_url,
                    resolver_url,
                    no_writeback,
                    concurrency,
                },
                &config,
                bar,
            )
        }
        Commands::Cache { action } => commands::cache::run(action),
        Commands::Config { command } => commands::config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load_arguments() {
        let cli = Cli::try_parse_from([
            "regionload",
            "load",
            "0363",
            "--output",
            "out.geojson",
            "--no-writeback",
            "-j",
            "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Load {
                parent,
                output,
                no_writeback,
                concurrency,
                ..
            } => {
                assert_eq!(parent, "0363");
                assert_eq!(output, Some(PathBuf::from("out.geojson")));
                assert!(no_writeback);
                assert_eq!(concurrency, Some(4));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_stats() {
        let cli = Cli::try_parse_from(["regionload", "cache", "stats"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache {
                action: CacheAction::Stats
            }
        ));
    }
}
