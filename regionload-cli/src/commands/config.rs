//! Configuration CLI commands.

use std::path::Path;

use clap::Subcommand;
use regionload::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
        ConfigCommands::Show => {
            let path = config_file_path();
            let config = ConfigFile::load_from(&path)?;
            if !path.exists() {
                println!("# {} not found, showing defaults", path.display());
            }
            print!("{}", config.to_ini_string()?);
            Ok(())
        }
        ConfigCommands::Init { force } => {
            let path = config_file_path();
            init_at(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn init_at(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    Ok(())
}
