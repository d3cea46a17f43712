//! magicdb - Identify file formats from a magic signature database
//!
//! Walks the given files and directories, matches each one against the
//! built-in or a user supplied FILE_ID database and prints the detected
//! format with its metadata.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use magicdb::cli::{self, Cli, Commands};
use magicdb::config::{self, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    let level = if cli.debug {
        "debug"
    } else {
        config.general.log_level.as_str()
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(format!("magicdb={level}").parse()?))
        .init();

    match cli.command {
        Commands::Identify(args) => {
            cli::run_identify(&args, config)?;
        }
        Commands::Check(args) => {
            cli::run_check(&args, &config)?;
        }
        Commands::Config => {
            print!("{}", config::generate_sample_config());
        }
    }

    Ok(())
}
