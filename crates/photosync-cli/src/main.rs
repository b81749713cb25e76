//! photosync CLI - Mirror a local photo tree into Flickr albums
//!
//! Provides commands for:
//! - Uploading a directory tree, one album per directory
//! - Merging duplicate albums
//! - Checking credentials
//! - Issuing raw API calls

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use photosync_core::config::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{api::ApiCommand, cleanup::CleanupCommand, sync::SyncCommand, test::TestCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "photosync", version, about = "Sync local photo directories to Flickr albums")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload every media file missing from its album
    Sync(SyncCommand),
    /// Merge albums that share a name
    Cleanup(CleanupCommand),
    /// Check the credentials against the service
    Test(TestCommand),
    /// Issue a single raw API call
    Api(ApiCommand),
}

impl Cli {
    /// Log filter from the flags, falling back to the configured level
    fn log_filter(&self, config: &Config) -> String {
        match (self.quiet, self.verbose) {
            (true, _) => "warn".to_string(),
            (false, 0) => config.logging.level.clone(),
            (false, 1) => "debug".to_string(),
            _ => "trace".to_string(),
        }
    }
}

/// Loads the configuration file
///
/// An explicitly named file must exist and parse; the default location
/// falls back to built-in defaults.
fn load_config(path: Option<&PathBuf>) -> Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let config = Config::load(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            Ok((config, path.clone()))
        }
        None => {
            let path = Config::default_path();
            Ok((Config::load_or_default(&path), path))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = load_config(cli.config.as_ref())?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter(&config)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!(config_path = %config_path.display(), "Loaded configuration");

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(format, config).await,
        Commands::Cleanup(cmd) => cmd.execute(format, config).await,
        Commands::Test(cmd) => cmd.execute(format, config).await,
        Commands::Api(cmd) => cmd.execute(format, config).await,
    }
}
