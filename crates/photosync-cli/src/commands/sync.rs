//! Sync command - Upload a local directory tree to Flickr albums
//!
//! Provides the `photosync sync` CLI command which:
//! 1. Applies the command-line overrides to the configuration
//! 2. Loads the credentials and builds the Flickr gateway
//! 3. Runs the SyncEngine over the directory
//! 4. Prints the drain summary
//!
//! Per-file failures are part of the summary and do not change the exit
//! status; setup and discovery failures do.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use photosync_core::config::Config;
use photosync_sync::queue::SyncReport;
use photosync_sync::SyncEngine;
use tracing::info;

use super::{connect, prepare_config};
use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};

/// Upload every media file under a directory into the album named after
/// its parent directory
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Root of the local photo tree
    #[arg(long, short)]
    pub directory: PathBuf,

    /// Credentials file (overrides `remote.credentials`)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Files processed concurrently (overrides `sync.workers`, default 10)
    #[arg(long)]
    pub workers: Option<usize>,
}

impl SyncCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(format);

        let mut config = config;
        if let Some(workers) = self.workers {
            config.sync.workers = workers;
        }
        let config = prepare_config(config, self.credentials.as_ref())?;
        let gateway = connect(&config)?;

        info!(
            directory = %self.directory.display(),
            workers = config.sync.workers,
            "Starting sync"
        );
        formatter.info(&format!(
            "Syncing {} with {}...",
            self.directory.display(),
            plural(config.sync.workers as u64, "worker")
        ));

        let engine = SyncEngine::new(gateway, config);
        let report = engine
            .sync(&self.directory)
            .await
            .with_context(|| format!("Sync of {} aborted", self.directory.display()))?;

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&report).context("Failed to serialize sync report")?;
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), &report);
        }
        Ok(())
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport) {
    if report.uploaded == 0 && report.failed == 0 {
        formatter.success("Already up to date");
    } else {
        formatter.success(&format!("Sync completed in {}", format_duration(report.duration_ms)));
    }

    formatter.info(&format!("Discovered:      {}", plural(report.discovered, "file")));
    formatter.info(&format!("Uploaded:        {}", plural(report.uploaded, "file")));
    formatter.info(&format!("Already present: {}", plural(report.already_present, "file")));
    if report.retries > 0 {
        formatter.info(&format!("Retries:         {}", report.retries));
    }

    if !report.failures.is_empty() {
        formatter.error(&format!("{} failed:", plural(report.failed, "file")));
        for failure in &report.failures {
            formatter.info(&format!(
                "  {}/{}: {}",
                failure.album, failure.photo, failure.error
            ));
        }
    }
}
