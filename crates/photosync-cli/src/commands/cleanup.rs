//! Cleanup command - Merge duplicate albums
//!
//! Albums sharing a name are merged into the one holding the most photos.
//! Emptied albums are left in place.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use photosync_core::config::Config;
use photosync_sync::merge::MergeReport;
use photosync_sync::SyncEngine;

use super::{connect, prepare_config};
use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct CleanupCommand {
    /// Credentials file (overrides `remote.credentials`)
    #[arg(long)]
    pub credentials: Option<PathBuf>,

    /// Report the duplicate groups without moving any photo
    #[arg(long)]
    pub dry_run: bool,
}

impl CleanupCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(format);
        let config = prepare_config(config, self.credentials.as_ref())?;
        let gateway = connect(&config)?;

        if self.dry_run {
            formatter.info("Dry run mode - no photos will be moved");
        }

        let report = SyncEngine::new(gateway, config)
            .cleanup(self.dry_run)
            .await
            .context("Cleanup aborted")?;

        if matches!(format, OutputFormat::Json) {
            let json = serde_json::to_value(&report).context("Failed to serialize merge report")?;
            formatter.print_json(&json);
        } else {
            print_report(formatter.as_ref(), &report);
        }
        Ok(())
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &MergeReport) {
    if report.groups.is_empty() {
        formatter.success("No duplicate albums");
        return;
    }

    for group in &report.groups {
        formatter.info(&format!(
            "{}: keeping {} ({}), merging {}",
            group.name,
            group.primary_id,
            plural(group.primary_photo_count, "photo"),
            plural(group.merged.len() as u64, "album")
        ));
        for album in &group.merged {
            formatter.info(&format!(
                "  {} ({}, {} moved)",
                album.id,
                plural(album.photo_count, "photo"),
                album.photos_moved
            ));
        }
    }

    if report.dry_run {
        formatter.success(&format!(
            "Found {} of duplicate albums",
            plural(report.groups.len() as u64, "group")
        ));
    } else {
        formatter.success(&format!(
            "Merged {} ({} moved) in {}",
            plural(report.albums_merged, "album"),
            plural(report.photos_moved, "photo"),
            format_duration(report.duration_ms)
        ));
    }

    if !report.failures.is_empty() {
        formatter.error(&format!(
            "{} occurred:",
            plural(report.failures.len() as u64, "error")
        ));
        for failure in &report.failures {
            let target = failure
                .photo_id
                .as_ref()
                .map(|id| format!("photo {id}"))
                .unwrap_or_else(|| "listing".to_string());
            formatter.info(&format!(
                "  {} ({}), {}: {}",
                failure.album, failure.album_id, target, failure.error
            ));
        }
    }
}
