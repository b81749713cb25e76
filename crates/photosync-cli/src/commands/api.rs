//! Api command - Issue one raw call through the gateway
//!
//! Prints the normalized result, or the part of it named by `--select`.
//! A `photo=<path>` argument attaches that file, which only the `upload`
//! method accepts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use photosync_core::config::Config;
use photosync_core::ports::{Params, UploadContent, UPLOAD_METHOD};
use photosync_flickr::response::select;
use tracing::debug;

use super::{connect, prepare_config};
use crate::output::{get_formatter, OutputFormat};

/// Argument naming the file to upload
const PHOTO_ARG: &str = "photo";

#[derive(Debug, Args)]
pub struct ApiCommand {
    /// Method name, e.g. `flickr.photosets.getList`, or `upload`
    #[arg(long)]
    pub method: String,

    /// Call arguments as `key=value`
    #[arg(value_parser = parse_key_value)]
    pub args: Vec<(String, String)>,

    /// Dotted path into the result, e.g. `photosets.photoset.0.id`
    #[arg(long)]
    pub select: Option<String>,

    /// Credentials file (overrides `remote.credentials`)
    #[arg(long)]
    pub credentials: Option<PathBuf>,
}

impl ApiCommand {
    pub async fn execute(&self, format: OutputFormat, config: Config) -> Result<()> {
        let formatter = get_formatter(format);
        let config = prepare_config(config, self.credentials.as_ref())?;

        let (params, photo) = split_args(&self.args);
        let upload = match photo {
            Some(path) if self.method == UPLOAD_METHOD => Some(read_upload(Path::new(&path)).await?),
            Some(_) => bail!("`{PHOTO_ARG}=` is only accepted by the `{UPLOAD_METHOD}` method"),
            None => None,
        };

        let gateway = connect(&config)?;
        debug!(method = %self.method, params = params.len(), "Calling API");
        let result = gateway
            .call(&self.method, &params, upload)
            .await
            .with_context(|| format!("{} failed", self.method))?;

        let selected = match &self.select {
            Some(path) => select(&result, path)
                .with_context(|| format!("Nothing at `{path}` in the response"))?,
            None => &result,
        };

        match (format, selected) {
            (OutputFormat::Human, serde_json::Value::String(text)) => println!("{text}"),
            (OutputFormat::Human, value) => println!("{}", serde_json::to_string_pretty(value)?),
            (OutputFormat::Json, value) => formatter.print_json(value),
        }
        Ok(())
    }
}

fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{arg}`")),
    }
}

/// Separates the `photo` argument from the call parameters
fn split_args(args: &[(String, String)]) -> (Params, Option<String>) {
    let mut params = Params::new();
    let mut photo = None;
    for (key, value) in args {
        if key == PHOTO_ARG {
            photo = Some(value.clone());
        } else {
            params.insert(key.clone(), value.clone());
        }
    }
    (params, photo)
}

async fn read_upload(path: &Path) -> Result<UploadContent> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(UploadContent::new(file_name, data))
}
