//! Photosync Sync - album resolution and upload coordination
//!
//! Provides:
//! - An in-memory cache of what the remote service holds
//! - Coalesced album creation and photo listing
//! - Idempotent, retried photo uploads driven by a bounded work queue
//! - Merging of duplicate albums
//!
//! ## Modules
//!
//! - [`cache`] - Entity cache of albums and their photos
//! - [`gate`] - Single-flight coalescing gate
//! - [`resolver`] - Album resolver (create or list, exactly once per name)
//! - [`uploader`] - Upload coordinator (`ensure` a local file exists remotely)
//! - [`queue`] - Bounded work queue and the sync report
//! - [`discovery`] - Local media discovery
//! - [`merge`] - Duplicate album merger
//! - [`remote`] - Typed calls over the remote gateway port
//! - [`retry`] - Bounded exponential-backoff retry
//! - [`engine`] - Facade wiring everything for the CLI

pub mod cache;
pub mod discovery;
pub mod engine;
pub mod gate;
pub mod merge;
pub mod queue;
pub mod remote;
pub mod resolver;
pub mod retry;
pub mod uploader;

use std::path::PathBuf;

use photosync_core::domain::DomainError;
use photosync_core::ports::GatewayError;
use thiserror::Error;

pub use engine::SyncEngine;

/// Errors that can occur during synchronization operations
///
/// `Clone` so that one outcome can be handed to every caller waiting on
/// the same coalesced operation.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The run could not start (unreadable root directory, bad setup)
    #[error("Setup error: {0}")]
    Setup(String),

    /// A remote call failed and was not retried
    #[error("Remote error: {0}")]
    Gateway(#[from] GatewayError),

    /// A domain invariant was violated
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// A local file could not be read
    #[error("Local file error for {path}: {message}")]
    LocalFile { path: PathBuf, message: String },

    /// Walking the local directory tree failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A new album needs a cover photo but the account has no photos
    #[error("No photo available to use as album cover")]
    NoCoverPhoto,

    /// A retryable remote call kept failing
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        last_error: GatewayError,
    },

    /// The operation this caller was waiting on went away without a result
    #[error("Operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Retries spent before this error was returned
    pub fn retries(&self) -> u32 {
        match self {
            SyncError::RetriesExhausted { attempts, .. } => attempts.saturating_sub(1),
            _ => 0,
        }
    }

    /// Whether this error must abort the whole run rather than one item
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Setup(_) | SyncError::Discovery(_))
    }
}
