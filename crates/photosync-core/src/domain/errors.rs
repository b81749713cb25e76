//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including identifier validation failures and invalid state transitions.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid album (photoset) identifier
    #[error("Invalid album ID: {0}")]
    InvalidAlbumId(String),

    /// Invalid photo identifier
    #[error("Invalid photo ID: {0}")]
    InvalidPhotoId(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// An album name was empty or otherwise unusable as a natural key
    #[error("Invalid album name: {0}")]
    InvalidAlbumName(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
