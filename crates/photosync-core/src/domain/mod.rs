//! Domain entities and business logic
//!
//! This module contains the core domain types for photosync:
//! - Newtypes for remote identifiers
//! - Albums (remote photosets) and their lifecycle
//! - Photos and their visibility flags
//! - Local file references produced by discovery
//! - Domain-specific error types

pub mod album;
pub mod errors;
pub mod local_file;
pub mod newtypes;
pub mod photo;

// Re-export commonly used types
pub use album::{Album, AlbumState};
pub use errors::DomainError;
pub use local_file::LocalFileRef;
pub use newtypes::{AlbumId, PhotoId};
pub use photo::{Photo, PhotoState, Visibility};
