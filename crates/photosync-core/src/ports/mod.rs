//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are interfaces that the sync engine depends on, but whose
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteGateway`] - Signed calls against the remote photo service

pub mod remote_gateway;

pub use remote_gateway::{
    params, GatewayError, IRemoteGateway, Params, UploadContent, UPLOAD_METHOD,
};
