//! Photosync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Album`, `Photo`, `LocalFileRef`
//! - **Port definitions** - `IRemoteGateway`, the single-call primitive every
//!   remote operation goes through
//! - **Configuration** - YAML-backed settings with validation and a builder
//!
//! # Architecture
//!
//! The domain module contains pure data and state machines with no I/O.
//! Ports define trait interfaces that adapter crates implement
//! (`photosync-flickr` for the remote service). The sync engine in
//! `photosync-sync` orchestrates domain entities through those ports.

pub mod config;
pub mod domain;
pub mod ports;
