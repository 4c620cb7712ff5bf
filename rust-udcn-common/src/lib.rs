//! Common types and utilities for the micro Data-Centric Networking (μDCN) implementation.
//!
//! This crate provides the wire types, configuration, error types, and metrics
//! shared by the forwarding engine, the QUIC link layer, and the CLI.

pub mod config;
pub mod error;
pub mod metrics;
pub mod ndn;
pub mod tlv;
pub mod types;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
