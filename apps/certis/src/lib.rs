//! # certis
//!
//! HTTP server, CLI and configuration for the Certis portal.
//!
//! The binary in `main.rs` is a thin wrapper; everything lives here so the
//! integration tests can build routers and parse configuration directly.

pub mod api;
pub mod audit;
pub mod cli;
pub mod config;
pub mod error;

pub use error::AppError;
