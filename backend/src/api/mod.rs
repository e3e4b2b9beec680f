//! HTTP API module.
//!
//! This module provides the HTTP server, response types and log stream for the
//! SDMX Geo backend.

pub mod server;
pub mod types;
pub mod logs;

pub use server::start_server;
pub use types::*;
pub use logs::*;
