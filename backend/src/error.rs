//! Error types for the SDMX Geo pipeline.
//!
//! This module defines the error hierarchy used across the crate:
//!
//! - [`DecodeError`] - payload validation and parsing errors (SDMX-JSON and CSV)
//! - [`LookupError`] - recoverable per-field lookup failures during decoding
//! - [`FetchError`] - network errors from the SDMX API or feature service
//! - [`JoinError`] - cancellation of a long-running join
//! - [`PipelineError`] - top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors that abort a whole decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Structural validation failed (SDMX shape sniff, empty CSV).
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Payload passed validation but its structure could not be bound.
    #[error("Malformed SDMX structure: {0}")]
    Malformed(String),

    /// Bytes are not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bytes are not valid CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),
}

// =============================================================================
// Lookup Errors (recoverable)
// =============================================================================

/// A composite-key segment or attribute index that could not be resolved.
///
/// These never abort a decode. The affected fields are set to `null` and the
/// error is reported alongside the decoded records.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    /// Key segment is not a base-10 integer.
    #[error("key segment '{segment}' for '{component}' is not an integer")]
    NotAnIndex { component: String, segment: String },

    /// Index points past the end of the component's value list.
    #[error("index {index} out of range for '{component}' ({len} values)")]
    OutOfRange {
        component: String,
        index: usize,
        len: usize,
    },

    /// Observation carries more attribute values than the structure declares.
    #[error("no attribute declared at position {position}")]
    UnknownAttribute { position: usize },
}

// =============================================================================
// Network Errors
// =============================================================================

/// Errors from remote sources, surfaced to the caller verbatim.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request could not be sent or timed out.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Remote answered with a non-success status.
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    /// Response body was not the expected document.
    #[error("Invalid response body: {0}")]
    Body(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Request(e.to_string())
    }
}

// =============================================================================
// Join Errors
// =============================================================================

/// Errors from the cancellable join. The plain join never fails.
#[derive(Debug, Error)]
pub enum JoinError {
    /// Cancellation was requested before all records were processed.
    #[error("Join cancelled after {processed} records")]
    Cancelled { processed: usize },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Decoding error.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Network error.
    #[error("Network error: {0}")]
    Fetch(#[from] FetchError),

    /// Join error.
    #[error("Join error: {0}")]
    Join(#[from] JoinError),

    /// Geometry source could not be parsed.
    #[error("Invalid geometry source: {0}")]
    Geometry(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for network operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
