//! # SDMX Geo - SDMX-JSON to GeoJSON decoding and geometry joins
//!
//! Turns statistical data messages (SDMX-JSON, or plain CSV) into flat GeoJSON
//! features, then attaches boundary geometry by matching a key field.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  SDMX-JSON  │────▶│   Decoder   │────▶│   Joiner    │────▶│   GeoJSON   │
//! │  / CSV      │     │ (schema +   │     │ (geometry   │     │   layer     │
//! │             │     │  records)   │     │  by field)  │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdmxgeo::{decode, join, JoinSpec, FeatureCollection};
//!
//! let decoded = decode(&payload)?;
//! let spec = JoinSpec::new("ISO3", None, "REF_AREA_CODE", None);
//! let joined = join(&boundaries, decoded.records, &spec);
//! println!("{} records matched", joined.matched);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Features, field schema, SDMX data message
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Decoder, joiner and pipeline
//! - [`validation`] - SDMX-JSON structural validation
//! - [`client`] - SDMX REST and feature service clients
//! - [`config`] - Environment settings
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Remote sources
pub mod client;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DecodeError, FetchError, JoinError, LookupError, PipelineError, ServerError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DataMessage, Dataflow, Feature, FeatureCollection, FieldDef, FieldType, LayerMetadata,
    COUNTER_FIELD, OBS_VALUE_FIELD,
};

// =============================================================================
// Re-exports - Decoding and joining
// =============================================================================

pub use transform::sdmx::{decode, derive_schema, is_sdmx_valid, list_dataflows, summarize};
pub use transform::sdmx_ml::summarize_xml;
pub use transform::tabular::{decode_csv, decode_csv_str};
pub use transform::join::{join, join_cancellable, where_clause, JoinResult, JoinSpec};
pub use transform::{Decoded, LookupIssue, Origin, PayloadSummary};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    decode_bytes, decode_file, decode_url, join_decoded, join_with_feature_service,
    load_geometry, load_geometry_file, summarize_xml_url, JoinOutcome, SourceFormat,
};

// =============================================================================
// Re-exports - Clients and settings
// =============================================================================

pub use client::{FeatureServiceClient, SdmxClient, ServiceField};
pub use config::Settings;

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, DecodeResponse, JoinResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
