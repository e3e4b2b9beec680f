//! Transformation module.
//!
//! This module handles SDMX to GeoJSON transformation:
//! - SDMX: data message to flat records and field schema
//! - SDMX-ML: GenericData XML observation count and field ids
//! - Tabular: CSV to the same record contract
//! - Period: `TIME_PERIOD` normalization
//! - Join: attach boundary geometry by key field
//! - Pipeline: source loading, logging and orchestration

pub mod join;
pub mod period;
pub mod pipeline;
pub mod sdmx;
pub mod sdmx_ml;
pub mod tabular;

pub use join::{join, join_cancellable, where_clause, JoinResult, JoinSpec};
pub use pipeline::*;
pub use sdmx::{decode, Decoded, LookupIssue, Origin, PayloadSummary};
pub use sdmx_ml::summarize_xml;
pub use tabular::{decode_csv, decode_csv_str};
