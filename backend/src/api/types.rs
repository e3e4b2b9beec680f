//! REST API types.
//!
//! Decoded and joined layers are returned as GeoJSON FeatureCollections with
//! layer metadata, ready for an external publish step.

use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{FeatureCollection, FieldDef};
use crate::transform::pipeline::JoinOutcome;
use crate::transform::sdmx::{Decoded, LookupIssue, Origin};

/// Response to `POST /api/decode`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeResponse {
    pub job_id: String,
    /// "ready" or "warning" (some fields could not be resolved)
    pub status: String,
    pub layer: FeatureCollection,
    pub metadata: DecodeMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeMetadata {
    pub count: usize,
    /// "sdmx" or "csv"
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    pub fields: Vec<FieldDef>,
    pub issues: Vec<LookupIssue>,
}

/// Response to `POST /api/join`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub job_id: String,
    /// "ready" when every record found a geometry, "warning" otherwise
    pub status: String,
    pub layer: FeatureCollection,
    pub matched: usize,
    pub unmatched: usize,
}

fn status(clean: bool) -> String {
    let status = if clean { "ready" } else { "warning" };
    status.to_string()
}

impl From<Decoded> for DecodeResponse {
    fn from(decoded: Decoded) -> Self {
        let (source, encoding, delimiter) = match &decoded.origin {
            Origin::Sdmx => ("sdmx", None, None),
            Origin::Csv {
                encoding,
                delimiter,
            } => ("csv", Some(encoding.clone()), Some(delimiter.to_string())),
        };

        let metadata = DecodeMetadata {
            count: decoded.count,
            source: source.to_string(),
            encoding,
            delimiter,
            fields: decoded.schema.clone(),
            issues: decoded.issues.clone(),
        };

        DecodeResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(metadata.issues.is_empty()),
            layer: decoded.into_collection(),
            metadata,
        }
    }
}

impl From<JoinOutcome> for JoinResponse {
    fn from(outcome: JoinOutcome) -> Self {
        JoinResponse {
            job_id: Uuid::new_v4().to_string(),
            status: status(outcome.unmatched == 0),
            layer: outcome.layer,
            matched: outcome.matched,
            unmatched: outcome.unmatched,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}
