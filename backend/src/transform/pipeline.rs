//! High-level pipeline API: read a source, decode it, join it to geometry.
//!
//! These functions combine the steps and report progress through the log
//! broadcaster, so the CLI and the HTTP server show the same messages.
//!
//! # Example
//!
//! ```rust,ignore
//! use sdmxgeo::transform::pipeline::{decode_file, join_decoded, load_geometry_file, SourceFormat};
//! use sdmxgeo::transform::join::JoinSpec;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let decoded = decode_file(Path::new("mortality.json"), SourceFormat::Auto).await?;
//!     let geometry = load_geometry_file(Path::new("countries.geojson")).await?;
//!     let spec = JoinSpec::new("ISO3", None, "REF_AREA_CODE", None);
//!
//!     let joined = join_decoded(decoded, &geometry, &spec);
//!     println!("{} of {} records matched", joined.matched, joined.layer.len());
//!     Ok(())
//! }
//! ```

use serde_json::Value;
use std::path::Path;

use super::join::{join, where_clause, JoinSpec};
use super::sdmx::{self, Decoded, Origin, PayloadSummary};
use super::sdmx_ml::summarize_xml;
use super::tabular::decode_csv;
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::client::{FeatureServiceClient, SdmxClient};
use crate::error::{DecodeError, PipelineError, PipelineResult};
use crate::models::FeatureCollection;

/// Issues printed individually before summarizing.
const MAX_LOGGED_ISSUES: usize = 5;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Input format of a decode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceFormat {
    /// Sniff the first significant character: `{` means SDMX-JSON.
    #[default]
    Auto,
    SdmxJson,
    Csv,
}

impl SourceFormat {
    /// Resolve `Auto` against the payload.
    pub fn resolve(self, bytes: &[u8]) -> Self {
        match self {
            Self::Auto => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                match body.iter().copied().find(|b| !b.is_ascii_whitespace()) {
                    Some(b'{') => Self::SdmxJson,
                    _ => Self::Csv,
                }
            }
            other => other,
        }
    }
}

/// Joined layer with match counts.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub layer: FeatureCollection,
    pub matched: usize,
    pub unmatched: usize,
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an in-memory payload.
pub fn decode_bytes(bytes: &[u8], format: SourceFormat) -> PipelineResult<Decoded> {
    let decoded = match format.resolve(bytes) {
        SourceFormat::Csv => {
            log_info("📖 Reading CSV payload...");
            decode_csv(bytes)?
        }
        _ => {
            log_info("📖 Reading SDMX-JSON payload...");
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            let json: Value = serde_json::from_slice(body).map_err(DecodeError::from)?;
            decode_json(&json)?
        }
    };

    report(&decoded);
    Ok(decoded)
}

/// Decode a file, reading it asynchronously.
pub async fn decode_file(path: &Path, format: SourceFormat) -> PipelineResult<Decoded> {
    log_info(format!("📄 Loading {}", path.display()));
    let bytes = tokio::fs::read(path).await?;
    decode_bytes(&bytes, format)
}

/// Fetch an SDMX-JSON payload and decode it.
pub async fn decode_url(client: &SdmxClient, url: &str) -> PipelineResult<Decoded> {
    let json = client.fetch_payload(url).await?;
    let decoded = decode_json(&json)?;
    report(&decoded);
    Ok(decoded)
}

/// Fetch a GenericData (SDMX-ML) message and summarize it.
pub async fn summarize_xml_url(client: &SdmxClient, url: &str) -> PipelineResult<PayloadSummary> {
    let xml = client.fetch_xml(url).await?;
    let summary = summarize_xml(&xml)?;
    log_success(format!("{} observations found", summary.count));
    log_info_indent(format!("Fields: {}", summary.fields.join(", ")), 1);
    Ok(summary)
}

fn decode_json(json: &Value) -> Result<Decoded, DecodeError> {
    let message = sdmx::check(json)?;

    let periods = sdmx::non_monthly_periods(&message.structure);
    if !periods.is_empty() {
        log_warning(format!(
            "{} TIME_PERIOD values are not monthly (e.g. '{}'); they are read as year plus first number",
            periods.len(),
            periods[0]
        ));
    }

    Ok(sdmx::decode_message(&message))
}

fn report(decoded: &Decoded) {
    match &decoded.origin {
        Origin::Sdmx => {
            log_success(format!("{} observations found", decoded.count));
            if let Some(name) = &decoded.layer_name {
                log_info(format!("Layer name: {}", name));
            }
        }
        Origin::Csv {
            encoding,
            delimiter,
        } => {
            log_success(format!("Detected encoding: {}", encoding));
            log_success(format!("Detected separator: '{}'", format_delimiter(*delimiter)));
            log_success(format!("{} rows found", decoded.count));
        }
    }

    log_info(format!("📋 {} fields:", decoded.schema.len()));
    for (i, field) in decoded.schema.iter().enumerate() {
        log_info_indent(format!("[{:2}] {}", i + 1, field.name), 1);
    }

    if !decoded.issues.is_empty() {
        log_warning(format!(
            "{} fields could not be resolved and were left empty",
            decoded.issues.len()
        ));
        for issue in decoded.issues.iter().take(MAX_LOGGED_ISSUES) {
            log_warning(format!("• record {} ({}): {}", issue.record, issue.key, issue.message));
        }
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Parse a GeoJSON FeatureCollection.
pub fn load_geometry(bytes: &[u8]) -> PipelineResult<FeatureCollection> {
    let collection: FeatureCollection =
        serde_json::from_slice(bytes).map_err(|e| PipelineError::Geometry(e.to_string()))?;
    log_success(format!("{} boundaries loaded", collection.len()));
    Ok(collection)
}

pub async fn load_geometry_file(path: &Path) -> PipelineResult<FeatureCollection> {
    log_info(format!("🗺️  Loading geometry from {}", path.display()));
    let bytes = tokio::fs::read(path).await?;
    load_geometry(&bytes)
}

// =============================================================================
// Joining
// =============================================================================

/// Join decoded records to a geometry source and wrap them as a layer.
pub fn join_decoded(mut decoded: Decoded, geometry: &FeatureCollection, spec: &JoinSpec) -> JoinOutcome {
    log_info(format!(
        "🔗 Joining on {}{} = {}{}",
        spec.geo_prefix.as_deref().unwrap_or(""),
        spec.geo_field,
        spec.sdmx_prefix.as_deref().unwrap_or(""),
        spec.sdmx_field
    ));

    let records = std::mem::take(&mut decoded.records);
    let result = join(geometry, records, spec);

    if result.unmatched == 0 {
        log_success(format!("All {} records matched", result.matched));
    } else {
        log_success(format!("Matched: {}", result.matched));
        log_warning(format!("Without geometry: {}", result.unmatched));
    }

    decoded.records = result.records;
    let layer = decoded.into_collection();

    JoinOutcome {
        layer,
        matched: result.matched,
        unmatched: result.unmatched,
    }
}

/// Query only the boundaries the records reference, then join.
pub async fn join_with_feature_service(
    decoded: Decoded,
    client: &FeatureServiceClient,
    url: &str,
    spec: &JoinSpec,
) -> PipelineResult<JoinOutcome> {
    let filter = where_clause(&decoded.records, &spec.geo_field, &spec.sdmx_field);
    let geometry = client.query_geometry(url, &filter).await?;
    Ok(join_decoded(decoded, &geometry, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "data": {
                "structure": {
                    "dimensions": { "observation": [{
                        "id": "REF_AREA", "keyPosition": 0, "name": "Reference area",
                        "values": [{ "id": "AF", "name": "Afghanistan" }, { "id": "IR", "name": "Iran" }]
                    }]},
                    "attributes": { "observation": [] }
                },
                "dataSets": [{ "observations": { "0": [1.5], "1": [2.5] } }]
            }
        })
    }

    fn boundaries() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": { "ISO": "IR" },
                  "geometry": { "type": "Point", "coordinates": [53.0, 32.0] } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_format_sniffing() {
        assert_eq!(SourceFormat::Auto.resolve(b"  \n{\"data\":{}}"), SourceFormat::SdmxJson);
        assert_eq!(SourceFormat::Auto.resolve(b"\xEF\xBB\xBF{}"), SourceFormat::SdmxJson);
        assert_eq!(SourceFormat::Auto.resolve(b"id,value\n"), SourceFormat::Csv);
        assert_eq!(SourceFormat::Csv.resolve(b"{}"), SourceFormat::Csv);
    }

    #[test]
    fn test_decode_bytes_sdmx() {
        let bytes = serde_json::to_vec(&payload()).unwrap();
        let decoded = decode_bytes(&bytes, SourceFormat::Auto).unwrap();
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.origin, Origin::Sdmx);
    }

    #[test]
    fn test_decode_bytes_invalid_json() {
        let err = decode_bytes(b"{not json", SourceFormat::Auto).unwrap_err();
        assert!(matches!(err, PipelineError::Decode(DecodeError::Json(_))));
    }

    #[test]
    fn test_join_decoded() {
        let bytes = serde_json::to_vec(&payload()).unwrap();
        let decoded = decode_bytes(&bytes, SourceFormat::SdmxJson).unwrap();
        let geometry = load_geometry(&boundaries()).unwrap();
        let spec = JoinSpec::new("ISO", None, "REF_AREA_CODE", None);

        let outcome = join_decoded(decoded, &geometry, &spec);

        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.unmatched, 1);
        assert!(outcome.layer.features[0].geometry.is_none());
        assert!(outcome.layer.features[1].geometry.is_some());
        assert_eq!(outcome.layer.metadata.unwrap().name, "from sdmx");
    }

    #[test]
    fn test_invalid_geometry() {
        let err = load_geometry(b"\"not geojson\"").unwrap_err();
        assert!(matches!(err, PipelineError::Geometry(_)));
    }

    #[tokio::test]
    async fn test_decode_file_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rates.csv");
        std::fs::write(&path, "ISO;rate\nAF;12\nIR;7\n").unwrap();

        let decoded = decode_file(&path, SourceFormat::Auto).await.unwrap();

        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.field_names(), vec!["ISO", "rate"]);
    }

    #[tokio::test]
    async fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/data.json"), SourceFormat::Auto)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[tokio::test]
    async fn test_summarize_xml_unreachable() {
        let settings = crate::config::Settings {
            http_timeout: std::time::Duration::from_secs(2),
            ..Default::default()
        };
        let client = SdmxClient::new(&settings).unwrap();

        let err = summarize_xml_url(&client, "http://127.0.0.1:9/data").await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch(_)));
    }
}
