//! HTTP Server for the SDMX Geo API.
//!
//! Decoding and joining run inline per request. Publishing the resulting layer
//! is left to the caller.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                                   |
//! |--------|-------------------|-----------------------------------------------|
//! | GET    | `/health`         | Health check                                  |
//! | POST   | `/api/decode`     | Upload SDMX-JSON or CSV (`file`)              |
//! | POST   | `/api/join`       | Upload `sdmx` + `geometry`, join by field     |
//! | GET    | `/api/logs`       | SSE stream for real-time logs                 |

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header, Method, StatusCode},
    response::{sse::Event, Json, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{collections::HashMap, convert::Infallible, net::SocketAddr, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, LOG_BROADCASTER};
use super::types::{error_response, DecodeResponse, JoinResponse};
use crate::config::Settings;
use crate::error::ServerError;
use crate::transform::join::JoinSpec;
use crate::transform::pipeline::{decode_bytes, join_decoded, load_geometry, SourceFormat};

type ApiError = (StatusCode, Json<Value>);

impl From<ServerError> for ApiError {
    fn from(e: ServerError) -> Self {
        let status = match e {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Pipeline(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        log_error(e.to_string());
        (status, Json(error_response(&e.to_string())))
    }
}

/// Build the router.
pub fn router(settings: &Settings) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/decode", post(decode_upload))
        .route("/api/join", post(join_upload))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes))
        .layer(cors)
}

/// Start the HTTP server
pub async fn start_server(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(&settings);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    println!("🚀 SDMX Geo server running on http://localhost:{}", settings.port);
    println!("   POST /api/decode - Decode SDMX-JSON or CSV");
    println!("   POST /api/join   - Join records to geometry");
    println!("   GET  /api/logs   - SSE log stream");
    println!("   GET  /health     - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "sdmxgeo",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "decode": "POST /api/decode",
            "join": "POST /api/join",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip what they missed.
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart form split into file parts and text parts.
#[derive(Default)]
struct Form {
    files: HashMap<String, (Option<String>, Vec<u8>)>,
    texts: HashMap<String, String>,
}

impl Form {
    async fn read(mut multipart: Multipart) -> Result<Self, ServerError> {
        let mut form = Form::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;

            if file_name.is_some() {
                form.files.insert(name, (file_name, bytes.to_vec()));
            } else {
                form.texts
                    .insert(name, String::from_utf8_lossy(&bytes).into_owned());
            }
        }

        Ok(form)
    }

    /// File part, or a text part carrying the payload inline.
    fn take_file(&mut self, name: &str) -> Result<(String, Vec<u8>), ServerError> {
        if let Some((file_name, bytes)) = self.files.remove(name) {
            return Ok((file_name.unwrap_or_else(|| name.to_string()), bytes));
        }
        self.texts
            .remove(name)
            .map(|text| (name.to_string(), text.into_bytes()))
            .ok_or_else(|| ServerError::BadRequest(format!("No '{}' file provided", name)))
    }

    fn text(&self, name: &str) -> Option<String> {
        self.texts.get(name).cloned()
    }

    fn required_text(&self, name: &str) -> Result<String, ServerError> {
        self.text(name)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ServerError::BadRequest(format!("Missing '{}' field", name)))
    }
}

fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{}", title);
    println!("{}\n", "=".repeat(70));
}

/// Decode endpoint
async fn decode_upload(multipart: Multipart) -> Result<Json<DecodeResponse>, ApiError> {
    let mut form = Form::read(multipart).await?;
    let (file_name, bytes) = form.take_file("file")?;

    banner(&format!("📄 DECODE: {} ({} bytes)", file_name, bytes.len()));

    let decoded = decode_bytes(&bytes, SourceFormat::Auto).map_err(ServerError::from)?;
    Ok(Json(DecodeResponse::from(decoded)))
}

/// Join endpoint
async fn join_upload(multipart: Multipart) -> Result<Json<JoinResponse>, ApiError> {
    let mut form = Form::read(multipart).await?;
    let (sdmx_name, sdmx_bytes) = form.take_file("sdmx")?;
    let (_, geometry_bytes) = form.take_file("geometry")?;

    let spec = JoinSpec::new(
        form.required_text("geoField")?,
        form.text("geoPrefix"),
        form.required_text("sdmxField")?,
        form.text("sdmxPrefix"),
    );

    banner(&format!("🔗 JOIN: {} ({} bytes)", sdmx_name, sdmx_bytes.len()));

    let decoded = decode_bytes(&sdmx_bytes, SourceFormat::Auto).map_err(ServerError::from)?;
    let geometry = load_geometry(&geometry_bytes).map_err(ServerError::from)?;
    let outcome = join_decoded(decoded, &geometry, &spec);

    Ok(Json(JoinResponse::from(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_status() {
        let (status, body) = ApiError::from(ServerError::BadRequest("No 'file' file provided".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["status"], "error");
    }

    #[test]
    fn test_required_text() {
        let mut form = Form::default();
        form.texts.insert("geoField".into(), "ISO".into());
        form.texts.insert("sdmxField".into(), "  ".into());

        assert_eq!(form.required_text("geoField").unwrap(), "ISO");
        assert!(form.required_text("sdmxField").is_err());
        assert!(form.take_file("sdmx").is_err());
    }

    #[test]
    fn test_router_builds() {
        let _ = router(&Settings::default());
    }
}
