//! HTTP acquisition adapters.
//!
//! - [`SdmxClient`] fetches SDMX-JSON (or SDMX-ML) data messages from SDMX REST
//!   endpoints.
//! - [`FeatureServiceClient`] reads field lists and queries GeoJSON from a
//!   geographic feature service.
//!
//! Both are single request/response round trips: no retries, no streaming.
//! Timeouts come from [`Settings::http_timeout`].
//!
//! ```rust,ignore
//! use sdmxgeo::client::FeatureServiceClient;
//! use sdmxgeo::config::Settings;
//!
//! let client = FeatureServiceClient::new(&Settings::from_env())?;
//! let boundaries = client
//!     .query_geometry("https://services.example.org/FeatureServer/0", "ISO IN ('AF')")
//!     .await?;
//! ```

use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::logs::{log_info, log_success};
use crate::config::{Settings, SDMX_ML_ACCEPT_HEADER};
use crate::error::{FetchError, FetchResult};
use crate::models::FeatureCollection;

fn build_http(settings: &Settings) -> FetchResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .map_err(FetchError::from)
}

/// Send a request and return the body, failing on non-success status.
async fn send(request: reqwest::RequestBuilder, url: &str) -> FetchResult<String> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(500).collect(),
        });
    }
    Ok(body)
}

fn parse_json(body: &str) -> FetchResult<Value> {
    serde_json::from_str(body).map_err(|e| FetchError::Body(e.to_string()))
}

// =============================================================================
// SDMX REST
// =============================================================================

/// Client for SDMX REST data endpoints.
#[derive(Clone)]
pub struct SdmxClient {
    http: reqwest::Client,
    accept: String,
}

impl SdmxClient {
    pub fn new(settings: &Settings) -> FetchResult<Self> {
        Ok(Self {
            http: build_http(settings)?,
            accept: settings.sdmx_accept.clone(),
        })
    }

    /// GET a data message as JSON.
    ///
    /// The body is returned as-is; bare responses are accepted by the decoder,
    /// which looks through an optional `data` envelope.
    pub async fn fetch_payload(&self, url: &str) -> FetchResult<Value> {
        log_info(format!("Requesting SDMX data from {}", url));
        let body = send(self.http.get(url).header(ACCEPT, &self.accept), url).await?;
        log_success(format!("Received {} bytes", body.len()));
        parse_json(&body)
    }

    /// GET a GenericData (SDMX-ML) message as text.
    pub async fn fetch_xml(&self, url: &str) -> FetchResult<String> {
        log_info(format!("Requesting SDMX-ML data from {}", url));
        let body = send(self.http.get(url).header(ACCEPT, SDMX_ML_ACCEPT_HEADER), url).await?;
        log_success(format!("Received {} bytes", body.len()));
        Ok(body)
    }
}

// =============================================================================
// Feature service
// =============================================================================

/// A field advertised by a feature service layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceField {
    pub name: String,
    #[serde(default)]
    pub alias: String,
    #[serde(rename = "type", default)]
    pub field_type: String,
}

#[derive(Deserialize)]
struct LayerInfo {
    #[serde(default)]
    fields: Vec<ServiceField>,
}

/// Client for a geographic feature service layer.
#[derive(Clone)]
pub struct FeatureServiceClient {
    http: reqwest::Client,
    token: Option<String>,
}

impl FeatureServiceClient {
    pub fn new(settings: &Settings) -> FetchResult<Self> {
        Ok(Self {
            http: build_http(settings)?,
            token: settings.feature_service_token.clone(),
        })
    }

    fn params<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut params = extra.to_vec();
        if let Some(token) = &self.token {
            params.push(("token", token.as_str()));
        }
        params
    }

    /// Fields of the layer at `url`.
    pub async fn fields(&self, url: &str) -> FetchResult<Vec<ServiceField>> {
        let request = self.http.get(url).query(&self.params(&[("f", "json")]));
        let body = send(request, url).await?;

        let value = parse_json(&body)?;
        if let Some(error) = value.get("error") {
            return Err(FetchError::Body(error.to_string()));
        }
        let info: LayerInfo =
            serde_json::from_value(value).map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(info.fields)
    }

    /// Query the layer as GeoJSON in WGS84, all attributes, filtered by `where_clause`.
    pub async fn query_geometry(&self, url: &str, where_clause: &str) -> FetchResult<FeatureCollection> {
        let query_url = format!("{}/query", url.trim_end_matches('/'));
        let request = self.http.get(&query_url).query(&self.params(&[
            ("f", "geojson"),
            ("outFields", "*"),
            ("outSR", "4326"),
            ("returnGeometry", "true"),
            ("where", where_clause),
        ]));

        log_info(format!("Querying {} where {}", query_url, where_clause));
        let body = send(request, &query_url).await?;
        let collection: FeatureCollection =
            serde_json::from_str(&body).map_err(|e| FetchError::Body(e.to_string()))?;
        log_success(format!("{} boundaries received", collection.len()));
        Ok(collection)
    }
}
