//! Runtime settings, read from the environment (and `.env` when present).
//!
//! | Variable                         | Default                                            |
//! |----------------------------------|----------------------------------------------------|
//! | `SDMXGEO_PORT`                   | `3000`                                             |
//! | `SDMXGEO_HTTP_TIMEOUT_SECS`      | `60`                                               |
//! | `SDMXGEO_MAX_UPLOAD_BYTES`       | `52428800` (50 MiB)                                |
//! | `SDMXGEO_FEATURE_SERVICE_TOKEN`  | unset                                              |
//! | `SDMXGEO_SDMX_ACCEPT`            | `application/vnd.sdmx.data+json;version=1.0.0-wd`  |

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Media type requested from SDMX REST endpoints.
pub const SDMX_ACCEPT_HEADER: &str = "application/vnd.sdmx.data+json;version=1.0.0-wd";

/// Media type requested when fetching SDMX-ML.
pub const SDMX_ML_ACCEPT_HEADER: &str = "application/vnd.sdmx.genericdata+xml;version=2.1";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub http_timeout: Duration,
    pub max_upload_bytes: usize,
    /// Passed through to the feature service as `token`.
    pub feature_service_token: Option<String>,
    pub sdmx_accept: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            feature_service_token: None,
            sdmx_accept: SDMX_ACCEPT_HEADER.to_string(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            port: parsed(&lookup, "SDMXGEO_PORT").unwrap_or(defaults.port),
            http_timeout: parsed(&lookup, "SDMXGEO_HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            max_upload_bytes: parsed(&lookup, "SDMXGEO_MAX_UPLOAD_BYTES")
                .unwrap_or(defaults.max_upload_bytes),
            feature_service_token: lookup("SDMXGEO_FEATURE_SERVICE_TOKEN")
                .filter(|t| !t.trim().is_empty()),
            sdmx_accept: lookup("SDMXGEO_SDMX_ACCEPT")
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(defaults.sdmx_accept),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        if token.is_some() {
            self.feature_service_token = token;
        }
        self
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
