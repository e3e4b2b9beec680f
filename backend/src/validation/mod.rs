//! JSON Schema validation for SDMX-JSON data messages.
//!
//! The decoder only sniffs the structure it reads: the dimension and attribute
//! descriptors at observation level, and a first data set carrying either
//! `observations` or `series`. Full SDMX-JSON schema validation is not attempted.
//!
//! # Embedded Schema
//!
//! The schema is embedded at compile time from
//! `schemas/sdmx-data-message.json`.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use sdmxgeo::validation::is_sdmx_valid;
//!
//! let message = json!({
//!     "structure": {
//!         "dimensions": { "observation": [] },
//!         "attributes": { "observation": [] }
//!     },
//!     "dataSets": [{ "observations": {} }]
//! });
//! assert!(is_sdmx_valid(&message));
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;

static SDMX_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/sdmx-data-message.json"))
        .expect("Invalid embedded schema")
});

static SDMX_VALIDATOR: Lazy<jsonschema::Validator> =
    Lazy::new(|| jsonschema::draft7::new(&SDMX_SCHEMA).expect("Invalid embedded schema"));

/// Validate the contents of a `data` envelope as an SDMX-JSON data message.
pub fn validate_sdmx_message(data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = SDMX_VALIDATOR
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Quick check against the SDMX data message schema.
pub fn is_sdmx_valid(data: &Value) -> bool {
    SDMX_VALIDATOR.is_valid(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(data_set: Value) -> Value {
        json!({
            "structure": {
                "dimensions": { "observation": [] },
                "attributes": { "observation": [] }
            },
            "dataSets": [data_set]
        })
    }

    #[test]
    fn test_valid_observations() {
        assert!(is_sdmx_valid(&message(json!({ "observations": {} }))));
    }

    #[test]
    fn test_valid_series() {
        assert!(is_sdmx_valid(&message(json!({ "series": {} }))));
    }

    #[test]
    fn test_missing_data() {
        assert!(!is_sdmx_valid(&message(json!({ "action": "Information" }))));
        assert!(!is_sdmx_valid(&message(json!({ "observations": null }))));
    }

    #[test]
    fn test_missing_attributes() {
        let data = json!({
            "structure": { "dimensions": { "observation": [] }, "attributes": {} },
            "dataSets": [{ "observations": {} }]
        });
        let errors = validate_sdmx_message(&data).unwrap_err();
        assert!(!errors.is_empty());
    }

    #[test]
    fn test_empty_data_sets() {
        let data = json!({
            "structure": {
                "dimensions": { "observation": [] },
                "attributes": { "observation": [] }
            },
            "dataSets": []
        });
        assert!(!is_sdmx_valid(&data));
    }
}
