//! Domain models for the SDMX Geo pipeline.
//!
//! This module contains the data structures shared by the decoder and the joiner:
//!
//! - [`Feature`] - a property map with an optional shared geometry (one decoded
//!   observation, or one boundary from a geometry source)
//! - [`FeatureCollection`] - GeoJSON collection, with optional layer metadata
//! - [`FieldDef`] / [`FieldType`] - the field schema inferred for a payload
//! - [`sdmx`] - the SDMX-JSON data message

pub mod sdmx;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use sdmx::{
    Component, ComponentGroups, ComponentValue, DataMessage, DataSet, Dataflow, DisplayName,
    Observations, SeriesEntry, Structure,
};

/// Name of the synthetic record identifier.
pub const COUNTER_FIELD: &str = "counterField";

/// Name of the observed value field.
pub const OBS_VALUE_FIELD: &str = "OBS_VALUE";

// =============================================================================
// Field Schema
// =============================================================================

/// Type of a published field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    String,
    Double,
}

/// One field of the schema inferred for a payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub alias: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, alias: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
            field_type,
        }
    }

    /// A string field whose alias is its name.
    pub fn string(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name, FieldType::String)
    }
}

// =============================================================================
// Features
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum FeatureTag {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum CollectionTag {
    #[default]
    FeatureCollection,
}

/// A GeoJSON feature.
///
/// Decoded observations start with no geometry. The joiner attaches geometry
/// by cloning the `Arc` held by the geometry source, so every record matching
/// the same boundary points at one immutable geometry value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: FeatureTag,
    #[serde(default, deserialize_with = "null_as_default")]
    pub properties: IndexMap<String, Value>,
    #[serde(default)]
    pub geometry: Option<Arc<Value>>,
}

impl Feature {
    pub fn new(properties: IndexMap<String, Value>) -> Self {
        Self {
            kind: FeatureTag::Feature,
            properties,
            geometry: None,
        }
    }

    /// Property lookup, `None` when the key is absent.
    pub fn property(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }
}

/// Layer metadata written alongside the features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_field: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

/// A GeoJSON feature collection.
///
/// Used both to read geometry sources and to write the publishable layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub kind: CollectionTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LayerMetadata>,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionTag::FeatureCollection,
            metadata: None,
            features,
        }
    }

    pub fn with_metadata(mut self, metadata: LayerMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_feature_serialization() {
        let mut properties = IndexMap::new();
        properties.insert("ISO".to_string(), json!("AF"));
        let feature = Feature::new(properties);

        let value = serde_json::to_value(&feature).unwrap();
        assert_eq!(value["type"], "Feature");
        assert_eq!(value["properties"]["ISO"], "AF");
        assert!(value["geometry"].is_null());
    }

    #[test]
    fn test_geometry_source_with_null_properties() {
        let fc: FeatureCollection = serde_json::from_value(json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "properties": null, "geometry": null },
                { "type": "Feature", "properties": { "ISO": "AF" },
                  "geometry": { "type": "Point", "coordinates": [66.0, 33.0] } }
            ]
        }))
        .unwrap();

        assert_eq!(fc.len(), 2);
        assert!(fc.features[0].properties.is_empty());
        assert!(fc.features[0].geometry.is_none());
        assert_eq!(fc.features[1].geometry.as_deref().unwrap()["type"], "Point");
    }

    #[test]
    fn test_layer_metadata_format() {
        let fc = FeatureCollection::new(vec![]).with_metadata(LayerMetadata {
            name: "Under-five mortality".into(),
            id_field: Some(COUNTER_FIELD.into()),
            fields: vec![FieldDef::new(COUNTER_FIELD, COUNTER_FIELD, FieldType::Integer)],
        });
        let value = serde_json::to_value(&fc).unwrap();
        assert_eq!(value["type"], "FeatureCollection");
        assert_eq!(value["metadata"]["idField"], "counterField");
        assert_eq!(value["metadata"]["fields"][0]["type"], "Integer");
    }
}
