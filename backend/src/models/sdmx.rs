//! SDMX-JSON data message, bound to typed structs.
//!
//! Only the subset the decoder reads is modelled. Unknown members are ignored,
//! and the observation mappings keep the insertion order of the source document.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::LookupError;

// =============================================================================
// Names
// =============================================================================

/// Human-readable name of a component or value.
///
/// SDMX-JSON carries names either as a bare string or as a language map
/// (`{"en": "Reference area"}`). Both are collapsed into one text on
/// deserialization: the `en` entry, else the first entry, else empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawName")]
pub struct DisplayName {
    pub text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawName {
    Plain(String),
    Localized(IndexMap<String, Value>),
    Other(Value),
}

impl From<RawName> for DisplayName {
    fn from(raw: RawName) -> Self {
        let text = match raw {
            RawName::Plain(s) => s,
            RawName::Localized(map) => map
                .get("en")
                .or_else(|| map.values().next())
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            RawName::Other(_) => String::new(),
        };
        Self { text }
    }
}

impl From<&str> for DisplayName {
    fn from(s: &str) -> Self {
        Self { text: s.to_string() }
    }
}

impl Serialize for DisplayName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

// =============================================================================
// Structure
// =============================================================================

/// A dimension or attribute descriptor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    /// Zero-based position in the composite observation key (dimensions only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_position: Option<usize>,
    #[serde(default)]
    pub name: DisplayName,
    #[serde(default)]
    pub values: Vec<ComponentValue>,
}

/// One code of a component's code list.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentValue {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: DisplayName,
}

impl Component {
    /// Property name holding the value id, e.g. `REF_AREA_CODE`.
    pub fn code_field(&self) -> String {
        format!("{}_CODE", self.id)
    }

    /// Property name holding the value name.
    ///
    /// Uppercased, with only the first space replaced by an underscore:
    /// `"Age group category"` becomes `AGE_GROUP CATEGORY`.
    pub fn name_field(&self) -> String {
        self.name.text.to_uppercase().replacen(' ', "_", 1)
    }

    /// Resolve a code-list index.
    pub fn value(&self, index: usize) -> Result<&ComponentValue, LookupError> {
        self.values.get(index).ok_or_else(|| LookupError::OutOfRange {
            component: self.id.clone(),
            index,
            len: self.values.len(),
        })
    }

    /// Parse a composite-key segment and resolve it.
    pub fn value_for_segment(&self, segment: &str) -> Result<&ComponentValue, LookupError> {
        let index = segment
            .trim()
            .parse::<usize>()
            .map_err(|_| LookupError::NotAnIndex {
                component: self.id.clone(),
                segment: segment.to_string(),
            })?;
        self.value(index)
    }
}

/// Components grouped by the level they are attached to.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ComponentGroups {
    #[serde(default)]
    pub series: Vec<Component>,
    #[serde(default)]
    pub observation: Vec<Component>,
}

/// The `structure` member of a data message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Structure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<DisplayName>,
    pub dimensions: ComponentGroups,
    pub attributes: ComponentGroups,
}

// =============================================================================
// Data sets
// =============================================================================

/// Observation mapping: composite key to `[value, attr_0, attr_1, ...]`.
pub type Observations = IndexMap<String, Vec<Value>>;

/// One series of a series-keyed data set.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SeriesEntry {
    /// Series-level attribute indices (`null` for absent).
    #[serde(default)]
    pub attributes: Vec<Value>,
    #[serde(default)]
    pub observations: Observations,
}

/// A data set, keyed either flat by observation or by series.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DataSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<Observations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<IndexMap<String, SeriesEntry>>,
}

impl DataSet {
    /// Number of observations across both layouts.
    pub fn observation_count(&self) -> usize {
        match (&self.observations, &self.series) {
            (Some(obs), _) => obs.len(),
            (None, Some(series)) => series.values().map(|s| s.observations.len()).sum(),
            (None, None) => 0,
        }
    }
}

/// An SDMX-JSON data message (the contents of the `data` envelope).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DataMessage {
    pub structure: Structure,
    #[serde(rename = "dataSets")]
    pub data_sets: Vec<DataSet>,
}

impl DataMessage {
    /// Layer name taken from `structure.name`.
    pub fn layer_name(&self) -> Option<&str> {
        self.structure
            .name
            .as_ref()
            .map(|n| n.text.as_str())
            .filter(|s| !s.is_empty())
    }
}

/// Dataflow listed in a structure message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataflow {
    pub id: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_normalization() {
        let plain: DisplayName = serde_json::from_value(json!("Reference area")).unwrap();
        let localized: DisplayName =
            serde_json::from_value(json!({ "fr": "Zone", "en": "Reference area" })).unwrap();
        let foreign: DisplayName = serde_json::from_value(json!({ "fr": "Zone" })).unwrap();

        assert_eq!(plain.text, "Reference area");
        assert_eq!(localized.text, "Reference area");
        assert_eq!(foreign.text, "Zone");
    }

    #[test]
    fn test_name_field_replaces_first_space_only() {
        let component = Component {
            id: "AGE".into(),
            key_position: Some(0),
            name: "Age group category".into(),
            values: vec![],
        };
        assert_eq!(component.name_field(), "AGE_GROUP CATEGORY");
        assert_eq!(component.code_field(), "AGE_CODE");
    }

    #[test]
    fn test_value_for_segment_errors() {
        let component = Component {
            id: "SEX".into(),
            key_position: Some(1),
            name: "Sex".into(),
            values: vec![ComponentValue { id: "F".into(), name: "Female".into() }],
        };
        assert_eq!(component.value_for_segment("0").unwrap().id, "F");
        assert!(matches!(
            component.value_for_segment("3"),
            Err(LookupError::OutOfRange { index: 3, len: 1, .. })
        ));
        assert!(matches!(
            component.value_for_segment("x"),
            Err(LookupError::NotAnIndex { .. })
        ));
    }

    #[test]
    fn test_observations_keep_document_order() {
        let data_set: DataSet = serde_json::from_value(json!({
            "observations": { "2:0": [1], "0:0": [2], "1:0": [3] }
        }))
        .unwrap();
        let keys: Vec<&String> = data_set.observations.as_ref().unwrap().keys().collect();
        assert_eq!(keys, vec!["2:0", "0:0", "1:0"]);
        assert_eq!(data_set.observation_count(), 3);
    }
}
