//! SDMX-JSON decoder.
//!
//! Turns a data message into one flat [`Feature`] per observation, plus the
//! field schema inferred from the dimension and attribute descriptors.
//!
//! # Field layout
//!
//! ```text
//! counterField | <DIM>_CODE, <DIM NAME> ... | <ATTR>_CODE, <ATTR NAME> ... | OBS_VALUE
//! ```
//!
//! Composite keys (`"0:3:1"`) hold indices into each dimension's code list, in
//! key-position order. Observation value arrays hold the observed value first,
//! then one attribute index (or `null`) per observation-level attribute.
//!
//! Lookup failures (non-numeric key segment, index past the code list) null the
//! affected fields and are reported as [`LookupIssue`]s; they never abort the
//! decode or drop a record.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Value};

use super::period::{format_year_month, Periodicity};
use crate::error::{DecodeError, LookupError};
use crate::models::{
    Component, DataMessage, Dataflow, DisplayName, Feature, FeatureCollection, FieldDef,
    FieldType, LayerMetadata, Observations, Structure, COUNTER_FIELD, OBS_VALUE_FIELD,
};
use crate::validation::validate_sdmx_message;

/// Dimension id whose values are reformatted as `YYYY-MM`.
pub const TIME_PERIOD: &str = "TIME_PERIOD";

/// Layer name used when the structure carries none.
pub const DEFAULT_LAYER_NAME: &str = "from sdmx";

/// A field that could not be resolved for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupIssue {
    /// `counterField` of the affected record.
    pub record: usize,
    /// Composite key of the observation.
    pub key: String,
    pub message: String,
    #[serde(skip)]
    pub error: LookupError,
}

/// Where a decoded collection came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Sdmx,
    Csv { encoding: String, delimiter: char },
}

/// Output of a decode: flat records, inferred schema and diagnostics.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub records: Vec<Feature>,
    pub schema: Vec<FieldDef>,
    pub count: usize,
    pub layer_name: Option<String>,
    pub issues: Vec<LookupIssue>,
    pub origin: Origin,
}

impl Decoded {
    /// Names of every field a record may carry, in schema order.
    pub fn field_names(&self) -> Vec<&str> {
        self.schema.iter().map(|f| f.name.as_str()).collect()
    }

    /// Wrap the records as a publishable collection with layer metadata.
    pub fn into_collection(self) -> FeatureCollection {
        let id_field = match self.origin {
            Origin::Sdmx => Some(COUNTER_FIELD.to_string()),
            Origin::Csv { .. } => None,
        };
        FeatureCollection::new(self.records).with_metadata(LayerMetadata {
            name: self
                .layer_name
                .unwrap_or_else(|| DEFAULT_LAYER_NAME.to_string()),
            id_field,
            fields: self.schema,
        })
    }
}

/// Observation count and field names, without decoding the records.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSummary {
    pub count: usize,
    pub fields: Vec<String>,
    pub layer_name: Option<String>,
}

// =============================================================================
// Validation
// =============================================================================

/// Strip the `data` envelope of the file form. API responses come bare.
pub fn unwrap_envelope(json: &Value) -> &Value {
    match json.get("data") {
        Some(inner) if inner.is_object() => inner,
        _ => json,
    }
}

/// Structural sniff of a payload (with or without envelope).
pub fn is_sdmx_valid(json: &Value) -> bool {
    crate::validation::is_sdmx_valid(unwrap_envelope(json))
}

/// Validate a payload and bind it to [`DataMessage`].
pub fn check(json: &Value) -> Result<DataMessage, DecodeError> {
    let inner = unwrap_envelope(json);
    validate_sdmx_message(inner).map_err(|errors| {
        DecodeError::InvalidPayload(format!("unable to parse SDMX: {}", errors.join("; ")))
    })?;
    serde_json::from_value(inner.clone()).map_err(|e| DecodeError::Malformed(e.to_string()))
}

// =============================================================================
// Schema
// =============================================================================

/// Field schema of a structure.
///
/// `counterField` first, two string fields per dimension then per attribute
/// (series level before observation level), `OBS_VALUE` last.
pub fn derive_schema(structure: &Structure) -> Vec<FieldDef> {
    let mut fields = vec![FieldDef::new(COUNTER_FIELD, COUNTER_FIELD, FieldType::Integer)];

    let components = structure
        .dimensions
        .series
        .iter()
        .chain(&structure.dimensions.observation)
        .chain(&structure.attributes.series)
        .chain(&structure.attributes.observation);

    for component in components {
        fields.push(FieldDef::string(component.code_field()));
        fields.push(FieldDef::new(
            component.name_field(),
            component.name.text.clone(),
            FieldType::String,
        ));
    }

    fields.push(FieldDef::new(OBS_VALUE_FIELD, "Observation Value", FieldType::Double));
    fields
}

/// Count and field names of a payload, as shown before a full decode.
pub fn summarize(json: &Value) -> Result<PayloadSummary, DecodeError> {
    let message = check(json)?;
    let count = message
        .data_sets
        .first()
        .map(|d| d.observation_count())
        .unwrap_or(0);
    Ok(PayloadSummary {
        count,
        fields: derive_schema(&message.structure)
            .into_iter()
            .map(|f| f.name)
            .collect(),
        layer_name: message.layer_name().map(str::to_string),
    })
}

/// `TIME_PERIOD` codes whose periodicity is not monthly.
pub fn non_monthly_periods(structure: &Structure) -> Vec<String> {
    structure
        .dimensions
        .series
        .iter()
        .chain(&structure.dimensions.observation)
        .filter(|d| d.id == TIME_PERIOD)
        .flat_map(|d| &d.values)
        .filter(|v| !Periodicity::of(&v.name.text).is_monthly())
        .map(|v| v.name.text.clone())
        .collect()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode an SDMX-JSON payload (with or without `data` envelope).
pub fn decode(json: &Value) -> Result<Decoded, DecodeError> {
    let message = check(json)?;
    Ok(decode_message(&message))
}

/// Decode an already validated message.
pub fn decode_message(message: &DataMessage) -> Decoded {
    let structure = &message.structure;
    let mut decoder = ObservationDecoder::new(structure);

    if let Some(data_set) = message.data_sets.first() {
        match (&data_set.observations, &data_set.series) {
            (Some(observations), _) => decoder.decode_flat(observations),
            (None, Some(series)) => {
                for (series_key, entry) in series {
                    decoder.decode_series(series_key, &entry.attributes, &entry.observations);
                }
            }
            (None, None) => {}
        }
    }

    Decoded {
        count: decoder.records.len(),
        records: decoder.records,
        schema: derive_schema(structure),
        layer_name: message.layer_name().map(str::to_string),
        issues: decoder.issues,
        origin: Origin::Sdmx,
    }
}

struct ObservationDecoder<'a> {
    dimensions: Vec<&'a Component>,
    series_attributes: &'a [Component],
    observation_attributes: &'a [Component],
    counter: usize,
    records: Vec<Feature>,
    issues: Vec<LookupIssue>,
}

impl<'a> ObservationDecoder<'a> {
    fn new(structure: &'a Structure) -> Self {
        Self {
            dimensions: structure
                .dimensions
                .series
                .iter()
                .chain(&structure.dimensions.observation)
                .collect(),
            series_attributes: &structure.attributes.series,
            observation_attributes: &structure.attributes.observation,
            counter: 0,
            records: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn decode_flat(&mut self, observations: &Observations) {
        for (key, values) in observations {
            self.decode_observation(key, None, values);
        }
    }

    fn decode_series(&mut self, series_key: &str, attributes: &[Value], observations: &Observations) {
        for (obs_key, values) in observations {
            let key = format!("{}:{}", series_key, obs_key);
            self.decode_observation(&key, Some(attributes), values);
        }
    }

    /// First dimension declared at `position`. Dimensions without a
    /// `keyPosition` sit at their index in the dimension list.
    fn dimension_at(&self, position: usize) -> Option<&'a Component> {
        self.dimensions
            .iter()
            .enumerate()
            .find(|(i, d)| d.key_position.unwrap_or(*i) == position)
            .map(|(_, d)| *d)
    }

    fn decode_observation(&mut self, key: &str, series_attributes: Option<&[Value]>, values: &[Value]) {
        self.counter += 1;
        let mut properties: IndexMap<String, Value> = IndexMap::new();

        for (position, segment) in key.split(':').enumerate() {
            let Some(dimension) = self.dimension_at(position) else {
                continue;
            };
            match dimension.value_for_segment(segment) {
                Ok(value) if dimension.id == TIME_PERIOD => {
                    let period = format_year_month(&value.name.text);
                    properties.insert(dimension.code_field(), json!(period));
                    properties.insert(dimension.name_field(), json!(period));
                }
                Ok(value) => {
                    properties.insert(dimension.code_field(), json!(value.id));
                    properties.insert(dimension.name_field(), json!(value.name.text));
                }
                Err(error) => {
                    properties.insert(dimension.code_field(), Value::Null);
                    properties.insert(dimension.name_field(), Value::Null);
                    self.issue(key, error);
                }
            }
        }

        if let Some(raw) = series_attributes {
            let components = self.series_attributes;
            self.resolve_attributes(&mut properties, key, components, raw);
        }

        properties.insert(
            OBS_VALUE_FIELD.to_string(),
            values.first().cloned().unwrap_or(Value::Null),
        );

        let components = self.observation_attributes;
        self.resolve_attributes(&mut properties, key, components, values.get(1..).unwrap_or(&[]));

        properties.insert(COUNTER_FIELD.to_string(), json!(self.counter));
        self.records.push(Feature::new(properties));
    }

    fn resolve_attributes(
        &mut self,
        properties: &mut IndexMap<String, Value>,
        key: &str,
        components: &[Component],
        raw: &[Value],
    ) {
        for (position, raw_value) in raw.iter().enumerate() {
            let Some(attribute) = components.get(position) else {
                self.issue(key, LookupError::UnknownAttribute { position });
                continue;
            };

            let resolved = match raw_value {
                Value::Null => None,
                Value::Number(n) => Some(match array_index(n) {
                    Some(index) => attribute.value(index),
                    None => Err(LookupError::NotAnIndex {
                        component: attribute.id.clone(),
                        segment: n.to_string(),
                    }),
                }),
                Value::String(s) => Some(attribute.value_for_segment(s)),
                other => Some(Err(LookupError::NotAnIndex {
                    component: attribute.id.clone(),
                    segment: other.to_string(),
                })),
            };

            match resolved {
                Some(Ok(value)) => {
                    properties.insert(attribute.code_field(), json!(value.id));
                    properties.insert(attribute.name_field(), json!(value.name.text));
                }
                Some(Err(error)) => {
                    properties.insert(attribute.code_field(), Value::Null);
                    properties.insert(attribute.name_field(), Value::Null);
                    self.issue(key, error);
                }
                None => {
                    properties.insert(attribute.code_field(), Value::Null);
                    properties.insert(attribute.name_field(), Value::Null);
                }
            }
        }
    }

    fn issue(&mut self, key: &str, error: LookupError) {
        self.issues.push(LookupIssue {
            record: self.counter,
            key: key.to_string(),
            message: error.to_string(),
            error,
        });
    }
}

// =============================================================================
// Dataflows
// =============================================================================

/// List the dataflows of an SDMX-JSON structure message.
pub fn list_dataflows(json: &Value) -> Result<Vec<Dataflow>, DecodeError> {
    let flows = json
        .get("data")
        .and_then(|d| d.get("dataflows"))
        .and_then(Value::as_array)
        .filter(|flows| !flows.is_empty())
        .ok_or_else(|| DecodeError::InvalidPayload("no data flows found".to_string()))?;

    flows
        .iter()
        .map(|flow| -> Result<Dataflow, DecodeError> {
            let id = flow
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| DecodeError::Malformed("dataflow without id".to_string()))?;
            let label: DisplayName = match flow.get("name") {
                Some(name) => serde_json::from_value(name.clone())?,
                None => DisplayName::default(),
            };
            Ok(Dataflow {
                id: id.to_string(),
                label: label.text,
            })
        })
        .collect()
}

/// Array position a JSON number addresses. Integral floats such as `1.0`
/// address the same slot as `1`.
fn array_index(n: &serde_json::Number) -> Option<usize> {
    if let Some(index) = n.as_u64() {
        return usize::try_from(index).ok();
    }
    n.as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0 && *f <= usize::MAX as f64)
        .map(|f| f as usize)
}
